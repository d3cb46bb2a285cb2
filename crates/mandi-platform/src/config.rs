use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use mandi_ledger::StoreBackend;
use rust_decimal::Decimal;

pub const DEFAULT_DB_PATH: &str = "data/mandi_setu.db";
pub const DEFAULT_LANGUAGE: &str = "hi";
pub const DEFAULT_BASE_COST: &str = "15";

#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub store: StoreBackend,
    pub http_addr: String,
    pub default_language: String,
    pub base_cost: Decimal,
}

impl ServiceConfig {
    pub fn from_env(default_http_addr: &str) -> Result<Self> {
        Self::from_lookup(default_http_addr, |key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup` so callers other than the process
    /// environment can supply them.
    pub fn from_lookup<F>(default_http_addr: &str, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let store_kind = lookup("MANDI_STORE").unwrap_or_else(|| "sqlite".to_string());
        let store = match store_kind.trim().to_ascii_lowercase().as_str() {
            "sqlite" => StoreBackend::Sqlite {
                db_path: PathBuf::from(
                    lookup("MANDI_DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
                ),
            },
            "memory" => StoreBackend::Memory,
            other => bail!("MANDI_STORE must be 'sqlite' or 'memory', got '{other}'"),
        };

        let http_addr = lookup("HTTP_ADDR").unwrap_or_else(|| default_http_addr.to_string());

        let default_language = lookup("MANDI_DEFAULT_LANGUAGE")
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string())
            .trim()
            .to_string();
        let language_chars = default_language.chars().count();
        if !(2..=10).contains(&language_chars) {
            bail!("MANDI_DEFAULT_LANGUAGE must be 2-10 characters, got '{default_language}'");
        }

        let base_cost_raw =
            lookup("MANDI_BASE_COST").unwrap_or_else(|| DEFAULT_BASE_COST.to_string());
        let base_cost: Decimal = base_cost_raw
            .trim()
            .parse()
            .with_context(|| format!("MANDI_BASE_COST is not a decimal: '{base_cost_raw}'"))?;
        if base_cost.is_sign_negative() {
            bail!("MANDI_BASE_COST must not be negative");
        }

        Ok(Self {
            store,
            http_addr,
            default_language,
            base_cost,
        })
    }
}
