use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{LedgerResult, ValidationError};
use crate::models::{DigitalParchi, ParchiStatus, ParchiUpdate};

pub const DEFAULT_PAGE_LIMIT: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

impl Page {
    pub fn new(limit: u32, offset: u32) -> Self {
        Self { limit, offset }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_LIMIT,
            offset: 0,
        }
    }
}

/// Narrows list and count queries. Date bounds are inclusive and apply to
/// `created_at`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParchiFilter {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub status: Option<ParchiStatus>,
    pub vendor_id: Option<String>,
}

impl ParchiFilter {
    pub fn since(start_date: DateTime<Utc>) -> Self {
        Self {
            start_date: Some(start_date),
            ..Self::default()
        }
    }

    pub fn between(start_date: DateTime<Utc>, end_date: DateTime<Utc>) -> Self {
        Self {
            start_date: Some(start_date),
            end_date: Some(end_date),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                return Err(ValidationError::out_of_range(
                    "start_date",
                    "must not be later than end_date",
                ));
            }
        }

        Ok(())
    }

    pub fn matches(&self, parchi: &DigitalParchi) -> bool {
        self.start_date.is_none_or(|start| parchi.created_at >= start)
            && self.end_date.is_none_or(|end| parchi.created_at <= end)
            && self.status.is_none_or(|status| parchi.status == status)
            && self
                .vendor_id
                .as_deref()
                .is_none_or(|vendor| parchi.vendor_id.as_deref() == Some(vendor))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub store_type: String,
    pub location: Option<String>,
    pub storage_size_bytes: u64,
    pub connection_active: bool,
    pub total_parchis: i64,
    pub checked_at: DateTime<Utc>,
    pub error: Option<String>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }

    pub fn unhealthy(store_type: &str, location: Option<String>, error: impl ToString) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            store_type: store_type.to_string(),
            location,
            storage_size_bytes: 0,
            connection_active: false,
            total_parchis: 0,
            checked_at: Utc::now(),
            error: Some(error.to_string()),
        }
    }
}

/// Durable CRUD store for digital parchis.
///
/// Lookup misses are reported as `None` / `false`; only malformed input
/// (`ValidationError`) and backend faults (`DatabaseError`) are errors.
#[async_trait]
pub trait ParchiStore: Send + Sync {
    fn store_type(&self) -> &'static str;

    /// Opens the backing store and creates its schema if absent. Idempotent.
    async fn initialize(&self) -> LedgerResult<()>;

    async fn save_parchi(&self, parchi: &DigitalParchi) -> LedgerResult<Uuid>;

    async fn get_parchi(&self, id: Uuid) -> LedgerResult<Option<DigitalParchi>>;

    /// Newest first by `created_at`.
    async fn list_parchis(
        &self,
        page: Page,
        filter: &ParchiFilter,
    ) -> LedgerResult<Vec<DigitalParchi>>;

    async fn update_parchi(&self, id: Uuid, update: ParchiUpdate) -> LedgerResult<bool>;

    async fn delete_parchi(&self, id: Uuid) -> LedgerResult<bool>;

    async fn count_parchis(&self, filter: &ParchiFilter) -> LedgerResult<i64>;

    async fn health_check(&self) -> LedgerResult<HealthReport>;

    /// Releases the underlying connection. Safe to call more than once.
    async fn close(&self) -> LedgerResult<()>;
}
