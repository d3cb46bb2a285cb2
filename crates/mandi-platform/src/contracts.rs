use chrono::{DateTime, Utc};
use mandi_core::{
    DEFAULT_PAGE_LIMIT, DigitalParchi, Page, ParchiFilter, ParchiStatus, TradeData,
    ValidationError,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MAX_PAGE_LIMIT: u32 = 500;
pub const MAX_SAMPLE_COUNT: u32 = 50;
const DEFAULT_SAMPLE_COUNT: u32 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateParchiRequest {
    pub product_name: String,
    pub quantity: Decimal,
    #[serde(default = "default_unit")]
    pub unit: String,
    pub unit_price: Decimal,
    pub language: Option<String>,
    pub vendor_id: Option<String>,
    pub status: Option<ParchiStatus>,
    pub conversation_id: Option<String>,
}

impl CreateParchiRequest {
    /// Prices the trade and wraps it in a new parchi. Amounts are always
    /// computed here; callers cannot supply totals.
    pub fn into_parchi(self, default_language: &str) -> Result<DigitalParchi, ValidationError> {
        let language = self
            .language
            .unwrap_or_else(|| default_language.to_string());
        let mut trade = TradeData::new(
            self.product_name,
            self.quantity,
            self.unit,
            self.unit_price,
            language,
        )?;
        if let Some(conversation_id) = self.conversation_id {
            trade = trade.with_conversation_id(conversation_id);
        }

        let mut parchi = DigitalParchi::new(trade);
        if let Some(vendor_id) = self.vendor_id {
            parchi = parchi.with_vendor(vendor_id);
        }
        if let Some(status) = self.status {
            parchi = parchi.with_status(status);
        }

        parchi.validate()?;
        Ok(parchi)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListParchisQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub status: Option<ParchiStatus>,
    pub vendor_id: Option<String>,
}

impl ListParchisQuery {
    pub fn page(&self) -> Page {
        Page::new(
            self.limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT),
            self.offset.unwrap_or(0),
        )
    }

    pub fn filter(&self) -> ParchiFilter {
        ParchiFilter {
            start_date: self.start_date,
            end_date: self.end_date,
            status: self.status,
            vendor_id: self
                .vendor_id
                .as_deref()
                .map(str::trim)
                .filter(|vendor| !vendor.is_empty())
                .map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedSamplesQuery {
    pub count: Option<u32>,
    pub language: Option<String>,
}

impl SeedSamplesQuery {
    pub fn count(&self) -> Result<u32, ValidationError> {
        let count = self.count.unwrap_or(DEFAULT_SAMPLE_COUNT);
        if !(1..=MAX_SAMPLE_COUNT).contains(&count) {
            return Err(ValidationError::out_of_range(
                "count",
                format!("expected 1-{MAX_SAMPLE_COUNT}, got {count}"),
            ));
        }
        Ok(count)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedSamplesResponse {
    pub created: usize,
    pub parchi_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportQuery {
    pub language: Option<String>,
}

fn default_unit() -> String {
    "kg".to_string()
}
