use std::{fmt, str::FromStr};

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::calculations::{
    IntoAmount, calculate_final_amount, calculate_mandi_cess, calculate_total_amount,
    within_tolerance,
};
use crate::error::ValidationError;

const LANGUAGE_MIN_CHARS: usize = 2;
const LANGUAGE_MAX_CHARS: usize = 10;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", try_from = "String")]
pub enum ParchiStatus {
    Draft,
    #[default]
    Completed,
    Cancelled,
}

impl ParchiStatus {
    pub const ALL: [ParchiStatus; 3] = [Self::Draft, Self::Completed, Self::Cancelled];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for ParchiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParchiStatus {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "DRAFT" => Ok(Self::Draft),
            "COMPLETED" => Ok(Self::Completed),
            "CANCELLED" => Ok(Self::Cancelled),
            other => Err(ValidationError::out_of_range(
                "status",
                format!("unsupported status '{other}'"),
            )),
        }
    }
}

impl TryFrom<String> for ParchiStatus {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// The structured facts of one negotiated trade.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TradeData {
    pub product_name: String,
    pub quantity: Decimal,
    pub unit: String,
    pub unit_price: Decimal,
    pub total_amount: Decimal,
    pub mandi_cess: Decimal,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    pub language: String,
    #[serde(default = "new_conversation_id")]
    pub conversation_id: String,
}

impl TradeData {
    /// Prices the trade and validates every field.
    pub fn new(
        product_name: impl Into<String>,
        quantity: impl IntoAmount,
        unit: impl Into<String>,
        unit_price: impl IntoAmount,
        language: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let quantity = quantity.into_amount("quantity")?;
        let unit_price = unit_price.into_amount("unit_price")?;
        let (total_amount, mandi_cess, _) = calculate_final_amount(quantity, unit_price)?;

        let trade = Self {
            product_name: product_name.into().trim().to_string(),
            quantity,
            unit: unit.into().trim().to_string(),
            unit_price,
            total_amount,
            mandi_cess,
            timestamp: Utc::now(),
            language: language.into().trim().to_string(),
            conversation_id: new_conversation_id(),
        };
        trade.validate()?;

        Ok(trade)
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_conversation_id(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = conversation_id.into();
        self
    }

    pub fn final_amount(&self) -> Decimal {
        self.total_amount + self.mandi_cess
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.product_name.trim().is_empty() {
            return Err(ValidationError::EmptyField("product_name"));
        }
        if self.unit.trim().is_empty() {
            return Err(ValidationError::EmptyField("unit"));
        }
        if self.conversation_id.trim().is_empty() {
            return Err(ValidationError::EmptyField("conversation_id"));
        }

        let language_chars = self.language.chars().count();
        if !(LANGUAGE_MIN_CHARS..=LANGUAGE_MAX_CHARS).contains(&language_chars) {
            return Err(ValidationError::out_of_range(
                "language",
                format!(
                    "expected {LANGUAGE_MIN_CHARS}-{LANGUAGE_MAX_CHARS} characters, got {language_chars}"
                ),
            ));
        }

        if self.total_amount <= Decimal::ZERO {
            return Err(ValidationError::out_of_range("total_amount", "must be positive"));
        }
        if self.mandi_cess < Decimal::ZERO {
            return Err(ValidationError::out_of_range("mandi_cess", "must be non-negative"));
        }

        let expected_total = calculate_total_amount(self.quantity, self.unit_price)?;
        ensure_matches("total_amount", expected_total, self.total_amount)?;

        let expected_cess = calculate_mandi_cess(self.total_amount)?;
        ensure_matches("mandi_cess", expected_cess, self.mandi_cess)?;

        Ok(())
    }
}

/// A persisted trade receipt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DigitalParchi {
    pub id: Uuid,
    pub trade_data: TradeData,
    #[serde(default)]
    pub vendor_id: Option<String>,
    #[serde(default)]
    pub status: ParchiStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DigitalParchi {
    pub fn new(trade_data: TradeData) -> Self {
        let now = Utc::now();

        Self {
            id: Uuid::new_v4(),
            trade_data,
            vendor_id: None,
            status: ParchiStatus::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_vendor(mut self, vendor_id: impl Into<String>) -> Self {
        self.vendor_id = Some(vendor_id.into());
        self
    }

    pub fn with_status(mut self, status: ParchiStatus) -> Self {
        self.status = status;
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.trade_data.validate()?;

        if let Some(vendor_id) = &self.vendor_id {
            if vendor_id.trim().is_empty() {
                return Err(ValidationError::EmptyField("vendor_id"));
            }
        }
        if self.created_at > self.updated_at {
            return Err(ValidationError::TimestampOrder);
        }

        Ok(())
    }

    /// Applies a partial update as one unit: either every field changes and
    /// `updated_at` moves strictly forward, or the record is left untouched.
    pub fn apply_update(&mut self, update: ParchiUpdate) -> Result<(), ValidationError> {
        let mut candidate = self.clone();

        if let Some(status) = update.status {
            candidate.status = status;
        }
        if let Some(vendor_id) = update.vendor_id {
            candidate.vendor_id = vendor_id;
        }
        if let Some(trade_data) = update.trade_data {
            candidate.trade_data = trade_data;
        }
        candidate.updated_at = next_revision_time(self.updated_at);
        candidate.validate()?;

        *self = candidate;
        Ok(())
    }

    pub fn to_document(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Parses a document produced by [`DigitalParchi::to_json`] and runs full
    /// validation on it.
    pub fn from_json(document: &str) -> Result<Self, ValidationError> {
        let parchi: Self = serde_json::from_str(document)
            .map_err(|err| ValidationError::Malformed(err.to_string()))?;
        parchi.validate()?;
        Ok(parchi)
    }

    pub fn from_document(document: serde_json::Value) -> Result<Self, ValidationError> {
        let parchi: Self = serde_json::from_value(document)
            .map_err(|err| ValidationError::Malformed(err.to_string()))?;
        parchi.validate()?;
        Ok(parchi)
    }
}

/// Partial field replacement for a stored parchi. `vendor_id: Some(None)`
/// clears the vendor; a JSON `null` deserializes to exactly that.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParchiUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ParchiStatus>,
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub vendor_id: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trade_data: Option<TradeData>,
}

impl ParchiUpdate {
    pub fn status(mut self, status: ParchiStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn vendor(mut self, vendor_id: impl Into<String>) -> Self {
        self.vendor_id = Some(Some(vendor_id.into()));
        self
    }

    pub fn clear_vendor(mut self) -> Self {
        self.vendor_id = Some(None);
        self
    }

    pub fn trade_data(mut self, trade_data: TradeData) -> Self {
        self.trade_data = Some(trade_data);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.vendor_id.is_none() && self.trade_data.is_none()
    }
}

fn deserialize_some<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

fn new_conversation_id() -> String {
    Uuid::new_v4().to_string()
}

fn next_revision_time(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > previous {
        now
    } else {
        previous + Duration::nanoseconds(1)
    }
}

fn ensure_matches(
    field: &'static str,
    expected: Decimal,
    actual: Decimal,
) -> Result<(), ValidationError> {
    if within_tolerance(actual, expected) {
        return Ok(());
    }

    Err(ValidationError::InconsistentAmount {
        field,
        expected: expected.to_string(),
        actual: actual.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::samples::sample_trade;
    use rand::{SeedableRng, rngs::StdRng};
    use rust_decimal_macros::dec;

    fn wheat() -> TradeData {
        TradeData::new("Wheat", dec!(100), "kg", dec!(25.50), "hi").unwrap()
    }

    #[test]
    fn new_trade_prices_itself() {
        let trade = wheat();
        assert_eq!(trade.total_amount, dec!(2550.00));
        assert_eq!(trade.mandi_cess, dec!(127.50));
        assert_eq!(trade.final_amount(), dec!(2677.50));
        assert!(!trade.conversation_id.is_empty());
    }

    #[test]
    fn new_trade_trims_text_fields() {
        let trade = TradeData::new("  Rice ", 50_u32, " kg", 30_u32, " ta ").unwrap();
        assert_eq!(trade.product_name, "Rice");
        assert_eq!(trade.unit, "kg");
        assert_eq!(trade.language, "ta");
    }

    #[test]
    fn rejects_malformed_trades() {
        assert_eq!(
            TradeData::new("", 10_u32, "kg", 50_u32, "hi").unwrap_err(),
            ValidationError::EmptyField("product_name")
        );
        assert_eq!(
            TradeData::new("Rice", -10.0, "kg", 50.0, "hi").unwrap_err(),
            ValidationError::NonPositiveQuantity
        );
        assert_eq!(
            TradeData::new("Rice", 10_u32, "   ", 50_u32, "hi").unwrap_err(),
            ValidationError::EmptyField("unit")
        );
        assert!(matches!(
            TradeData::new("Rice", 10_u32, "kg", 50_u32, "h").unwrap_err(),
            ValidationError::OutOfRange { field: "language", .. }
        ));
        assert!(matches!(
            TradeData::new("Rice", 10_u32, "kg", 50_u32, "hindi-india-x").unwrap_err(),
            ValidationError::OutOfRange { field: "language", .. }
        ));
        // rounds to a zero total
        assert!(matches!(
            TradeData::new("Rice", 0.01, "kg", 0.01, "hi").unwrap_err(),
            ValidationError::OutOfRange { field: "total_amount", .. }
        ));
    }

    #[test]
    fn language_length_counts_characters() {
        // two Devanagari characters, six bytes
        assert!(TradeData::new("आलू", 10_u32, "kg", 20_u32, "हि").is_ok());
    }

    #[test]
    fn validate_catches_inconsistent_amounts() {
        let mut trade = wheat();
        trade.total_amount += dec!(10);
        assert!(matches!(
            trade.validate().unwrap_err(),
            ValidationError::InconsistentAmount { field: "total_amount", .. }
        ));

        let mut trade = wheat();
        trade.mandi_cess = dec!(100);
        assert!(matches!(
            trade.validate().unwrap_err(),
            ValidationError::InconsistentAmount { field: "mandi_cess", .. }
        ));
    }

    #[test]
    fn new_parchi_defaults() {
        let parchi = DigitalParchi::new(wheat());
        assert_eq!(parchi.status, ParchiStatus::Completed);
        assert_eq!(parchi.vendor_id, None);
        assert!(parchi.created_at <= parchi.updated_at);
        assert!(parchi.validate().is_ok());
    }

    #[test]
    fn parchi_rejects_blank_vendor_and_reversed_timestamps() {
        let parchi = DigitalParchi::new(wheat()).with_vendor(" ");
        assert_eq!(parchi.validate(), Err(ValidationError::EmptyField("vendor_id")));

        let mut parchi = DigitalParchi::new(wheat());
        parchi.created_at = parchi.updated_at + Duration::seconds(1);
        assert_eq!(parchi.validate(), Err(ValidationError::TimestampOrder));
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("cancelled".parse::<ParchiStatus>().unwrap(), ParchiStatus::Cancelled);
        assert_eq!(" Draft ".parse::<ParchiStatus>().unwrap(), ParchiStatus::Draft);
        assert!("ARCHIVED".parse::<ParchiStatus>().is_err());
        for status in ParchiStatus::ALL {
            assert_eq!(status.to_string().parse::<ParchiStatus>().unwrap(), status);
        }
    }

    #[test]
    fn status_deserializes_case_insensitively() {
        let status: ParchiStatus = serde_json::from_str("\"draft\"").unwrap();
        assert_eq!(status, ParchiStatus::Draft);
        assert_eq!(serde_json::to_string(&status).unwrap(), "\"DRAFT\"");

        let update: ParchiUpdate = serde_json::from_str(r#"{"status":"Cancelled"}"#).unwrap();
        assert_eq!(update.status, Some(ParchiStatus::Cancelled));

        assert!(serde_json::from_str::<ParchiStatus>("\"archived\"").is_err());
    }

    #[test]
    fn json_round_trip_preserves_every_field() {
        let mut rng = StdRng::seed_from_u64(7);
        for index in 0..100 {
            let status = ParchiStatus::ALL[index % 3];
            let trade = sample_trade(&mut rng, "hi").unwrap();
            let mut parchi = DigitalParchi::new(trade).with_status(status);
            if index % 2 == 0 {
                parchi = parchi.with_vendor(format!("vendor-{index}"));
            }

            let document = parchi.to_json().unwrap();
            let restored = DigitalParchi::from_json(&document).unwrap();
            assert_eq!(restored, parchi);
            assert_eq!(
                restored.trade_data.total_amount.to_string(),
                parchi.trade_data.total_amount.to_string()
            );
        }
    }

    #[test]
    fn json_document_shape() {
        let parchi = DigitalParchi::new(wheat()).with_vendor("vendor-123");
        let document = parchi.to_document().unwrap();

        for key in ["id", "trade_data", "vendor_id", "status", "created_at", "updated_at"] {
            assert!(document.get(key).is_some(), "missing {key}");
        }
        assert_eq!(document["status"], "COMPLETED");
        assert_eq!(document["trade_data"]["total_amount"], "2550.00");
        assert_eq!(document["trade_data"]["mandi_cess"], "127.50");
    }

    #[test]
    fn from_json_fills_optional_fields() {
        let document = serde_json::json!({
            "id": "6f1c2a8e-3b4d-4e5f-8a9b-0c1d2e3f4a5b",
            "trade_data": {
                "product_name": "Onion",
                "quantity": "40",
                "unit": "kg",
                "unit_price": "28",
                "total_amount": "1120.00",
                "mandi_cess": "56.00",
                "language": "en"
            },
            "created_at": "2026-01-26T14:30:00Z",
            "updated_at": "2026-01-26T14:30:00Z"
        });

        let parchi = DigitalParchi::from_document(document.clone()).unwrap();
        assert_eq!(parchi.id.to_string(), "6f1c2a8e-3b4d-4e5f-8a9b-0c1d2e3f4a5b");
        assert_eq!(parchi.status, ParchiStatus::Completed);
        assert_eq!(parchi.vendor_id, None);
        assert!(!parchi.trade_data.conversation_id.is_empty());

        let mut anonymous = document;
        anonymous.as_object_mut().unwrap().remove("id");
        assert!(matches!(
            DigitalParchi::from_document(anonymous).unwrap_err(),
            ValidationError::Malformed(message) if message.contains("id")
        ));
    }

    #[test]
    fn from_json_validates() {
        assert!(matches!(
            DigitalParchi::from_json("{not json").unwrap_err(),
            ValidationError::Malformed(_)
        ));

        let mut document = DigitalParchi::new(wheat()).to_document().unwrap();
        document["status"] = serde_json::json!("ARCHIVED");
        assert!(matches!(
            DigitalParchi::from_document(document).unwrap_err(),
            ValidationError::Malformed(_)
        ));

        let mut document = DigitalParchi::new(wheat()).to_document().unwrap();
        document["trade_data"]["total_amount"] = serde_json::json!("9999.00");
        assert!(matches!(
            DigitalParchi::from_document(document).unwrap_err(),
            ValidationError::InconsistentAmount { .. }
        ));
    }

    #[test]
    fn apply_update_moves_updated_at_forward() {
        let mut parchi = DigitalParchi::new(wheat()).with_vendor("vendor-123");
        let before = parchi.updated_at;

        let update = ParchiUpdate::default()
            .status(ParchiStatus::Cancelled)
            .vendor("vendor-456");
        parchi.apply_update(update).unwrap();
        assert_eq!(parchi.status, ParchiStatus::Cancelled);
        assert_eq!(parchi.vendor_id.as_deref(), Some("vendor-456"));
        assert!(parchi.updated_at > before);

        let before = parchi.updated_at;
        parchi.apply_update(ParchiUpdate::default()).unwrap();
        assert!(parchi.updated_at > before);
    }

    #[test]
    fn apply_update_keeps_updated_at_monotonic_with_future_timestamps() {
        let mut parchi = DigitalParchi::new(wheat());
        parchi.updated_at = Utc::now() + Duration::hours(1);
        let before = parchi.updated_at;

        parchi.apply_update(ParchiUpdate::default().clear_vendor()).unwrap();
        assert_eq!(parchi.updated_at, before + Duration::nanoseconds(1));
    }

    #[test]
    fn rejected_update_leaves_record_untouched() {
        let mut parchi = DigitalParchi::new(wheat());
        let original = parchi.clone();

        let mut broken = wheat();
        broken.total_amount = dec!(1);
        let update = ParchiUpdate::default()
            .status(ParchiStatus::Draft)
            .trade_data(broken);
        let err = parchi.apply_update(update).unwrap_err();

        assert!(matches!(err, ValidationError::InconsistentAmount { .. }));
        assert_eq!(parchi, original);
    }

    #[test]
    fn update_json_distinguishes_clear_from_absent() {
        let update: ParchiUpdate = serde_json::from_str(r#"{"vendor_id": null}"#).unwrap();
        assert_eq!(update.vendor_id, Some(None));

        let update: ParchiUpdate = serde_json::from_str(r#"{"status": "DRAFT"}"#).unwrap();
        assert_eq!(update.vendor_id, None);
        assert_eq!(update.status, Some(ParchiStatus::Draft));
        assert!(!update.is_empty());
        assert!(ParchiUpdate::default().is_empty());
    }
}
