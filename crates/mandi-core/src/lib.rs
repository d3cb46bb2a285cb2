pub mod calculations;
pub mod error;
pub mod models;
pub mod samples;
pub mod storage;

pub use calculations::{
    IntoAmount, calculate_final_amount, calculate_mandi_cess, calculate_total_amount,
    mandi_cess_rate, round_currency, validate_calculation_consistency,
};
pub use error::{DatabaseError, LedgerError, LedgerResult, ValidationError};
pub use models::{DigitalParchi, ParchiStatus, ParchiUpdate, TradeData};
pub use samples::{SAMPLE_PRODUCTS, sample_trade};
pub use storage::{DEFAULT_PAGE_LIMIT, HealthReport, HealthStatus, Page, ParchiFilter, ParchiStore};
