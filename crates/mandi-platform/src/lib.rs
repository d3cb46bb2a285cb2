pub mod config;
pub mod contracts;
pub mod db;

pub use config::ServiceConfig;
pub use contracts::{
    CountResponse, CreateParchiRequest, ListParchisQuery, MAX_PAGE_LIMIT, MAX_SAMPLE_COUNT,
    ReportQuery, SeedSamplesQuery, SeedSamplesResponse,
};
pub use db::connect_store;
