//! Demo trades for seeding an empty ledger.

use chrono::{Duration, Utc};
use rand::Rng;

use crate::error::ValidationError;
use crate::models::TradeData;

/// English and Hindi names of the staple products offered as samples.
pub const SAMPLE_PRODUCTS: [(&str, &str); 8] = [
    ("Potato", "आलू"),
    ("Tomato", "टमाटर"),
    ("Onion", "प्याज"),
    ("Rice", "चावल"),
    ("Wheat", "गेहूं"),
    ("Carrot", "गाजर"),
    ("Cabbage", "पत्ता गोभी"),
    ("Cauliflower", "फूल गोभी"),
];

/// A random priced trade: 10–100 kg at 15–50 per kg, traded some time in
/// the past week. Hindi sessions get the Hindi name in front.
pub fn sample_trade<R>(rng: &mut R, language: &str) -> Result<TradeData, ValidationError>
where
    R: Rng + ?Sized,
{
    let (english, hindi) = SAMPLE_PRODUCTS[rng.gen_range(0..SAMPLE_PRODUCTS.len())];
    let product_name = if language.trim() == "hi" {
        format!("{hindi} ({english})")
    } else {
        english.to_string()
    };

    let quantity: u32 = rng.gen_range(10..=100);
    let unit_price: u32 = rng.gen_range(15..=50);
    let age = Duration::days(rng.gen_range(0..=7))
        + Duration::hours(rng.gen_range(0..=23))
        + Duration::minutes(rng.gen_range(0..=59));

    Ok(TradeData::new(product_name, quantity, "kg", unit_price, language)?
        .with_timestamp(Utc::now() - age))
}
