use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use mandi_core::{DigitalParchi, ParchiStatus, TradeData, ValidationError, round_currency};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSummary {
    pub trade_count: u64,
    pub total_value: Decimal,
    pub total_cess: Decimal,
    pub average_trade_value: Decimal,
}

impl LedgerSummary {
    /// Totals over every receipt that was not cancelled. Fails when a total
    /// outgrows the decimal range.
    pub fn from_parchis(parchis: &[DigitalParchi]) -> Result<Self, ValidationError> {
        let mut summary = Self {
            trade_count: 0,
            total_value: Decimal::ZERO,
            total_cess: Decimal::ZERO,
            average_trade_value: Decimal::ZERO,
        };

        for trade in settled_trades(parchis) {
            summary.trade_count += 1;
            summary.total_value =
                accumulate(summary.total_value, trade.total_amount, "total_value")?;
            summary.total_cess =
                accumulate(summary.total_cess, trade.mandi_cess, "total_cess")?;
        }

        if summary.trade_count > 0 {
            summary.average_trade_value =
                round_currency(summary.total_value / Decimal::from(summary.trade_count));
        }

        Ok(summary)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductPerformance {
    pub product_name: String,
    pub trade_count: u64,
    pub total_value: Decimal,
    pub total_quantity: Decimal,
}

/// Per-product totals, best seller first.
pub fn product_performance(
    parchis: &[DigitalParchi],
) -> Result<Vec<ProductPerformance>, ValidationError> {
    let mut by_product: BTreeMap<&str, ProductPerformance> = BTreeMap::new();

    for trade in settled_trades(parchis) {
        let entry = by_product
            .entry(trade.product_name.as_str())
            .or_insert_with(|| ProductPerformance {
                product_name: trade.product_name.clone(),
                trade_count: 0,
                total_value: Decimal::ZERO,
                total_quantity: Decimal::ZERO,
            });
        entry.trade_count += 1;
        entry.total_value = accumulate(entry.total_value, trade.total_amount, "total_value")?;
        entry.total_quantity =
            accumulate(entry.total_quantity, trade.quantity, "total_quantity")?;
    }

    let mut ranked: Vec<ProductPerformance> = by_product.into_values().collect();
    ranked.sort_by(|a, b| b.total_value.cmp(&a.total_value));
    Ok(ranked)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsReport {
    pub generated_at: DateTime<Utc>,
    pub language: String,
    pub base_cost: Decimal,
    pub summary: LedgerSummary,
    pub total_profit: Decimal,
    pub profitable_trades: u64,
    pub profit_margin_percent: Decimal,
    pub success_rate_percent: Decimal,
    pub top_product: Option<String>,
    pub product_performance: Vec<ProductPerformance>,
    pub trade_details: Vec<TradeData>,
}

impl AnalyticsReport {
    /// Profit of a trade is `(unit_price - base_cost) × quantity`; margin is
    /// total profit over total value, success rate the share of trades with a
    /// positive profit.
    pub fn build(
        parchis: &[DigitalParchi],
        base_cost: Decimal,
        language: &str,
    ) -> Result<Self, ValidationError> {
        let summary = LedgerSummary::from_parchis(parchis)?;
        let products = product_performance(parchis)?;

        let mut total_profit = Decimal::ZERO;
        let mut profitable_trades = 0_u64;
        for trade in settled_trades(parchis) {
            let profit = trade
                .unit_price
                .checked_sub(base_cost)
                .and_then(|margin| margin.checked_mul(trade.quantity))
                .ok_or_else(|| ValidationError::out_of_range("total_profit", "profit overflows"))?;
            total_profit = accumulate(total_profit, profit, "total_profit")?;
            if profit > Decimal::ZERO {
                profitable_trades += 1;
            }
        }

        let profit_margin_percent = percent(total_profit, summary.total_value)?;
        let success_rate_percent = percent(
            Decimal::from(profitable_trades),
            Decimal::from(summary.trade_count),
        )?;

        Ok(Self {
            generated_at: Utc::now(),
            language: language.to_string(),
            base_cost,
            total_profit: round_currency(total_profit),
            profitable_trades,
            profit_margin_percent,
            success_rate_percent,
            top_product: products.first().map(|p| p.product_name.clone()),
            product_performance: products,
            trade_details: settled_trades(parchis).cloned().collect(),
            summary,
        })
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn settled_trades(parchis: &[DigitalParchi]) -> impl Iterator<Item = &TradeData> {
    parchis
        .iter()
        .filter(|parchi| parchi.status != ParchiStatus::Cancelled)
        .map(|parchi| &parchi.trade_data)
}

fn accumulate(
    total: Decimal,
    value: Decimal,
    field: &'static str,
) -> Result<Decimal, ValidationError> {
    total
        .checked_add(value)
        .ok_or_else(|| ValidationError::out_of_range(field, "sum exceeds the decimal range"))
}

fn percent(part: Decimal, whole: Decimal) -> Result<Decimal, ValidationError> {
    if whole.is_zero() {
        return Ok(Decimal::ZERO);
    }
    let ratio = part
        .checked_div(whole)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .ok_or_else(|| ValidationError::out_of_range("percent", "ratio exceeds the decimal range"))?;
    Ok(ratio.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
}
