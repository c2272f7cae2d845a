use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Row in the stocks table — one (account, stock) position.
///
/// Uniquely keyed by `(account_id, stock_name)`. The derived fields are
/// always recomputed from quantity/avg_price/market_price; values coming
/// off a scrape are never trusted directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stock {
    pub id: Uuid,
    pub account_id: Uuid,
    /// Denormalized owning-account name.
    pub account_name: String,
    pub stock_name: String,
    pub avg_price: Decimal,
    pub market_price: Decimal,
    pub quantity: Decimal,
    pub invested_value: Decimal,
    pub current_value: Decimal,
    pub pnl: Decimal,
    pub pnl_percent: Decimal,
    pub sector: Option<String>,
    pub subsector: Option<String>,
    pub cap_category: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
