use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A saved combination of N accounts whose holdings are aggregated into a
/// single unified position set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct View {
    pub id: Uuid,
    /// Unique, compared case-insensitively at write time.
    pub name: String,
    pub summary: ViewSummary,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Many-to-many membership row between views and accounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewAccount {
    pub view_id: Uuid,
    pub account_id: Uuid,
}

/// One aggregated position inside a view: same-named holdings across the
/// view's member accounts merged into a single weighted-average row.
/// Exactly one per `(view_id, stock_name)`; the whole set is regenerated
/// whenever any contributing account's holdings change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewStock {
    pub id: Uuid,
    pub view_id: Uuid,
    pub stock_name: String,
    /// Account name of the latest-updated contributing row. Informational.
    pub account_name: String,
    /// Quantity-weighted average across contributing accounts.
    pub avg_price: Decimal,
    /// Latest contributor's market price.
    pub market_price: Decimal,
    /// Sum across contributing accounts.
    pub quantity: Decimal,
    pub invested_value: Decimal,
    pub current_value: Decimal,
    pub pnl: Decimal,
    pub pnl_percent: Decimal,
    pub sector: Option<String>,
    pub subsector: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Aggregate totals over a set of stock rows.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ViewSummary {
    pub invested_value: Decimal,
    pub current_value: Decimal,
    pub quantity: Decimal,
    pub pnl: Decimal,
    pub pnl_percent: Decimal,
}
