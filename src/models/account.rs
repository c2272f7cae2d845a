use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Row in the accounts table — one broker holding-set.
///
/// The summary fields (`invested_value` through `pnl_percent`) are derived
/// from the account's stock set and recomputed on every commit; they are
/// never written independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    /// Unique, compared case-insensitively at write time.
    pub name: String,
    pub invested_value: Decimal,
    pub current_value: Decimal,
    pub pnl: Decimal,
    pub pnl_percent: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn new(name: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            invested_value: Decimal::ZERO,
            current_value: Decimal::ZERO,
            pnl: Decimal::ZERO,
            pnl_percent: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        }
    }
}
