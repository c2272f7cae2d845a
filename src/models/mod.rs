pub mod account;
pub mod session;
pub mod stock;
pub mod view;

pub use account::Account;
pub use session::{ScrapePreview, ScrapeProgress, ScrapeSession, SessionStatus};
pub use stock::Stock;
pub use view::{View, ViewAccount, ViewStock, ViewSummary};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RawHolding — driver output, pre-persistence
// ---------------------------------------------------------------------------

/// One holding row as extracted from the broker site, before any mapping.
/// Scrape sources are unreliable: everything except name and quantity is
/// optional.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawHolding {
    pub stock_name: String,
    pub quantity: Decimal,
    pub avg_price: Option<Decimal>,
    pub market_price: Option<Decimal>,
    pub sector: Option<String>,
    pub subsector: Option<String>,
}

// ---------------------------------------------------------------------------
// ScrapeCredential — stored broker login
// ---------------------------------------------------------------------------

/// Row in the credentials table. `pin` is absent for brokers that only use
/// OTP-based second factors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeCredential {
    pub account_name: String,
    pub username: String,
    pub password: String,
    pub pin: Option<String>,
}
