use rust_decimal::Decimal;

use crate::models::{Stock, ViewStock, ViewSummary};

/// Derived financial fields for one position. All decimal — repeated
/// aggregation must not accumulate float rounding error.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedFields {
    pub invested_value: Decimal,
    pub current_value: Decimal,
    pub pnl: Decimal,
    pub pnl_percent: Decimal,
}

/// Recompute the derived fields of a position from its primitives.
///
/// `pnl_percent` is defined as 0 when invested value is exactly zero. That
/// is documented policy, not an error: a zero-cost position has no
/// meaningful percentage return.
pub fn derived_fields(quantity: Decimal, avg_price: Decimal, market_price: Decimal) -> DerivedFields {
    let invested_value = quantity * avg_price;
    let current_value = quantity * market_price;
    let pnl = current_value - invested_value;
    let pnl_percent = if invested_value.is_zero() {
        Decimal::ZERO
    } else {
        pnl / invested_value * Decimal::ONE_HUNDRED
    };
    DerivedFields {
        invested_value,
        current_value,
        pnl,
        pnl_percent,
    }
}

/// Sum invested/current/quantity over a set of rows, with the same
/// zero-investment guard on the percentage.
pub fn summarize_stocks(rows: &[Stock]) -> ViewSummary {
    summarize(rows.iter().map(|r| (r.invested_value, r.current_value, r.quantity)))
}

/// Same totals over a view's merged rows.
pub fn summarize_view_stocks(rows: &[ViewStock]) -> ViewSummary {
    summarize(rows.iter().map(|r| (r.invested_value, r.current_value, r.quantity)))
}

fn summarize(rows: impl Iterator<Item = (Decimal, Decimal, Decimal)>) -> ViewSummary {
    let mut invested_value = Decimal::ZERO;
    let mut current_value = Decimal::ZERO;
    let mut quantity = Decimal::ZERO;

    for (invested, current, qty) in rows {
        invested_value += invested;
        current_value += current;
        quantity += qty;
    }

    let pnl = current_value - invested_value;
    let pnl_percent = if invested_value.is_zero() {
        Decimal::ZERO
    } else {
        pnl / invested_value * Decimal::ONE_HUNDRED
    };

    ViewSummary {
        invested_value,
        current_value,
        quantity,
        pnl,
        pnl_percent,
    }
}
