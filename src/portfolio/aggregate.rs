use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::cmp::Reverse;
use std::collections::HashMap;

use crate::models::Stock;

use super::math::derived_fields;

/// One merged position across all contributing accounts, before the caller
/// fills in view id and row id.
#[derive(Debug, Clone)]
pub struct AggregatedStock {
    pub stock_name: String,
    /// Account name of the latest-updated contributing row.
    pub account_name: String,
    pub avg_price: Decimal,
    pub market_price: Decimal,
    pub quantity: Decimal,
    pub invested_value: Decimal,
    pub current_value: Decimal,
    pub pnl: Decimal,
    pub pnl_percent: Decimal,
    pub sector: Option<String>,
    pub subsector: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Merge per-account holdings into one row per distinct stock name.
///
/// Grouping is by exact (case-sensitive) stock name — ticker aliasing is
/// deliberately not normalized. For each group:
/// - quantity is summed,
/// - avg price is the quantity-weighted average (0 when total quantity is 0),
/// - market price, sector, subsector and the denormalized account name come
///   from the latest contributor: greatest `updated_at`, ties broken by
///   smallest `account_id` so same-batch commits stay deterministic,
/// - derived P&L fields are recomputed from the merged quantity and prices.
///
/// Output keeps the first-appearance order of names in the input.
pub fn aggregate_stocks_for_view(stocks: &[Stock]) -> Vec<AggregatedStock> {
    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<&Stock>> = HashMap::new();

    for stock in stocks {
        let group = groups.entry(stock.stock_name.as_str()).or_insert_with(|| {
            order.push(stock.stock_name.as_str());
            Vec::new()
        });
        group.push(stock);
    }

    order
        .into_iter()
        .map(|name| merge_group(&groups[name]))
        .collect()
}

fn merge_group(group: &[&Stock]) -> AggregatedStock {
    let total_quantity: Decimal = group.iter().map(|s| s.quantity).sum();
    let weighted_cost: Decimal = group.iter().map(|s| s.avg_price * s.quantity).sum();

    let avg_price = if total_quantity.is_zero() {
        Decimal::ZERO
    } else {
        weighted_cost / total_quantity
    };

    let latest = group
        .iter()
        .max_by_key(|s| (s.updated_at, Reverse(s.account_id)))
        .expect("merge_group called with non-empty group");

    let derived = derived_fields(total_quantity, avg_price, latest.market_price);

    AggregatedStock {
        stock_name: latest.stock_name.clone(),
        account_name: latest.account_name.clone(),
        avg_price,
        market_price: latest.market_price,
        quantity: total_quantity,
        invested_value: derived.invested_value,
        current_value: derived.current_value,
        pnl: derived.pnl,
        pnl_percent: derived.pnl_percent,
        sector: latest.sector.clone(),
        subsector: latest.subsector.clone(),
        updated_at: latest.updated_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn make_stock(
        account_name: &str,
        stock_name: &str,
        quantity: i64,
        avg_price: i64,
        market_price: i64,
    ) -> Stock {
        let now = Utc::now();
        let d = derived_fields(
            Decimal::from(quantity),
            Decimal::from(avg_price),
            Decimal::from(market_price),
        );
        Stock {
            id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            account_name: account_name.into(),
            stock_name: stock_name.into(),
            avg_price: Decimal::from(avg_price),
            market_price: Decimal::from(market_price),
            quantity: Decimal::from(quantity),
            invested_value: d.invested_value,
            current_value: d.current_value,
            pnl: d.pnl,
            pnl_percent: d.pnl_percent,
            sector: None,
            subsector: None,
            cap_category: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_weighted_average_across_accounts() {
        // Account A holds 10 @ 100, account B holds 5 @ 130 of the same stock
        // → merged position is 15 @ (1000 + 650) / 15 = 110, exactly.
        let a = make_stock("zerodha", "ABC", 10, 100, 120);
        let b = make_stock("groww", "ABC", 5, 130, 120);

        let merged = aggregate_stocks_for_view(&[a, b]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].quantity, Decimal::from(15));
        assert_eq!(merged[0].avg_price, Decimal::from(110));
        assert_eq!(merged[0].invested_value, Decimal::from(1650));
        assert_eq!(merged[0].current_value, Decimal::from(1800));
    }

    #[test]
    fn test_distinct_names_stay_separate() {
        let rows = vec![
            make_stock("a", "TCS", 1, 100, 100),
            make_stock("b", "INFY", 2, 50, 60),
            make_stock("a", "INFY", 3, 40, 60),
        ];
        let merged = aggregate_stocks_for_view(&rows);
        assert_eq!(merged.len(), 2);
        // First-appearance order preserved
        assert_eq!(merged[0].stock_name, "TCS");
        assert_eq!(merged[1].stock_name, "INFY");
        assert_eq!(merged[1].quantity, Decimal::from(5));
    }

    #[test]
    fn test_grouping_is_case_sensitive() {
        let rows = vec![
            make_stock("a", "Abc", 1, 100, 100),
            make_stock("b", "ABC", 1, 100, 100),
        ];
        let merged = aggregate_stocks_for_view(&rows);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_latest_contributor_supplies_market_fields() {
        let mut older = make_stock("old-account", "ABC", 10, 100, 90);
        older.sector = Some("IT".into());
        older.updated_at = Utc::now() - Duration::hours(1);

        let mut newer = make_stock("new-account", "ABC", 5, 130, 140);
        newer.sector = Some("Technology".into());

        let merged = aggregate_stocks_for_view(&[older, newer]);
        assert_eq!(merged[0].account_name, "new-account");
        assert_eq!(merged[0].market_price, Decimal::from(140));
        assert_eq!(merged[0].sector.as_deref(), Some("Technology"));
    }

    #[test]
    fn test_same_timestamp_tie_breaks_on_account_id() {
        let ts = Utc::now();
        let mut a = make_stock("first", "ABC", 1, 100, 100);
        let mut b = make_stock("second", "ABC", 1, 100, 200);
        a.updated_at = ts;
        b.updated_at = ts;

        let winner_name = if a.account_id < b.account_id {
            "first"
        } else {
            "second"
        };

        // Same result regardless of input order.
        let m1 = aggregate_stocks_for_view(&[a.clone(), b.clone()]);
        let m2 = aggregate_stocks_for_view(&[b, a]);
        assert_eq!(m1[0].account_name, winner_name);
        assert_eq!(m2[0].account_name, winner_name);
    }

    #[test]
    fn test_zero_total_quantity_guard() {
        let a = make_stock("a", "ABC", 0, 100, 100);
        let b = make_stock("b", "ABC", 0, 130, 100);
        let merged = aggregate_stocks_for_view(&[a, b]);
        assert_eq!(merged[0].avg_price, Decimal::ZERO);
        assert_eq!(merged[0].pnl_percent, Decimal::ZERO);
    }

    #[test]
    fn test_empty_input() {
        assert!(aggregate_stocks_for_view(&[]).is_empty());
    }
}
