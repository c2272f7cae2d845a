use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;

use crate::models::RawHolding;

// ---------------------------------------------------------------------------
// Typed candidate schema
// ---------------------------------------------------------------------------

/// The shapes broker holdings APIs have been seen to use. Field aliases
/// cover the known variants; anything outside them falls through to the
/// heuristic leaf matcher.
#[derive(Debug, Deserialize)]
struct ApiHolding {
    #[serde(alias = "symbol", alias = "tradingSymbol", alias = "stockName", alias = "companyName")]
    name: String,
    #[serde(alias = "qty", alias = "netQty", alias = "holdingQty")]
    quantity: Decimal,
    #[serde(default, alias = "avgPrice", alias = "averagePrice", alias = "buyAvgPrice")]
    avg_price: Option<Decimal>,
    #[serde(default, alias = "ltp", alias = "lastPrice", alias = "marketPrice", alias = "closePrice")]
    market_price: Option<Decimal>,
    #[serde(default)]
    sector: Option<String>,
    #[serde(default, alias = "industry", alias = "subSector")]
    subsector: Option<String>,
}

impl From<ApiHolding> for RawHolding {
    fn from(h: ApiHolding) -> Self {
        RawHolding {
            stock_name: h.name.trim().to_string(),
            quantity: h.quantity,
            avg_price: h.avg_price,
            market_price: h.market_price,
            sector: h.sector,
            subsector: h.subsector,
        }
    }
}

// ---------------------------------------------------------------------------
// Network-response extraction
// ---------------------------------------------------------------------------

const NAME_KEYS: &[&str] = &["name", "symbol", "stock", "scrip", "company"];
const QTY_KEYS: &[&str] = &["quantity", "qty", "units", "shares"];
const AVG_KEYS: &[&str] = &["avg", "average", "buy"];
const PRICE_KEYS: &[&str] = &["ltp", "last", "market", "close", "price"];

/// Walk an intercepted JSON body and collect every object that looks like a
/// holding. The typed schema is tried first on each array element; heuristic
/// field-name matching only runs at the leaves where the schema does not
/// fit.
pub fn extract_candidates(body: &Value) -> Vec<RawHolding> {
    let mut out = Vec::new();
    walk(body, &mut out);
    out
}

fn walk(value: &Value, out: &mut Vec<RawHolding>) {
    match value {
        Value::Array(items) => {
            for item in items {
                if let Some(holding) = candidate_from_object(item) {
                    out.push(holding);
                } else {
                    walk(item, out);
                }
            }
        }
        Value::Object(map) => {
            for nested in map.values() {
                walk(nested, out);
            }
        }
        _ => {}
    }
}

fn candidate_from_object(value: &Value) -> Option<RawHolding> {
    if !value.is_object() {
        return None;
    }

    if let Ok(typed) = serde_json::from_value::<ApiHolding>(value.clone()) {
        let holding = RawHolding::from(typed);
        if !holding.stock_name.is_empty() {
            return Some(holding);
        }
    }

    // Heuristic fallback: match leaf field names case-insensitively.
    let obj = value.as_object()?;
    let name = find_string(obj, NAME_KEYS)?;
    let quantity = find_decimal(obj, QTY_KEYS)?;
    Some(RawHolding {
        stock_name: name,
        quantity,
        avg_price: find_decimal(obj, AVG_KEYS),
        market_price: find_decimal(obj, PRICE_KEYS),
        sector: None,
        subsector: None,
    })
}

fn find_string(obj: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<String> {
    for (key, value) in obj {
        let key = key.to_lowercase();
        if keys.iter().any(|k| key.contains(k)) {
            if let Some(s) = value.as_str() {
                let s = s.trim();
                if !s.is_empty() {
                    return Some(s.to_string());
                }
            }
        }
    }
    None
}

fn find_decimal(obj: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<Decimal> {
    for (key, value) in obj {
        let key = key.to_lowercase();
        if keys.iter().any(|k| key.contains(k)) {
            if let Some(d) = value_to_decimal(value) {
                return Some(d);
            }
        }
    }
    None
}

fn value_to_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        Value::String(s) => parse_decimal(s),
        _ => None,
    }
}

/// Tolerant decimal parse for scraped text: strips currency symbols,
/// thousands separators and whitespace.
pub fn parse_decimal(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(&cleaned).ok()
}

// ---------------------------------------------------------------------------
// DOM-row extraction
// ---------------------------------------------------------------------------

/// Parse the array produced by a profile's holdings-row script. Rows without
/// a name or parseable quantity are dropped.
pub fn parse_dom_rows(value: &Value) -> Vec<RawHolding> {
    let Some(rows) = value.as_array() else {
        return Vec::new();
    };

    rows.iter()
        .filter_map(|row| {
            let name = row.get("name")?.as_str()?.trim().to_string();
            if name.is_empty() {
                return None;
            }
            let quantity = row.get("quantity").and_then(value_to_decimal)?;
            Some(RawHolding {
                stock_name: name,
                quantity,
                avg_price: row.get("avg_price").and_then(value_to_decimal),
                market_price: row.get("market_price").and_then(value_to_decimal),
                sector: None,
                subsector: None,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Source merge
// ---------------------------------------------------------------------------

/// Merge DOM-scraped and network-intercepted holdings, deduplicated by
/// lowercased stock name. DOM wins ties: the table the user sees is treated
/// as more trustworthy than whichever API payload happened to be in flight.
pub fn merge_sources(dom: Vec<RawHolding>, network: Vec<RawHolding>) -> Vec<RawHolding> {
    let mut merged: Vec<RawHolding> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for holding in network.into_iter().chain(dom) {
        let key = holding.stock_name.to_lowercase();
        match index.get(&key) {
            Some(&i) => merged[i] = holding,
            None => {
                index.insert(key, merged.len());
                merged.push(holding);
            }
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_typed_extraction() {
        let body = json!({
            "data": {
                "holdings": [
                    { "tradingSymbol": "TCS", "qty": "12", "avgPrice": "3200.50", "ltp": 3350 },
                    { "tradingSymbol": "INFY", "qty": 5 }
                ]
            }
        });

        let holdings = extract_candidates(&body);
        assert_eq!(holdings.len(), 2);
        assert_eq!(holdings[0].stock_name, "TCS");
        assert_eq!(holdings[0].quantity, Decimal::from(12));
        assert_eq!(holdings[0].avg_price, Some(Decimal::new(320050, 2)));
        assert_eq!(holdings[1].market_price, None);
    }

    #[test]
    fn test_heuristic_extraction_at_leaves() {
        // Field names outside the typed schema, matched heuristically.
        let body = json!([
            { "scripName": "HDFCBANK", "netQuantity": 8, "lastTradedPrice": "1520.25" }
        ]);

        let holdings = extract_candidates(&body);
        assert_eq!(holdings.len(), 1);
        assert_eq!(holdings[0].stock_name, "HDFCBANK");
        assert_eq!(holdings[0].quantity, Decimal::from(8));
        assert_eq!(holdings[0].market_price, Some(Decimal::new(152025, 2)));
    }

    #[test]
    fn test_non_holding_payloads_yield_nothing() {
        let body = json!({ "status": "ok", "user": { "id": 7 } });
        assert!(extract_candidates(&body).is_empty());
    }

    #[test]
    fn test_parse_decimal_strips_formatting() {
        assert_eq!(parse_decimal("₹1,234.50"), Some(Decimal::new(123450, 2)));
        assert_eq!(parse_decimal(" 15 "), Some(Decimal::from(15)));
        assert_eq!(parse_decimal("n/a"), None);
    }

    #[test]
    fn test_dom_rows_drop_incomplete() {
        let rows = json!([
            { "name": "TCS", "quantity": "10", "avg_price": "3200", "market_price": "3300" },
            { "name": "", "quantity": "5" },
            { "name": "INFY" }
        ]);

        let holdings = parse_dom_rows(&rows);
        assert_eq!(holdings.len(), 1);
        assert_eq!(holdings[0].stock_name, "TCS");
    }

    fn holding(name: &str, quantity: i64) -> RawHolding {
        RawHolding {
            stock_name: name.into(),
            quantity: Decimal::from(quantity),
            avg_price: None,
            market_price: None,
            sector: None,
            subsector: None,
        }
    }

    #[test]
    fn test_merge_dom_wins_case_insensitive() {
        let dom = vec![holding("Tcs", 10)];
        let network = vec![holding("TCS", 99), holding("INFY", 5)];

        let merged = merge_sources(dom, network);
        assert_eq!(merged.len(), 2);
        // DOM row replaced the network row in place.
        assert_eq!(merged[0].stock_name, "Tcs");
        assert_eq!(merged[0].quantity, Decimal::from(10));
        assert_eq!(merged[1].stock_name, "INFY");
    }
}
