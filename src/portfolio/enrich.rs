/// Sector/subsector classification for a stock name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectorInfo {
    pub sector: &'static str,
    pub subsector: &'static str,
}

/// Static name → (sector, subsector) table. Scrape sources frequently omit
/// classification, so commits fall back to this list for well-known names.
const SECTOR_TABLE: &[(&str, &str, &str)] = &[
    ("RELIANCE", "Energy", "Oil & Gas"),
    ("ONGC", "Energy", "Oil & Gas"),
    ("NTPC", "Energy", "Power"),
    ("TATA POWER", "Energy", "Power"),
    ("ADANI GREEN", "Energy", "Renewables"),
    ("TCS", "Information Technology", "IT Services"),
    ("INFY", "Information Technology", "IT Services"),
    ("INFOSYS", "Information Technology", "IT Services"),
    ("WIPRO", "Information Technology", "IT Services"),
    ("HCLTECH", "Information Technology", "IT Services"),
    ("TECH MAHINDRA", "Information Technology", "IT Services"),
    ("HDFCBANK", "Financials", "Private Bank"),
    ("ICICIBANK", "Financials", "Private Bank"),
    ("KOTAKBANK", "Financials", "Private Bank"),
    ("AXISBANK", "Financials", "Private Bank"),
    ("SBIN", "Financials", "Public Bank"),
    ("BAJFINANCE", "Financials", "NBFC"),
    ("HDFC AMC", "Financials", "Asset Management"),
    ("ITC", "Consumer Staples", "FMCG"),
    ("HINDUNILVR", "Consumer Staples", "FMCG"),
    ("NESTLEIND", "Consumer Staples", "FMCG"),
    ("BRITANNIA", "Consumer Staples", "FMCG"),
    ("MARUTI", "Consumer Discretionary", "Automobiles"),
    ("TATAMOTORS", "Consumer Discretionary", "Automobiles"),
    ("M&M", "Consumer Discretionary", "Automobiles"),
    ("TITAN", "Consumer Discretionary", "Retail"),
    ("DMART", "Consumer Discretionary", "Retail"),
    ("SUNPHARMA", "Healthcare", "Pharmaceuticals"),
    ("DRREDDY", "Healthcare", "Pharmaceuticals"),
    ("CIPLA", "Healthcare", "Pharmaceuticals"),
    ("APOLLOHOSP", "Healthcare", "Hospitals"),
    ("TATASTEEL", "Materials", "Steel"),
    ("JSWSTEEL", "Materials", "Steel"),
    ("HINDALCO", "Materials", "Metals"),
    ("ULTRACEMCO", "Materials", "Cement"),
    ("ASIANPAINT", "Materials", "Paints"),
    ("LT", "Industrials", "Engineering"),
    ("BHARTIARTL", "Communication Services", "Telecom"),
    ("ZOMATO", "Communication Services", "Internet"),
];

/// Case-insensitive exact match on the trimmed name. `None` is a valid
/// terminal outcome — unknown names land in the "Unknown" bucket, they are
/// not an error.
pub fn lookup(stock_name: &str) -> Option<SectorInfo> {
    let needle = stock_name.trim();
    SECTOR_TABLE
        .iter()
        .find(|(name, _, _)| name.eq_ignore_ascii_case(needle))
        .map(|&(_, sector, subsector)| SectorInfo { sector, subsector })
}
