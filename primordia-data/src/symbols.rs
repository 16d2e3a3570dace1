//! Static region → market symbol table. Not sourced from the network.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolRole {
    Primary,
    Secondary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MarketSymbol {
    pub ticker: &'static str,
    pub name: &'static str,
    pub role: SymbolRole,
    pub description: &'static str,
}

const fn primary(ticker: &'static str, name: &'static str, description: &'static str) -> MarketSymbol {
    MarketSymbol {
        ticker,
        name,
        role: SymbolRole::Primary,
        description,
    }
}

const fn secondary(ticker: &'static str, name: &'static str, description: &'static str) -> MarketSymbol {
    MarketSymbol {
        ticker,
        name,
        role: SymbolRole::Secondary,
        description,
    }
}

const SHANGHAI: &[MarketSymbol] = &[
    primary("FXI", "China Large-Cap ETF", "iShares China Large-Cap ETF"),
    secondary("KWEB", "China Internet ETF", "KraneShares CSI China Internet ETF"),
    secondary("YINN", "China Bull 3X", "Direxion Daily FTSE China Bull 3X"),
];

const SHENZHEN: &[MarketSymbol] = &[
    primary("MCHI", "iShares China ETF", "iShares MSCI China ETF"),
    secondary("CQQQ", "China Tech ETF", "Invesco China Technology ETF"),
    secondary("ASHR", "A-Shares ETF", "Xtrackers Harvest CSI 300 China A-Shares ETF"),
];

const SUEZ: &[MarketSymbol] = &[
    primary("BDRY", "Dry Bulk Shipping", "Breakwave Dry Bulk Shipping ETF"),
    secondary("USO", "US Oil Fund", "United States Oil Fund"),
    secondary("BOAT", "Shipping ETF", "SonicShares Global Shipping ETF"),
    secondary("GOGL", "Golden Ocean", "Golden Ocean Group"),
];

const LA_PORT: &[MarketSymbol] = &[
    primary("IYT", "Transportation ETF", "iShares U.S. Transportation ETF"),
    secondary("XLI", "Industrials ETF", "Industrial Select Sector SPDR"),
    secondary("SBLK", "Star Bulk Carriers", "Star Bulk Carriers Corp"),
    secondary("ZIM", "ZIM Shipping", "ZIM Integrated Shipping Services"),
];

const ROTTERDAM: &[MarketSymbol] = &[
    primary("EWN", "Netherlands ETF", "iShares MSCI Netherlands ETF"),
    secondary("UNG", "Natural Gas Fund", "United States Natural Gas Fund"),
    secondary("TTF1!", "EU Natural Gas", "Dutch TTF Natural Gas Futures"),
    secondary("EWG", "Germany ETF", "iShares MSCI Germany ETF"),
];

/// Symbols tracked for a region, primary first. Unknown regions have none.
pub fn market_symbols(region_id: &str) -> &'static [MarketSymbol] {
    match region_id {
        "shanghai" => SHANGHAI,
        "shenzhen" => SHENZHEN,
        "suez" => SUEZ,
        "la_port" => LA_PORT,
        "rotterdam" => ROTTERDAM,
        _ => &[],
    }
}

/// The primary symbol of a region, if it has one.
pub fn primary_symbol(region_id: &str) -> Option<&'static MarketSymbol> {
    market_symbols(region_id)
        .iter()
        .find(|symbol| symbol.role == SymbolRole::Primary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_table_has_one_primary_first() {
        for region in ["shanghai", "shenzhen", "suez", "la_port", "rotterdam"] {
            let symbols = market_symbols(region);
            assert!(!symbols.is_empty(), "{region}");
            assert_eq!(symbols[0].role, SymbolRole::Primary, "{region}");
            assert_eq!(
                symbols.iter().filter(|s| s.role == SymbolRole::Primary).count(),
                1,
                "{region}"
            );
        }
    }

    #[test]
    fn test_lookup() {
        assert_eq!(primary_symbol("suez").map(|s| s.ticker), Some("BDRY"));
        assert_eq!(market_symbols("la_port")[3].ticker, "ZIM");
        assert!(market_symbols("atlantis").is_empty());
        assert!(primary_symbol("atlantis").is_none());
    }
}
