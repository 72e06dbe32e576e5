use serde::{Deserialize, Serialize};
use std::fmt;

/// Four-way market state classification (SPEC_FULL.md §3, §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Regime {
    TightRange,
    NormalRange,
    Trending,
    HighVolatility,
}

impl Regime {
    /// True for the two range-type regimes.
    pub fn is_range(self) -> bool {
        matches!(self, Regime::TightRange | Regime::NormalRange)
    }

    /// True only for HIGH_VOLATILITY.
    pub fn is_high_risk(self) -> bool {
        matches!(self, Regime::HighVolatility)
    }

    /// Dotted-path key segment used when looking up regime-scoped
    /// threshold-store entries (e.g. `dynamic_strategy_selection.regime_strategy_mapping.<key>`).
    pub fn key(self) -> &'static str {
        match self {
            Regime::TightRange => "tight_range",
            Regime::NormalRange => "normal_range",
            Regime::Trending => "trending",
            Regime::HighVolatility => "high_volatility",
        }
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_range_covers_exactly_tight_and_normal() {
        assert!(Regime::TightRange.is_range());
        assert!(Regime::NormalRange.is_range());
        assert!(!Regime::Trending.is_range());
        assert!(!Regime::HighVolatility.is_range());
    }

    #[test]
    fn is_high_risk_covers_only_high_volatility() {
        assert!(Regime::HighVolatility.is_high_risk());
        assert!(!Regime::Trending.is_high_risk());
    }
}
