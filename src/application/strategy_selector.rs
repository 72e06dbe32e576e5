use crate::domain::{Regime, ThresholdStore};
use std::collections::HashMap;

/// Canonical strategy names this selector knows how to weight
/// (SPEC_FULL.md §4.3; extended from the three-strategy original to all
/// six strategies named in §4.5.x — see DESIGN.md).
pub const STRATEGY_NAMES: &[&str] = &[
    "BBReversal",
    "ATRExhaustion",
    "DonchianChannel",
    "StochasticReversal",
    "MACDEMACrossover",
    "ADXTrendStrength",
];

/// Maps a market regime to a per-strategy weight map and exposes the
/// regime's position-size limit, both sourced from the threshold store
/// with built-in fallbacks (SPEC_FULL.md §4.3, grounded in
/// `dynamic_strategy_selector.py`).
pub struct DynamicStrategySelector<'a> {
    store: &'a ThresholdStore,
}

impl<'a> DynamicStrategySelector<'a> {
    pub fn new(store: &'a ThresholdStore) -> Self {
        Self { store }
    }

    pub fn get_regime_weights(&self, regime: Regime) -> HashMap<String, f64> {
        let config_key = format!(
            "dynamic_strategy_selection.regime_strategy_mapping.{}",
            regime.key()
        );
        let default_weights = self.default_weights(regime);

        let weights: HashMap<String, f64> = self.store.get(&config_key, default_weights.clone());

        if regime == Regime::HighVolatility && weights.values().all(|w| *w == 0.0) {
            tracing::info!("high volatility detected: all strategies disabled (wait mode)");
            return weights;
        }

        if !weights.is_empty() && !self.validate_weights(&weights) {
            let total: f64 = weights.values().sum();
            tracing::warn!(
                regime = %regime,
                total,
                "regime strategy weights do not sum to 1.0 (or 0.0); using built-in default"
            );
            return default_weights;
        }

        weights
    }

    /// Weight sum must lie in `[0.99, 1.01]` (normal operation) or
    /// `[-0.01, 0.01]` (all strategies disabled). An empty map is always
    /// valid.
    pub fn validate_weights(&self, weights: &HashMap<String, f64>) -> bool {
        if weights.is_empty() {
            return true;
        }
        let total: f64 = weights.values().sum();
        let is_valid_one = (0.99..=1.01).contains(&total);
        let is_valid_zero = (-0.01..=0.01).contains(&total);
        is_valid_one || is_valid_zero
    }

    pub fn get_regime_position_limit(&self, regime: Regime) -> u32 {
        let key = format!("dynamic_strategy_selection.position_limits.{}", regime.key());
        let default = match regime {
            Regime::HighVolatility => 0,
            Regime::Trending => 3,
            Regime::TightRange => 6,
            Regime::NormalRange => 5,
        };
        self.store.get(&key, default)
    }

    pub fn is_enabled(&self) -> bool {
        self.store.get("dynamic_strategy_selection.enabled", true)
    }

    /// Built-in fallback weights, covering every registered strategy
    /// (strategies unused in a regime get an explicit 0.0 weight so
    /// `StrategyManager::update_strategy_weights`'s partial-update
    /// semantics stay unambiguous, per SPEC_FULL.md §4.3).
    fn default_weights(&self, regime: Regime) -> HashMap<String, f64> {
        let table: &[(&str, f64)] = match regime {
            Regime::TightRange => &[
                ("BBReversal", 0.25),
                ("ATRExhaustion", 0.30),
                ("DonchianChannel", 0.25),
                ("StochasticReversal", 0.20),
                ("MACDEMACrossover", 0.0),
                ("ADXTrendStrength", 0.0),
            ],
            Regime::NormalRange => &[
                ("BBReversal", 0.15),
                ("ATRExhaustion", 0.25),
                ("DonchianChannel", 0.20),
                ("StochasticReversal", 0.15),
                ("MACDEMACrossover", 0.15),
                ("ADXTrendStrength", 0.10),
            ],
            Regime::Trending => &[
                ("BBReversal", 0.0),
                ("ATRExhaustion", 0.10),
                ("DonchianChannel", 0.10),
                ("StochasticReversal", 0.0),
                ("MACDEMACrossover", 0.35),
                ("ADXTrendStrength", 0.45),
            ],
            Regime::HighVolatility => &[
                ("BBReversal", 0.0),
                ("ATRExhaustion", 0.0),
                ("DonchianChannel", 0.0),
                ("StochasticReversal", 0.0),
                ("MACDEMACrossover", 0.0),
                ("ADXTrendStrength", 0.0),
            ],
        };
        table.iter().map(|(name, w)| (name.to_string(), *w)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ThresholdStore {
        ThresholdStore::new("/nonexistent/base.yaml", "/nonexistent/overlay.yaml")
    }

    #[test]
    fn every_regime_default_covers_all_six_strategies() {
        let store = store();
        let selector = DynamicStrategySelector::new(&store);
        for regime in [
            Regime::TightRange,
            Regime::NormalRange,
            Regime::Trending,
            Regime::HighVolatility,
        ] {
            let weights = selector.get_regime_weights(regime);
            for name in STRATEGY_NAMES {
                assert!(weights.contains_key(*name), "{regime} missing {name}");
            }
        }
    }

    #[test]
    fn high_volatility_is_all_zero() {
        let store = store();
        let selector = DynamicStrategySelector::new(&store);
        let weights = selector.get_regime_weights(Regime::HighVolatility);
        assert!(weights.values().all(|w| *w == 0.0));
        assert_eq!(selector.get_regime_position_limit(Regime::HighVolatility), 0);
    }

    #[test]
    fn validate_weights_accepts_sum_near_one_or_zero() {
        let store = store();
        let selector = DynamicStrategySelector::new(&store);

        let mut one = HashMap::new();
        one.insert("A".to_string(), 0.6);
        one.insert("B".to_string(), 0.4);
        assert!(selector.validate_weights(&one));

        let mut zero = HashMap::new();
        zero.insert("A".to_string(), 0.0);
        assert!(selector.validate_weights(&zero));

        let mut invalid = HashMap::new();
        invalid.insert("A".to_string(), 0.5);
        invalid.insert("B".to_string(), 0.2);
        assert!(!selector.validate_weights(&invalid));
    }
}
