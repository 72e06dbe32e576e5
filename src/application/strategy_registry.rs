use crate::application::strategies::adx_trend_strength::AdxTrendStrengthStrategy;
use crate::application::strategies::atr_exhaustion::AtrExhaustionStrategy;
use crate::application::strategies::bb_reversal::BbReversalStrategy;
use crate::application::strategies::donchian_channel::DonchianChannelStrategy;
use crate::application::strategies::macd_ema_crossover::MacdEmaCrossoverStrategy;
use crate::application::strategies::stochastic_reversal::StochasticReversalStrategy;
use crate::application::strategies::TradingStrategy;
use crate::domain::ThresholdStore;
use crate::errors::{CoreError, CoreResult};
use std::collections::HashMap;
use std::sync::Arc;

type Factory = Arc<dyn Fn(&ThresholdStore) -> Arc<dyn TradingStrategy> + Send + Sync>;

/// Metadata recorded for each registered strategy (SPEC_FULL.md §3, §4.4).
#[derive(Clone)]
pub struct StrategyRegistration {
    pub name: String,
    pub strategy_type: String,
    pub factory: Factory,
}

/// Process-wide mapping from strategy name to its factory.
///
/// Registration is declarative; Rust has no runtime class decorators, so
/// the source's `@StrategyRegistry.register(...)` pattern is realized as
/// an explicit builder called once at process startup (SPEC_FULL.md §4.4
/// "ambient" note, grounded in `strategy_registry.py`). Re-registering a
/// name under a different strategy type is an error.
pub struct StrategyRegistry {
    entries: HashMap<String, StrategyRegistration>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Registers the six canonical strategies named in SPEC_FULL.md §4.5.x.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry
            .register("BBReversal", "bb_reversal", |store| {
                Arc::new(BbReversalStrategy::from_store(store))
            })
            .expect("builtin registration cannot collide");
        registry
            .register("ATRExhaustion", "atr_based", |store| {
                Arc::new(AtrExhaustionStrategy::from_store(store))
            })
            .expect("builtin registration cannot collide");
        registry
            .register("DonchianChannel", "donchian_channel", |store| {
                Arc::new(DonchianChannelStrategy::from_store(store))
            })
            .expect("builtin registration cannot collide");
        registry
            .register("StochasticReversal", "stochastic_reversal", |store| {
                Arc::new(StochasticReversalStrategy::from_store(store))
            })
            .expect("builtin registration cannot collide");
        registry
            .register("MACDEMACrossover", "macd_ema_crossover", |store| {
                Arc::new(MacdEmaCrossoverStrategy::from_store(store))
            })
            .expect("builtin registration cannot collide");
        registry
            .register("ADXTrendStrength", "adx_trend_strength", |store| {
                Arc::new(AdxTrendStrengthStrategy::from_store(store))
            })
            .expect("builtin registration cannot collide");
        registry
    }

    pub fn register(
        &mut self,
        name: &str,
        strategy_type: &str,
        factory: impl Fn(&ThresholdStore) -> Arc<dyn TradingStrategy> + Send + Sync + 'static,
    ) -> CoreResult<()> {
        if let Some(existing) = self.entries.get(name) {
            return Err(CoreError::DuplicateStrategy(
                name.to_string(),
                existing.strategy_type.clone(),
            ));
        }
        self.entries.insert(
            name.to_string(),
            StrategyRegistration {
                name: name.to_string(),
                strategy_type: strategy_type.to_string(),
                factory: Arc::new(factory),
            },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> CoreResult<&StrategyRegistration> {
        self.entries
            .get(name)
            .ok_or_else(|| CoreError::UnknownStrategy(name.to_string()))
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn list_strategies(&self) -> Vec<&str> {
        self.entries.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registers_all_six_canonical_strategies() {
        let registry = StrategyRegistry::builtin();
        assert_eq!(registry.len(), 6);
        for name in [
            "BBReversal",
            "ATRExhaustion",
            "DonchianChannel",
            "StochasticReversal",
            "MACDEMACrossover",
            "ADXTrendStrength",
        ] {
            assert!(registry.is_registered(name));
        }
    }

    #[test]
    fn duplicate_registration_fails_fast() {
        let mut registry = StrategyRegistry::new();
        registry
            .register("X", "atr_based", |store| Arc::new(AtrExhaustionStrategy::from_store(store)))
            .unwrap();
        let result = registry.register("X", "atr_based", |store| {
            Arc::new(AtrExhaustionStrategy::from_store(store))
        });
        assert!(result.is_err());
    }

    #[test]
    fn lookup_of_unknown_strategy_is_an_error() {
        let registry = StrategyRegistry::new();
        assert!(registry.get("Nope").is_err());
    }
}
