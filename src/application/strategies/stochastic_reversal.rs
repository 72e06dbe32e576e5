use super::{DirectionalDecision, TradingStrategy};
use crate::domain::{Action, AnalysisFrame, ThresholdStore};
use std::collections::HashMap;

const REQUIRED: &[&str] = &["close", "stoch_k", "stoch_d", "adx_14"];

/// Range strategy: Stochastic %K/%D at an extreme with a crossover
/// signals reversal (SPEC_FULL.md §4.5.x).
pub struct StochasticReversalStrategy {
    pub oversold: f64,
    pub overbought: f64,
    pub adx_range_threshold: f64,
    pub base_confidence: f64,
    pub min_confidence: f64,
    pub crossover_bonus: f64,
}

impl StochasticReversalStrategy {
    pub fn from_store(store: &ThresholdStore) -> Self {
        Self {
            oversold: store.get("strategies.stochastic_reversal.oversold", 20.0),
            overbought: store.get("strategies.stochastic_reversal.overbought", 80.0),
            adx_range_threshold: store.get("strategies.stochastic_reversal.adx_range_threshold", 25.0),
            base_confidence: store.get("strategies.stochastic_reversal.base_confidence", 0.40),
            min_confidence: store.get("strategies.stochastic_reversal.min_confidence", 0.35),
            crossover_bonus: store.get("strategies.stochastic_reversal.crossover_bonus", 0.10),
        }
    }
}

impl TradingStrategy for StochasticReversalStrategy {
    fn analyze(&self, main: &AnalysisFrame, _multi_tf: &HashMap<String, AnalysisFrame>) -> DirectionalDecision {
        let k = main.last_value("stoch_k").unwrap_or(50.0);
        let d = main.last_value("stoch_d").unwrap_or(50.0);
        let adx = main.last_value("adx_14").unwrap_or(0.0);

        if adx >= self.adx_range_threshold {
            return DirectionalDecision::hold("market trending, not ranging");
        }

        let action = if k < self.oversold && d < self.oversold {
            Action::Buy
        } else if k > self.overbought && d > self.overbought {
            Action::Sell
        } else {
            return DirectionalDecision::hold("Stochastic not at an extreme");
        };

        let crossover_agrees = match action {
            Action::Buy => k > d,
            Action::Sell => k < d,
            _ => false,
        };

        let mut confidence = self.base_confidence;
        if crossover_agrees {
            confidence += self.crossover_bonus;
        }
        confidence = confidence.clamp(self.min_confidence, 0.75);

        let mut indicators = HashMap::new();
        indicators.insert("stoch_k".to_string(), k);
        indicators.insert("stoch_d".to_string(), d);

        DirectionalDecision {
            action,
            confidence,
            strength: confidence,
            reason: Some(format!("Stochastic extreme K={k:.1} D={d:.1}")),
            indicators,
            metadata: HashMap::new(),
        }
    }

    fn get_required_features(&self) -> &'static [&'static str] {
        REQUIRED
    }

    fn name(&self) -> &str {
        "StochasticReversal"
    }

    fn strategy_type(&self) -> &str {
        "stochastic_reversal"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Candle;

    fn store() -> ThresholdStore {
        ThresholdStore::new("/nonexistent/base.yaml", "/nonexistent/overlay.yaml")
    }

    fn frame(k: f64, d: f64, adx: f64) -> AnalysisFrame {
        let candle = Candle { timestamp: 0, open: 100.0, high: 100.0, low: 100.0, close: 100.0, volume: 0.0 };
        AnalysisFrame::new(vec![candle; 20])
            .with_column("stoch_k", vec![k; 20])
            .with_column("stoch_d", vec![d; 20])
            .with_column("adx_14", vec![adx; 20])
    }

    #[test]
    fn buy_at_oversold_extreme_with_crossover() {
        let store = store();
        let strategy = StochasticReversalStrategy::from_store(&store);
        let f = frame(15.0, 10.0, 15.0);
        let decision = strategy.analyze(&f, &HashMap::new());
        assert_eq!(decision.action, Action::Buy);
        assert!(decision.confidence > strategy.base_confidence);
    }
}
