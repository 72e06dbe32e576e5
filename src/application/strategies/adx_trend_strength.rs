use super::{DirectionalDecision, TradingStrategy};
use crate::domain::{Action, AnalysisFrame, ThresholdStore};
use std::collections::HashMap;

const REQUIRED: &[&str] = &["close", "adx_14", "plus_di", "minus_di"];

/// Trend strategy: ADX above a strong-trend threshold with a +DI/-DI
/// crossover indicating direction (SPEC_FULL.md §4.5.x).
pub struct AdxTrendStrengthStrategy {
    pub strong_trend_threshold: f64,
    pub base_confidence: f64,
    pub di_spread_scale: f64,
    pub min_confidence: f64,
}

impl AdxTrendStrengthStrategy {
    pub fn from_store(store: &ThresholdStore) -> Self {
        Self {
            strong_trend_threshold: store.get("strategies.adx_trend_strength.strong_trend_threshold", 30.0),
            base_confidence: store.get("strategies.adx_trend_strength.base_confidence", 0.50),
            di_spread_scale: store.get("strategies.adx_trend_strength.di_spread_scale", 0.01),
            min_confidence: store.get("strategies.adx_trend_strength.min_confidence", 0.35),
        }
    }
}

impl TradingStrategy for AdxTrendStrengthStrategy {
    fn analyze(&self, main: &AnalysisFrame, _multi_tf: &HashMap<String, AnalysisFrame>) -> DirectionalDecision {
        let adx = main.last_value("adx_14").unwrap_or(0.0);
        let plus_di = main.last_value("plus_di").unwrap_or(0.0);
        let minus_di = main.last_value("minus_di").unwrap_or(0.0);

        if adx < self.strong_trend_threshold {
            return DirectionalDecision::hold("trend not strong enough");
        }

        let action = if plus_di > minus_di {
            Action::Buy
        } else if minus_di > plus_di {
            Action::Sell
        } else {
            return DirectionalDecision::hold("+DI/-DI at parity");
        };

        let di_spread = (plus_di - minus_di).abs();
        let confidence = (self.base_confidence + di_spread * self.di_spread_scale)
            .clamp(self.min_confidence, 0.85);

        let mut indicators = HashMap::new();
        indicators.insert("adx".to_string(), adx);
        indicators.insert("plus_di".to_string(), plus_di);
        indicators.insert("minus_di".to_string(), minus_di);

        DirectionalDecision {
            action,
            confidence,
            strength: confidence,
            reason: Some(format!("ADX {adx:.1} with DI spread {di_spread:.1}")),
            indicators,
            metadata: HashMap::new(),
        }
    }

    fn get_required_features(&self) -> &'static [&'static str] {
        REQUIRED
    }

    fn name(&self) -> &str {
        "ADXTrendStrength"
    }

    fn strategy_type(&self) -> &str {
        "adx_trend_strength"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Candle;

    fn store() -> ThresholdStore {
        ThresholdStore::new("/nonexistent/base.yaml", "/nonexistent/overlay.yaml")
    }

    fn frame(adx: f64, plus_di: f64, minus_di: f64) -> AnalysisFrame {
        let candle = Candle { timestamp: 0, open: 100.0, high: 100.0, low: 100.0, close: 100.0, volume: 0.0 };
        AnalysisFrame::new(vec![candle; 20])
            .with_column("adx_14", vec![adx; 20])
            .with_column("plus_di", vec![plus_di; 20])
            .with_column("minus_di", vec![minus_di; 20])
    }

    #[test]
    fn buy_on_strong_uptrend() {
        let store = store();
        let strategy = AdxTrendStrengthStrategy::from_store(&store);
        let f = frame(35.0, 30.0, 10.0);
        let decision = strategy.analyze(&f, &HashMap::new());
        assert_eq!(decision.action, Action::Buy);
    }

    #[test]
    fn holds_below_strong_trend_threshold() {
        let store = store();
        let strategy = AdxTrendStrengthStrategy::from_store(&store);
        let f = frame(20.0, 30.0, 10.0);
        let decision = strategy.analyze(&f, &HashMap::new());
        assert_eq!(decision.action, Action::Hold);
    }
}
