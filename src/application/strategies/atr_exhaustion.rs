use super::{DirectionalDecision, TradingStrategy};
use crate::domain::{Action, AnalysisFrame};
use crate::domain::ThresholdStore;
use std::collections::HashMap;

const REQUIRED: &[&str] = &["close", "high", "low", "atr_14", "adx_14", "rsi_14", "bb_upper", "bb_lower"];

/// Range strategy: today's high-low range consuming a large share of
/// ATR14 implies the day's volatility budget is "used up" and a reversal
/// is likely. Direction is read from where price sits within the
/// Bollinger band, with RSI as a confidence bonus (SPEC_FULL.md §4.5.x,
/// grounded directly in `atr_based.py`).
pub struct AtrExhaustionStrategy {
    pub exhaustion_threshold: f64,
    pub high_exhaustion_threshold: f64,
    pub adx_range_threshold: f64,
    pub bb_position_threshold: f64,
    pub rsi_upper: f64,
    pub rsi_lower: f64,
    pub rsi_confirmation_bonus: f64,
    pub base_confidence: f64,
    pub high_confidence: f64,
    pub min_confidence: f64,
}

impl AtrExhaustionStrategy {
    pub fn from_store(store: &ThresholdStore) -> Self {
        Self {
            exhaustion_threshold: store.get("strategies.atr_based.exhaustion_threshold", 0.70),
            high_exhaustion_threshold: store.get("strategies.atr_based.high_exhaustion_threshold", 0.85),
            adx_range_threshold: store.get("strategies.atr_based.adx_range_threshold", 25.0),
            bb_position_threshold: store.get("strategies.atr_based.bb_position_threshold", 0.20),
            rsi_upper: store.get("strategies.atr_based.rsi_upper", 60.0),
            rsi_lower: store.get("strategies.atr_based.rsi_lower", 40.0),
            rsi_confirmation_bonus: store.get("strategies.atr_based.rsi_confirmation_bonus", 0.05),
            base_confidence: store.get("strategies.atr_based.base_confidence", 0.40),
            high_confidence: store.get("strategies.atr_based.high_confidence", 0.60),
            min_confidence: store.get("strategies.atr_based.min_confidence", 0.35),
        }
    }
}

impl TradingStrategy for AtrExhaustionStrategy {
    fn analyze(&self, main: &AnalysisFrame, _multi_tf: &HashMap<String, AnalysisFrame>) -> DirectionalDecision {
        let high = match main.last_value("high") {
            Some(v) => v,
            None => return DirectionalDecision::hold("missing high"),
        };
        let low = main.last_value("low").unwrap_or(high);
        let atr = main.last_value("atr_14").unwrap_or(0.0);
        let adx = main.last_value("adx_14").unwrap_or(0.0);
        let close = main.last_close().unwrap_or(0.0);
        let bb_upper = main.last_value("bb_upper").unwrap_or(close);
        let bb_lower = main.last_value("bb_lower").unwrap_or(close);
        let rsi = main.last_value("rsi_14").unwrap_or(50.0);

        if atr <= 0.0 {
            return DirectionalDecision::hold("zero ATR, cannot assess exhaustion");
        }

        let exhaustion_ratio = (high - low) / atr;
        if exhaustion_ratio < self.exhaustion_threshold {
            return DirectionalDecision::hold("range not exhausted");
        }

        if adx >= self.adx_range_threshold {
            return DirectionalDecision::hold("market trending, not ranging");
        }

        let band_width = bb_upper - bb_lower;
        if band_width <= 0.0 {
            return DirectionalDecision::hold("degenerate Bollinger band");
        }
        let bb_position = (close - bb_lower) / band_width;

        let at_lower = bb_position < self.bb_position_threshold;
        let at_upper = bb_position > 1.0 - self.bb_position_threshold;

        let action = if at_lower {
            Action::Buy
        } else if at_upper {
            Action::Sell
        } else {
            return DirectionalDecision::hold("price mid-band, no reversal edge");
        };

        let is_high_exhaustion = exhaustion_ratio >= self.high_exhaustion_threshold;
        let mut confidence = if is_high_exhaustion {
            self.high_confidence
        } else {
            self.base_confidence
        };

        let rsi_agrees = match action {
            Action::Buy => rsi < self.rsi_lower,
            Action::Sell => rsi > self.rsi_upper,
            _ => false,
        };
        if rsi_agrees {
            confidence += self.rsi_confirmation_bonus;
        }

        confidence = confidence.clamp(self.min_confidence, 0.75);

        let mut indicators = HashMap::new();
        indicators.insert("exhaustion_ratio".to_string(), exhaustion_ratio);
        indicators.insert("bb_position".to_string(), bb_position);
        indicators.insert("adx".to_string(), adx);
        indicators.insert("rsi".to_string(), rsi);

        DirectionalDecision {
            action,
            confidence,
            strength: confidence,
            reason: Some(format!(
                "ATR exhaustion {exhaustion_ratio:.2} at band edge {bb_position:.2}"
            )),
            indicators,
            metadata: HashMap::new(),
        }
    }

    fn get_required_features(&self) -> &'static [&'static str] {
        REQUIRED
    }

    fn name(&self) -> &str {
        "ATRExhaustion"
    }

    fn strategy_type(&self) -> &str {
        "atr_based"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Candle;

    fn store() -> ThresholdStore {
        ThresholdStore::new("/nonexistent/base.yaml", "/nonexistent/overlay.yaml")
    }

    fn frame(high: f64, low: f64, close: f64, atr: f64, adx: f64, rsi: f64, bb_upper: f64, bb_lower: f64) -> AnalysisFrame {
        let candle = Candle { timestamp: 0, open: close, high, low, close, volume: 0.0 };
        AnalysisFrame::new(vec![candle; 20])
            .with_column("atr_14", vec![atr; 20])
            .with_column("adx_14", vec![adx; 20])
            .with_column("rsi_14", vec![rsi; 20])
            .with_column("bb_upper", vec![bb_upper; 20])
            .with_column("bb_lower", vec![bb_lower; 20])
    }

    #[test]
    fn buy_signal_at_lower_band_with_exhaustion() {
        let store = store();
        let strategy = AtrExhaustionStrategy::from_store(&store);
        let f = frame(101.0, 90.0, 91.0, 10.0, 15.0, 30.0, 110.0, 90.0);

        let decision = strategy.analyze(&f, &HashMap::new());
        assert_eq!(decision.action, Action::Buy);
        assert!(decision.confidence >= strategy.min_confidence);
    }

    #[test]
    fn holds_when_not_exhausted() {
        let store = store();
        let strategy = AtrExhaustionStrategy::from_store(&store);
        let f = frame(95.0, 90.0, 91.0, 100.0, 15.0, 30.0, 110.0, 90.0);

        let decision = strategy.analyze(&f, &HashMap::new());
        assert_eq!(decision.action, Action::Hold);
    }

    #[test]
    fn holds_when_trending() {
        let store = store();
        let strategy = AtrExhaustionStrategy::from_store(&store);
        let f = frame(101.0, 90.0, 91.0, 10.0, 40.0, 30.0, 110.0, 90.0);

        let decision = strategy.analyze(&f, &HashMap::new());
        assert_eq!(decision.action, Action::Hold);
    }
}
