use super::{DirectionalDecision, TradingStrategy};
use crate::domain::{Action, AnalysisFrame, ThresholdStore};
use std::collections::HashMap;

const REQUIRED: &[&str] = &["close", "macd", "macd_signal", "ema_20", "ema_50", "volume", "adx_14"];

/// Trend strategy: a MACD line / signal crossover, confirmed by EMA20 vs
/// EMA50 agreeing on direction and an above-average volume bar
/// (SPEC_FULL.md §4.5.x).
pub struct MacdEmaCrossoverStrategy {
    pub adx_trend_threshold: f64,
    pub volume_lookback: usize,
    pub volume_confirmation_multiplier: f64,
    pub base_confidence: f64,
    pub volume_bonus: f64,
    pub min_confidence: f64,
}

impl MacdEmaCrossoverStrategy {
    pub fn from_store(store: &ThresholdStore) -> Self {
        Self {
            adx_trend_threshold: store.get("strategies.macd_ema_crossover.adx_trend_threshold", 20.0),
            volume_lookback: store.get("strategies.macd_ema_crossover.volume_lookback", 20),
            volume_confirmation_multiplier: store
                .get("strategies.macd_ema_crossover.volume_confirmation_multiplier", 1.2),
            base_confidence: store.get("strategies.macd_ema_crossover.base_confidence", 0.45),
            volume_bonus: store.get("strategies.macd_ema_crossover.volume_bonus", 0.10),
            min_confidence: store.get("strategies.macd_ema_crossover.min_confidence", 0.35),
        }
    }
}

impl TradingStrategy for MacdEmaCrossoverStrategy {
    fn analyze(&self, main: &AnalysisFrame, _multi_tf: &HashMap<String, AnalysisFrame>) -> DirectionalDecision {
        let macd = main.last_value("macd").unwrap_or(0.0);
        let macd_signal = main.last_value("macd_signal").unwrap_or(0.0);
        let ema_20 = main.last_value("ema_20").unwrap_or(0.0);
        let ema_50 = main.last_value("ema_50").unwrap_or(0.0);
        let adx = main.last_value("adx_14").unwrap_or(0.0);

        if adx < self.adx_trend_threshold {
            return DirectionalDecision::hold("no trend strength present");
        }

        let macd_bullish = macd > macd_signal;
        let ema_bullish = ema_20 > ema_50;

        let action = if macd_bullish && ema_bullish {
            Action::Buy
        } else if !macd_bullish && !ema_bullish {
            Action::Sell
        } else {
            return DirectionalDecision::hold("MACD and EMA trend disagree");
        };

        let volume_confirms = self.volume_confirms(main);

        let mut confidence = self.base_confidence;
        if volume_confirms {
            confidence += self.volume_bonus;
        }
        confidence = confidence.clamp(self.min_confidence, 0.80);

        let mut indicators = HashMap::new();
        indicators.insert("macd".to_string(), macd);
        indicators.insert("macd_signal".to_string(), macd_signal);
        indicators.insert("adx".to_string(), adx);

        DirectionalDecision {
            action,
            confidence,
            strength: confidence,
            reason: Some(format!("MACD/EMA crossover, adx {adx:.1}")),
            indicators,
            metadata: HashMap::new(),
        }
    }

    fn get_required_features(&self) -> &'static [&'static str] {
        REQUIRED
    }

    fn name(&self) -> &str {
        "MACDEMACrossover"
    }

    fn strategy_type(&self) -> &str {
        "macd_ema_crossover"
    }
}

impl MacdEmaCrossoverStrategy {
    fn volume_confirms(&self, main: &AnalysisFrame) -> bool {
        let volumes = match main.column("volume") {
            Some(v) => v,
            None => return false,
        };
        if volumes.len() < 2 {
            return false;
        }
        let window = &volumes[volumes.len().saturating_sub(self.volume_lookback)..volumes.len() - 1];
        if window.is_empty() {
            return false;
        }
        let avg = window.iter().sum::<f64>() / window.len() as f64;
        let latest = *volumes.last().unwrap();
        avg > 0.0 && latest > avg * self.volume_confirmation_multiplier
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Candle;

    fn store() -> ThresholdStore {
        ThresholdStore::new("/nonexistent/base.yaml", "/nonexistent/overlay.yaml")
    }

    #[test]
    fn buy_on_bullish_crossover_with_volume_confirmation() {
        let store = store();
        let strategy = MacdEmaCrossoverStrategy::from_store(&store);
        let candle = Candle { timestamp: 0, open: 100.0, high: 100.0, low: 100.0, close: 100.0, volume: 10.0 };
        let mut volumes = vec![10.0; 19];
        volumes.push(50.0);
        let frame = AnalysisFrame::new(vec![candle; 20])
            .with_column("macd", vec![1.0; 20])
            .with_column("macd_signal", vec![0.5; 20])
            .with_column("ema_20", vec![105.0; 20])
            .with_column("ema_50", vec![100.0; 20])
            .with_column("adx_14", vec![25.0; 20])
            .with_column("volume", volumes);

        let decision = strategy.analyze(&frame, &HashMap::new());
        assert_eq!(decision.action, Action::Buy);
        assert!(decision.confidence > strategy.base_confidence);
    }

    #[test]
    fn holds_without_trend_strength() {
        let store = store();
        let strategy = MacdEmaCrossoverStrategy::from_store(&store);
        let candle = Candle { timestamp: 0, open: 100.0, high: 100.0, low: 100.0, close: 100.0, volume: 10.0 };
        let frame = AnalysisFrame::new(vec![candle; 20])
            .with_column("macd", vec![1.0; 20])
            .with_column("macd_signal", vec![0.5; 20])
            .with_column("ema_20", vec![105.0; 20])
            .with_column("ema_50", vec![100.0; 20])
            .with_column("adx_14", vec![10.0; 20])
            .with_column("volume", vec![10.0; 20]);

        let decision = strategy.analyze(&frame, &HashMap::new());
        assert_eq!(decision.action, Action::Hold);
    }
}
