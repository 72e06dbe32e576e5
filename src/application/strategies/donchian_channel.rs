use super::{DirectionalDecision, TradingStrategy};
use crate::domain::{Action, AnalysisFrame, ThresholdStore};
use std::collections::HashMap;

const REQUIRED: &[&str] = &["close", "donchian_upper", "donchian_lower", "rsi_14", "adx_14"];

/// Range strategy: price sitting at a Donchian-channel extremity signals
/// mean-reversion; RSI must confirm (SPEC_FULL.md §4.5.x).
pub struct DonchianChannelStrategy {
    pub extremity_threshold: f64,
    pub adx_range_threshold: f64,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub base_confidence: f64,
    pub min_confidence: f64,
}

impl DonchianChannelStrategy {
    pub fn from_store(store: &ThresholdStore) -> Self {
        Self {
            extremity_threshold: store.get("strategies.donchian_channel.extremity_threshold", 0.10),
            adx_range_threshold: store.get("strategies.donchian_channel.adx_range_threshold", 25.0),
            rsi_oversold: store.get("strategies.donchian_channel.rsi_oversold", 35.0),
            rsi_overbought: store.get("strategies.donchian_channel.rsi_overbought", 65.0),
            base_confidence: store.get("strategies.donchian_channel.base_confidence", 0.40),
            min_confidence: store.get("strategies.donchian_channel.min_confidence", 0.35),
        }
    }
}

impl TradingStrategy for DonchianChannelStrategy {
    fn analyze(&self, main: &AnalysisFrame, _multi_tf: &HashMap<String, AnalysisFrame>) -> DirectionalDecision {
        let close = main.last_close().unwrap_or(0.0);
        let upper = main.last_value("donchian_upper").unwrap_or(close);
        let lower = main.last_value("donchian_lower").unwrap_or(close);
        let adx = main.last_value("adx_14").unwrap_or(0.0);
        let rsi = main.last_value("rsi_14").unwrap_or(50.0);

        if adx >= self.adx_range_threshold {
            return DirectionalDecision::hold("market trending, not ranging");
        }

        let channel_width = upper - lower;
        if channel_width <= 0.0 {
            return DirectionalDecision::hold("degenerate Donchian channel");
        }
        let position = (close - lower) / channel_width;

        let action = if position < self.extremity_threshold && rsi < self.rsi_oversold {
            Action::Buy
        } else if position > 1.0 - self.extremity_threshold && rsi > self.rsi_overbought {
            Action::Sell
        } else {
            return DirectionalDecision::hold("no channel-extremity/RSI agreement");
        };

        let confidence = self.base_confidence.clamp(self.min_confidence, 0.75);

        let mut indicators = HashMap::new();
        indicators.insert("channel_position".to_string(), position);
        indicators.insert("rsi".to_string(), rsi);

        DirectionalDecision {
            action,
            confidence,
            strength: confidence,
            reason: Some(format!("Donchian extremity at {position:.2}, RSI {rsi:.1}")),
            indicators,
            metadata: HashMap::new(),
        }
    }

    fn get_required_features(&self) -> &'static [&'static str] {
        REQUIRED
    }

    fn name(&self) -> &str {
        "DonchianChannel"
    }

    fn strategy_type(&self) -> &str {
        "donchian_channel"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Candle;

    fn store() -> ThresholdStore {
        ThresholdStore::new("/nonexistent/base.yaml", "/nonexistent/overlay.yaml")
    }

    fn frame(close: f64, upper: f64, lower: f64, adx: f64, rsi: f64) -> AnalysisFrame {
        let candle = Candle { timestamp: 0, open: close, high: close, low: close, close, volume: 0.0 };
        AnalysisFrame::new(vec![candle; 20])
            .with_column("donchian_upper", vec![upper; 20])
            .with_column("donchian_lower", vec![lower; 20])
            .with_column("adx_14", vec![adx; 20])
            .with_column("rsi_14", vec![rsi; 20])
    }

    #[test]
    fn sell_at_upper_extremity_with_rsi_confirmation() {
        let store = store();
        let strategy = DonchianChannelStrategy::from_store(&store);
        let f = frame(109.0, 110.0, 90.0, 15.0, 75.0);
        let decision = strategy.analyze(&f, &HashMap::new());
        assert_eq!(decision.action, Action::Sell);
    }
}
