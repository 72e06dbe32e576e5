use super::{DirectionalDecision, TradingStrategy};
use crate::domain::{Action, AnalysisFrame, ThresholdStore};
use std::collections::HashMap;

const REQUIRED: &[&str] = &["close", "bb_upper", "bb_lower", "rsi_14", "adx_14"];

/// Range strategy: price at a Bollinger band edge signals mean-reversion.
///
/// `bb_primary_mode` (store-sourced, default `true`) picks which role RSI
/// plays: in bonus mode the band edge alone emits a signal and a
/// confirming RSI only adds to confidence; in the deprecated gate mode RSI
/// must confirm the same direction (strict AND-gate) before any signal is
/// emitted at all (SPEC_FULL.md §4.5.x).
pub struct BbReversalStrategy {
    pub band_edge_threshold: f64,
    pub adx_range_threshold: f64,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub base_confidence: f64,
    pub min_confidence: f64,
    pub bb_primary_mode: bool,
    pub rsi_confirmation_bonus: f64,
}

impl BbReversalStrategy {
    pub fn from_store(store: &ThresholdStore) -> Self {
        Self {
            band_edge_threshold: store.get("strategies.bb_reversal.band_edge_threshold", 0.15),
            adx_range_threshold: store.get("strategies.bb_reversal.adx_range_threshold", 25.0),
            rsi_oversold: store.get("strategies.bb_reversal.rsi_oversold", 30.0),
            rsi_overbought: store.get("strategies.bb_reversal.rsi_overbought", 70.0),
            base_confidence: store.get("strategies.bb_reversal.base_confidence", 0.45),
            min_confidence: store.get("strategies.bb_reversal.min_confidence", 0.35),
            bb_primary_mode: store.get("strategies.bb_reversal.bb_primary_mode", true),
            rsi_confirmation_bonus: store.get("strategies.bb_reversal.rsi_confirmation_bonus", 0.1),
        }
    }
}

impl TradingStrategy for BbReversalStrategy {
    fn analyze(&self, main: &AnalysisFrame, _multi_tf: &HashMap<String, AnalysisFrame>) -> DirectionalDecision {
        let close = main.last_close().unwrap_or(0.0);
        let bb_upper = main.last_value("bb_upper").unwrap_or(close);
        let bb_lower = main.last_value("bb_lower").unwrap_or(close);
        let adx = main.last_value("adx_14").unwrap_or(0.0);
        let rsi = main.last_value("rsi_14").unwrap_or(50.0);

        if adx >= self.adx_range_threshold {
            return DirectionalDecision::hold("market trending, not ranging");
        }

        let band_width = bb_upper - bb_lower;
        if band_width <= 0.0 {
            return DirectionalDecision::hold("degenerate Bollinger band");
        }
        let bb_position = (close - bb_lower) / band_width;

        let at_lower_edge = bb_position < self.band_edge_threshold;
        let at_upper_edge = bb_position > 1.0 - self.band_edge_threshold;
        let rsi_confirms_buy = rsi < self.rsi_oversold;
        let rsi_confirms_sell = rsi > self.rsi_overbought;

        let action = if self.bb_primary_mode {
            if at_lower_edge {
                Action::Buy
            } else if at_upper_edge {
                Action::Sell
            } else {
                return DirectionalDecision::hold("no band-edge reached");
            }
        } else if at_lower_edge && rsi_confirms_buy {
            Action::Buy
        } else if at_upper_edge && rsi_confirms_sell {
            Action::Sell
        } else {
            return DirectionalDecision::hold("no band-edge/RSI agreement");
        };

        let distance_past_edge = match action {
            Action::Buy => (self.band_edge_threshold - bb_position).max(0.0),
            Action::Sell => (bb_position - (1.0 - self.band_edge_threshold)).max(0.0),
            _ => 0.0,
        };
        let rsi_bonus = if self.bb_primary_mode
            && ((action == Action::Buy && rsi_confirms_buy) || (action == Action::Sell && rsi_confirms_sell))
        {
            self.rsi_confirmation_bonus
        } else {
            0.0
        };
        let confidence =
            (self.base_confidence + distance_past_edge + rsi_bonus).clamp(self.min_confidence, 0.75);

        let mut indicators = HashMap::new();
        indicators.insert("bb_position".to_string(), bb_position);
        indicators.insert("rsi".to_string(), rsi);

        DirectionalDecision {
            action,
            confidence,
            strength: confidence,
            reason: Some(format!("BB reversal at position {bb_position:.2}, RSI {rsi:.1}")),
            indicators,
            metadata: HashMap::new(),
        }
    }

    fn get_required_features(&self) -> &'static [&'static str] {
        REQUIRED
    }

    fn name(&self) -> &str {
        "BBReversal"
    }

    fn strategy_type(&self) -> &str {
        "bb_reversal"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Candle;

    fn store() -> ThresholdStore {
        ThresholdStore::new("/nonexistent/base.yaml", "/nonexistent/overlay.yaml")
    }

    fn frame(close: f64, bb_upper: f64, bb_lower: f64, adx: f64, rsi: f64) -> AnalysisFrame {
        let candle = Candle { timestamp: 0, open: close, high: close, low: close, close, volume: 0.0 };
        AnalysisFrame::new(vec![candle; 20])
            .with_column("bb_upper", vec![bb_upper; 20])
            .with_column("bb_lower", vec![bb_lower; 20])
            .with_column("adx_14", vec![adx; 20])
            .with_column("rsi_14", vec![rsi; 20])
    }

    #[test]
    fn buy_at_lower_band_with_rsi_confirmation() {
        let store = store();
        let strategy = BbReversalStrategy::from_store(&store);
        let f = frame(91.0, 110.0, 90.0, 15.0, 25.0);
        let decision = strategy.analyze(&f, &HashMap::new());
        assert_eq!(decision.action, Action::Buy);
    }

    #[test]
    fn bonus_mode_signals_on_band_edge_alone() {
        let store = store();
        let strategy = BbReversalStrategy::from_store(&store);
        assert!(strategy.bb_primary_mode);
        let without_confirmation = frame(91.0, 110.0, 90.0, 15.0, 50.0);
        let with_confirmation = frame(91.0, 110.0, 90.0, 15.0, 25.0);

        let plain = strategy.analyze(&without_confirmation, &HashMap::new());
        let confirmed = strategy.analyze(&with_confirmation, &HashMap::new());

        assert_eq!(plain.action, Action::Buy);
        assert_eq!(confirmed.action, Action::Buy);
        assert!(confirmed.confidence > plain.confidence);
    }

    #[test]
    fn gate_mode_holds_without_rsi_confirmation() {
        let store = store();
        let mut strategy = BbReversalStrategy::from_store(&store);
        strategy.bb_primary_mode = false;
        let f = frame(91.0, 110.0, 90.0, 15.0, 50.0);
        let decision = strategy.analyze(&f, &HashMap::new());
        assert_eq!(decision.action, Action::Hold);
    }
}
