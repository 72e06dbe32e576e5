use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Directional action a strategy or the integrator may emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Buy,
    Sell,
    Hold,
    Close,
}

impl Action {
    pub fn is_entry(self) -> bool {
        matches!(self, Action::Buy | Action::Sell)
    }

    pub fn is_exit(self) -> bool {
        matches!(self, Action::Close)
    }

    pub fn is_hold(self) -> bool {
        matches!(self, Action::Hold)
    }
}

/// The standardized signal shape produced by every strategy and by the
/// Strategy Manager's integrated output (SPEC_FULL.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategySignal {
    pub strategy_name: String,
    pub timestamp: DateTime<Utc>,
    pub action: Action,
    pub confidence: f64,
    pub strength: f64,
    pub current_price: f64,
    pub entry_price: Option<f64>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub position_size: Option<f64>,
    pub risk_ratio: Option<f64>,
    pub indicators: Option<HashMap<String, f64>>,
    pub reason: Option<String>,
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

impl StrategySignal {
    /// `+confidence` for BUY, `-confidence` for SELL, `0.0` for HOLD.
    /// This is the signed-encoding contract the ML feature pipeline
    /// consumes (SPEC_FULL.md §4.7).
    pub fn signed_encoding(&self) -> f64 {
        match self.action {
            Action::Buy => self.confidence,
            Action::Sell => -self.confidence,
            Action::Hold | Action::Close => 0.0,
        }
    }

    pub fn is_entry_signal(&self) -> bool {
        self.action.is_entry()
    }

    pub fn is_exit_signal(&self) -> bool {
        self.action.is_exit()
    }

    pub fn is_hold_signal(&self) -> bool {
        self.action.is_hold()
    }

    /// Checks the §3 risk-geometry invariant for BUY/SELL signals that
    /// carry SL/TP. Signals without risk annotation (HOLD, or pre-annotation
    /// directional decisions) trivially satisfy this.
    pub fn risk_geometry_valid(&self) -> bool {
        match (self.action, self.stop_loss, self.take_profit) {
            (Action::Buy, Some(sl), Some(tp)) => sl < self.current_price && self.current_price < tp,
            (Action::Sell, Some(sl), Some(tp)) => tp < self.current_price && self.current_price < sl,
            _ => true,
        }
    }
}

/// Outcome of the external Risk Service for one cycle (SPEC_FULL.md §3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Approved,
    Denied,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeEvaluation {
    pub decision: Decision,
    pub side: Action,
    pub position_size: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub risk_score: f64,
    pub denial_reasons: Vec<String>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl TradeEvaluation {
    pub fn is_approved(&self) -> bool {
        self.decision == Decision::Approved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_signal(action: Action, confidence: f64) -> StrategySignal {
        StrategySignal {
            strategy_name: "Test".into(),
            timestamp: Utc::now(),
            action,
            confidence,
            strength: confidence,
            current_price: 100.0,
            entry_price: None,
            stop_loss: None,
            take_profit: None,
            position_size: None,
            risk_ratio: None,
            indicators: None,
            reason: None,
            metadata: None,
        }
    }

    #[test]
    fn signed_encoding_round_trip() {
        let buy = base_signal(Action::Buy, 0.7);
        let sell = base_signal(Action::Sell, 0.7);
        let hold = base_signal(Action::Hold, 0.9);

        assert_eq!(buy.signed_encoding(), 0.7);
        assert_eq!(sell.signed_encoding(), -0.7);
        assert_eq!(hold.signed_encoding(), 0.0);
    }

    #[test]
    fn risk_geometry_valid_for_buy() {
        let mut s = base_signal(Action::Buy, 0.5);
        s.stop_loss = Some(95.0);
        s.take_profit = Some(110.0);
        assert!(s.risk_geometry_valid());

        s.stop_loss = Some(105.0);
        assert!(!s.risk_geometry_valid());
    }

    #[test]
    fn risk_geometry_valid_for_sell() {
        let mut s = base_signal(Action::Sell, 0.5);
        s.stop_loss = Some(105.0);
        s.take_profit = Some(90.0);
        assert!(s.risk_geometry_valid());
    }
}
