use crate::application::strategies::DirectionalDecision;
use crate::domain::{Action, StrategySignal};
use chrono::Utc;
use std::collections::HashMap;

/// Inputs the risk annotator needs beyond the raw directional decision
/// (SPEC_FULL.md §4.6).
pub struct RiskContext {
    pub current_price: f64,
    pub atr: Option<f64>,
    pub base_size: f64,
    pub sl_multiplier: f64,
    pub tp_ratio: f64,
}

/// Transforms a strategy's raw directional decision into a risk-annotated
/// `StrategySignal` (SPEC_FULL.md §4.6): attaches stop-loss, take-profit,
/// position size, and risk ratio, or emits an ERROR-flagged HOLD when the
/// ATR needed to size the trade is zero or missing.
pub fn annotate(strategy_name: &str, decision: DirectionalDecision, ctx: &RiskContext) -> StrategySignal {
    if decision.action.is_hold() {
        return StrategySignal {
            strategy_name: strategy_name.to_string(),
            timestamp: Utc::now(),
            action: Action::Hold,
            confidence: decision.confidence,
            strength: decision.strength,
            current_price: ctx.current_price,
            entry_price: None,
            stop_loss: None,
            take_profit: None,
            position_size: None,
            risk_ratio: None,
            indicators: Some(decision.indicators),
            reason: decision.reason,
            metadata: Some(decision.metadata),
        };
    }

    let atr = match ctx.atr {
        Some(value) if value > 0.0 => value,
        _ => {
            let mut metadata = decision.metadata;
            metadata.insert("error".to_string(), serde_json::Value::String("zero_or_missing_atr".to_string()));
            return StrategySignal {
                strategy_name: strategy_name.to_string(),
                timestamp: Utc::now(),
                action: Action::Hold,
                confidence: 0.0,
                strength: 0.0,
                current_price: ctx.current_price,
                entry_price: None,
                stop_loss: None,
                take_profit: None,
                position_size: None,
                risk_ratio: None,
                indicators: Some(decision.indicators),
                reason: Some("signal builder: cannot size trade without a valid ATR".to_string()),
                metadata: Some(metadata),
            };
        }
    };

    let sl_distance = atr * ctx.sl_multiplier;
    let tp_distance = sl_distance * ctx.tp_ratio;

    let (stop_loss, take_profit) = match decision.action {
        Action::Buy => (ctx.current_price - sl_distance, ctx.current_price + tp_distance),
        Action::Sell => (ctx.current_price + sl_distance, ctx.current_price - tp_distance),
        _ => unreachable!("HOLD handled above"),
    };

    let position_size = (ctx.base_size * decision.confidence).clamp(0.0, ctx.base_size);
    let risk_ratio = (ctx.current_price - stop_loss).abs() / ctx.current_price;

    StrategySignal {
        strategy_name: strategy_name.to_string(),
        timestamp: Utc::now(),
        action: decision.action,
        confidence: decision.confidence,
        strength: decision.strength,
        current_price: ctx.current_price,
        entry_price: Some(ctx.current_price),
        stop_loss: Some(stop_loss),
        take_profit: Some(take_profit),
        position_size: Some(position_size),
        risk_ratio: Some(risk_ratio),
        indicators: Some(decision.indicators),
        reason: decision.reason,
        metadata: Some(decision.metadata),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> RiskContext {
        RiskContext {
            current_price: 100.0,
            atr: Some(2.0),
            base_size: 1.0,
            sl_multiplier: 1.5,
            tp_ratio: 1.29,
        }
    }

    #[test]
    fn buy_signal_satisfies_risk_geometry() {
        let decision = DirectionalDecision {
            action: Action::Buy,
            confidence: 0.6,
            strength: 0.6,
            reason: None,
            indicators: HashMap::new(),
            metadata: HashMap::new(),
        };
        let signal = annotate("Test", decision, &ctx());
        assert!(signal.risk_geometry_valid());
        assert_eq!(signal.position_size, Some(0.6));
    }

    #[test]
    fn sell_signal_satisfies_risk_geometry() {
        let decision = DirectionalDecision {
            action: Action::Sell,
            confidence: 0.4,
            strength: 0.4,
            reason: None,
            indicators: HashMap::new(),
            metadata: HashMap::new(),
        };
        let signal = annotate("Test", decision, &ctx());
        assert!(signal.risk_geometry_valid());
    }

    #[test]
    fn zero_atr_produces_error_flagged_hold() {
        let decision = DirectionalDecision {
            action: Action::Buy,
            confidence: 0.6,
            strength: 0.6,
            reason: None,
            indicators: HashMap::new(),
            metadata: HashMap::new(),
        };
        let mut context = ctx();
        context.atr = Some(0.0);
        let signal = annotate("Test", decision, &context);
        assert_eq!(signal.action, Action::Hold);
        assert_eq!(signal.confidence, 0.0);
        assert!(signal.stop_loss.is_none());
    }

    #[test]
    fn hold_decision_carries_no_risk_fields() {
        let decision = DirectionalDecision::hold("no edge");
        let signal = annotate("Test", decision, &ctx());
        assert!(signal.stop_loss.is_none());
        assert!(signal.take_profit.is_none());
        assert!(signal.position_size.is_none());
    }
}
