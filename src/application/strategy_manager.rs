use crate::application::signal_builder::{self, RiskContext};
use crate::application::strategies::{StrategyRuntime, TradingStrategy};
use crate::domain::{Action, AnalysisFrame, StrategySignal, ThresholdStore};
use crate::errors::{CoreError, CoreResult};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

/// Compact per-strategy record consumed by the ML feature pipeline
/// (SPEC_FULL.md §4.7).
#[derive(Debug, Clone)]
pub struct IndividualSignal {
    pub action: Action,
    pub confidence: f64,
    pub encoded: f64,
}

struct ManagedStrategy {
    strategy: Arc<dyn TradingStrategy>,
    runtime: StrategyRuntime,
    weight: f64,
}

/// Runs every registered strategy, resolves conflicting directional votes
/// via weighted-confidence integration, and produces a single annotated
/// `StrategySignal` (SPEC_FULL.md §4.7, grounded in `strategy_manager.py`).
pub struct StrategyManager<'a> {
    store: &'a ThresholdStore,
    entries: HashMap<String, ManagedStrategy>,
    sl_multiplier: f64,
    tp_ratio: f64,
    base_size: f64,
}

impl<'a> StrategyManager<'a> {
    pub fn new(store: &'a ThresholdStore) -> Self {
        Self {
            store,
            entries: HashMap::new(),
            sl_multiplier: store.get("position_management.stop_loss.atr_multiplier", 1.5),
            tp_ratio: store.get("position_management.take_profit.default_ratio", 1.29),
            base_size: store.get("trading.base_position_size", 1.0),
        }
    }

    pub fn register(&mut self, strategy: Arc<dyn TradingStrategy>, weight: f64) -> CoreResult<()> {
        if !(0.0..=1.0).contains(&weight) {
            return Err(CoreError::ValueShape(format!(
                "weight {weight} for strategy '{}' out of range [0,1]",
                strategy.name()
            )));
        }
        let name = strategy.name().to_string();
        let max_history = self.store.get("strategies.common.max_signal_history", 1000usize);
        let min_data_points = self.store.get("strategies.common.min_data_points", 20usize);
        self.entries.insert(
            name,
            ManagedStrategy {
                strategy,
                runtime: StrategyRuntime::new(max_history, min_data_points),
                weight,
            },
        );
        Ok(())
    }

    pub fn unregister(&mut self, name: &str) {
        self.entries.remove(name);
    }

    /// Missing strategies are logged and ignored; out-of-range weights are
    /// logged and ignored (SPEC_FULL.md §4.7).
    pub fn update_strategy_weights(&mut self, weights: &HashMap<String, f64>) {
        for (name, weight) in weights {
            match self.entries.get_mut(name) {
                Some(entry) => {
                    if (0.0..=1.0).contains(weight) {
                        entry.weight = *weight;
                    } else {
                        tracing::warn!(name, weight, "weight out of range, ignoring");
                    }
                }
                None => tracing::warn!(name, "unknown strategy in weight update, ignoring"),
            }
        }
    }

    pub fn analyze_market(
        &mut self,
        main: &AnalysisFrame,
        multi_tf: &HashMap<String, AnalysisFrame>,
    ) -> CoreResult<StrategySignal> {
        let (signals, all_failed) = self.collect_all_signals(main, multi_tf);

        if signals.is_empty() {
            if all_failed {
                return Err(CoreError::Strategy {
                    strategy_name: "StrategyManager".to_string(),
                    message: "every registered strategy failed".to_string(),
                });
            }
            return Ok(self.create_hold_signal(main, "no enabled strategies produced a signal"));
        }

        Ok(self.combine_signals(signals, main))
    }

    fn collect_all_signals(
        &mut self,
        main: &AnalysisFrame,
        multi_tf: &HashMap<String, AnalysisFrame>,
    ) -> (Vec<(String, f64, StrategySignal)>, bool) {
        let mut signals = Vec::new();
        let mut attempted = 0usize;
        let mut failed = 0usize;

        for (name, entry) in self.entries.iter_mut() {
            attempted += 1;
            match entry.runtime.generate_signal(entry.strategy.as_ref(), main, multi_tf) {
                Ok(decision) => {
                    let ctx = RiskContext {
                        current_price: main.last_close().unwrap_or(0.0),
                        atr: main.last_value("atr_14"),
                        base_size: self.base_size,
                        sl_multiplier: self.sl_multiplier,
                        tp_ratio: self.tp_ratio,
                    };
                    let signal = signal_builder::annotate(name, decision, &ctx);
                    entry.runtime.record(signal.clone());
                    signals.push((name.clone(), entry.weight, signal));
                }
                Err(err) => {
                    failed += 1;
                    tracing::warn!(strategy = name, %err, "strategy failed to produce a signal");
                }
            }
        }

        (signals, attempted > 0 && failed == attempted)
    }

    fn combine_signals(&self, signals: Vec<(String, f64, StrategySignal)>, main: &AnalysisFrame) -> StrategySignal {
        let mut groups: HashMap<Action, Vec<(String, f64, StrategySignal)>> = HashMap::new();
        for entry in signals {
            groups.entry(entry.2.action).or_default().push(entry);
        }

        if groups.len() <= 1 {
            return self.integrate_consistent_signals(groups.into_values().next().unwrap_or_default(), main);
        }

        self.resolve_conflict(groups, main)
    }

    fn integrate_consistent_signals(
        &self,
        group: Vec<(String, f64, StrategySignal)>,
        main: &AnalysisFrame,
    ) -> StrategySignal {
        if group.is_empty() {
            return self.create_hold_signal(main, "no signals to integrate");
        }

        let action = group[0].2.action;
        if action.is_hold() {
            return self.create_hold_signal(main, "all strategies agree on hold");
        }

        let weighted_confidence = Self::weighted_confidence(&group);
        let strength = group.iter().map(|(_, _, s)| s.strength).sum::<f64>() / group.len() as f64;
        let best = group
            .iter()
            .max_by(|a, b| a.2.confidence.total_cmp(&b.2.confidence))
            .unwrap();

        let contributing: Vec<String> = group.iter().map(|(n, _, _)| n.clone()).collect();
        let individual_confidences: HashMap<String, f64> =
            group.iter().map(|(n, _, s)| (n.clone(), s.confidence)).collect();

        StrategySignal {
            strategy_name: "StrategyManager".to_string(),
            timestamp: crate::application::strategies::now(),
            action,
            confidence: weighted_confidence,
            strength,
            current_price: best.2.current_price,
            entry_price: best.2.entry_price,
            stop_loss: best.2.stop_loss,
            take_profit: best.2.take_profit,
            position_size: best.2.position_size,
            risk_ratio: best.2.risk_ratio,
            indicators: best.2.indicators.clone(),
            reason: Some(format!("{} strategies agree on {action:?}", group.len())),
            metadata: Some(HashMap::from([
                ("contributing_strategies".to_string(), json!(contributing)),
                ("individual_confidences".to_string(), json!(individual_confidences)),
                ("integration_method".to_string(), json!("weighted_sum")),
            ])),
        }
    }

    fn resolve_conflict(
        &self,
        groups: HashMap<Action, Vec<(String, f64, StrategySignal)>>,
        main: &AnalysisFrame,
    ) -> StrategySignal {
        let buy = groups.get(&Action::Buy).map(|g| Self::weighted_confidence(g)).unwrap_or(0.0);
        let sell = groups.get(&Action::Sell).map(|g| Self::weighted_confidence(g)).unwrap_or(0.0);
        let hold = groups.get(&Action::Hold).map(|g| Self::weighted_confidence(g)).unwrap_or(0.0);

        let total = buy + sell + hold;
        if total == 0.0 {
            return self.create_hold_signal(main, "all strategy confidences are zero");
        }

        let buy_ratio = buy / total;
        let sell_ratio = sell / total;
        let hold_ratio = hold / total;
        let max_ratio = buy_ratio.max(sell_ratio).max(hold_ratio);

        // An exact BUY/SELL tie is broken by the highest individual voter
        // confidence among the tied actions, not by which branch is
        // checked first (see DESIGN.md for why this differs from the
        // source's literal if/elif ordering).
        let winning_action = if (buy_ratio - max_ratio).abs() < f64::EPSILON
            && (sell_ratio - max_ratio).abs() < f64::EPSILON
        {
            let best_buy = groups[&Action::Buy]
                .iter()
                .map(|(_, _, s)| s.confidence)
                .fold(f64::MIN, f64::max);
            let best_sell = groups[&Action::Sell]
                .iter()
                .map(|(_, _, s)| s.confidence)
                .fold(f64::MIN, f64::max);
            if best_sell > best_buy {
                Action::Sell
            } else {
                Action::Buy
            }
        } else if (buy_ratio - max_ratio).abs() < f64::EPSILON {
            Action::Buy
        } else if (sell_ratio - max_ratio).abs() < f64::EPSILON {
            Action::Sell
        } else {
            Action::Hold
        };

        if winning_action.is_hold() {
            return self.create_hold_signal(main, "hold wins weighted-confidence vote");
        }

        let winning_group = &groups[&winning_action];
        let weighted_confidence = Self::weighted_confidence(winning_group);
        let best = winning_group
            .iter()
            .max_by(|a, b| a.2.confidence.total_cmp(&b.2.confidence))
            .unwrap();

        StrategySignal {
            strategy_name: "StrategyManager".to_string(),
            timestamp: crate::application::strategies::now(),
            action: winning_action,
            confidence: weighted_confidence,
            strength: best.2.strength,
            current_price: best.2.current_price,
            entry_price: best.2.entry_price,
            stop_loss: best.2.stop_loss,
            take_profit: best.2.take_profit,
            position_size: best.2.position_size,
            risk_ratio: best.2.risk_ratio,
            indicators: best.2.indicators.clone(),
            reason: Some("conflicting votes resolved by weighted confidence".to_string()),
            metadata: Some(HashMap::from([
                ("conflict_resolved".to_string(), json!(true)),
                ("buy_ratio".to_string(), json!(buy_ratio)),
                ("sell_ratio".to_string(), json!(sell_ratio)),
                ("hold_ratio".to_string(), json!(hold_ratio)),
                ("resolution_method".to_string(), json!("all_votes_weighted_integration")),
            ])),
        }
    }

    fn weighted_confidence(group: &[(String, f64, StrategySignal)]) -> f64 {
        let total: f64 = group.iter().map(|(_, w, s)| w * s.confidence).sum();
        total.min(1.0)
    }

    /// HOLD synthesis: base confidence modulated by recent-return
    /// volatility (SPEC_FULL.md §4.7a, grounded in
    /// `_create_hold_signal`'s exact constants).
    fn create_hold_signal(&self, main: &AnalysisFrame, reason: &str) -> StrategySignal {
        let base_hold: f64 = self.store.get("ml.dynamic_confidence.base_hold", 0.3);
        let error_fallback: f64 = self.store.get("ml.dynamic_confidence.error_fallback", 0.2);

        let confidence = match Self::recent_return_volatility(main) {
            Some(vol) if vol > 0.02 => base_hold * 0.8,
            Some(vol) if vol < 0.005 => base_hold * 1.2,
            Some(_) => base_hold,
            None => error_fallback,
        }
        .clamp(0.1, 0.8);

        StrategySignal {
            strategy_name: "StrategyManager".to_string(),
            timestamp: crate::application::strategies::now(),
            action: Action::Hold,
            confidence,
            strength: 0.0,
            current_price: main.last_close().unwrap_or(0.0),
            entry_price: None,
            stop_loss: None,
            take_profit: None,
            position_size: None,
            risk_ratio: None,
            indicators: None,
            reason: Some(reason.to_string()),
            metadata: None,
        }
    }

    /// std of 20-period close percentage changes, or `None` when there
    /// isn't enough data (falls through to `error_fallback` confidence).
    fn recent_return_volatility(main: &AnalysisFrame) -> Option<f64> {
        let close = main.close();
        if close.len() < 20 {
            return None;
        }
        let window = &close[close.len() - 20..];
        let returns: Vec<f64> = window
            .windows(2)
            .filter(|pair| pair[0] != 0.0)
            .map(|pair| (pair[1] - pair[0]) / pair[0])
            .collect();
        if returns.is_empty() {
            return None;
        }
        let mean = returns.iter().sum::<f64>() / returns.len() as f64;
        let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / returns.len() as f64;
        Some(variance.sqrt())
    }

    /// Per-strategy `{action, confidence, signed_encoding}` contract
    /// consumed by the ML feature pipeline (SPEC_FULL.md §4.7).
    pub fn get_individual_strategy_signals(&self) -> HashMap<String, IndividualSignal> {
        self.entries
            .iter()
            .filter_map(|(name, entry)| {
                entry.runtime.last_signal().map(|signal| {
                    (
                        name.clone(),
                        IndividualSignal {
                            action: signal.action,
                            confidence: signal.confidence,
                            encoded: signal.signed_encoding(),
                        },
                    )
                })
            })
            .collect()
    }

    pub fn registered_strategy_names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Candle;
    use chrono::Utc;

    fn store() -> ThresholdStore {
        ThresholdStore::new("/nonexistent/base.yaml", "/nonexistent/overlay.yaml")
    }

    fn frame() -> AnalysisFrame {
        let candle = Candle { timestamp: 0, open: 100.0, high: 100.0, low: 100.0, close: 100.0, volume: 0.0 };
        AnalysisFrame::new(vec![candle; 20]).with_column("atr_14", vec![2.0; 20])
    }

    fn signal(name: &str, action: Action, confidence: f64) -> StrategySignal {
        StrategySignal {
            strategy_name: name.to_string(),
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

    /// S5: weighted conflict resolution, exact BUY/SELL tie broken by
    /// highest individual voter confidence (SELL via B at 0.9).
    #[test]
    fn s5_weighted_conflict_resolution_tie_break() {
        let store = store();
        let manager = StrategyManager::new(&store);

        let groups_input = vec![
            ("A".to_string(), 0.6, signal("A", Action::Buy, 0.6)),
            ("B".to_string(), 0.4, signal("B", Action::Sell, 0.9)),
            ("C".to_string(), 0.5, signal("C", Action::Hold, 0.5)),
        ];

        let main = frame();
        let result = manager.combine_signals(groups_input, &main);

        assert_eq!(result.action, Action::Sell);
        assert!((result.confidence - 0.36).abs() < 1e-9);
    }

    #[test]
    fn hold_synthesis_clamped_and_modulated() {
        let store = store();
        let manager = StrategyManager::new(&store);
        let main = frame();
        let signal = manager.create_hold_signal(&main, "test");
        assert!(signal.confidence >= 0.1 && signal.confidence <= 0.8);
        assert_eq!(signal.action, Action::Hold);
    }

    #[test]
    fn register_rejects_out_of_range_weight() {
        let store = store();
        let mut manager = StrategyManager::new(&store);
        let strategy: Arc<dyn TradingStrategy> =
            Arc::new(crate::application::strategies::atr_exhaustion::AtrExhaustionStrategy::from_store(&store));
        assert!(manager.register(strategy, 1.5).is_err());
    }

    #[test]
    fn update_strategy_weights_ignores_unknown_and_out_of_range() {
        let store = store();
        let mut manager = StrategyManager::new(&store);
        let strategy: Arc<dyn TradingStrategy> =
            Arc::new(crate::application::strategies::atr_exhaustion::AtrExhaustionStrategy::from_store(&store));
        manager.register(strategy, 0.5).unwrap();

        let mut updates = HashMap::new();
        updates.insert("ATRExhaustion".to_string(), 0.9);
        updates.insert("Unknown".to_string(), 0.2);
        updates.insert("ATRExhaustion2".to_string(), 2.0);
        manager.update_strategy_weights(&updates);

        assert_eq!(manager.entries.get("ATRExhaustion").unwrap().weight, 0.9);
    }
}
