use crate::application::regime_classifier::RegimeClassifier;
use crate::application::strategy_manager::StrategyManager;
use crate::application::strategy_selector::DynamicStrategySelector;
use crate::domain::{Action, AnalysisFrame, Regime, StrategySignal, ThresholdStore, TradeEvaluation};
use crate::errors::{CoreError, CoreErrorClass, CoreResult};
use crate::infrastructure::ports::{DataService, ExecutionRecord, ExecutionService, FeatureService, MlPrediction, MlService, RiskService};
use chrono::Utc;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

/// Advisory bookkeeping of where a cycle currently is (SPEC_FULL.md
/// §4.8c). Not a separate executor — `run_cycle` advances it inline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Fetching,
    Featurizing,
    Classifying,
    Voting,
    Predicting,
    Fusing,
    EvaluatingRisk,
    PreExecCheck,
    Executing,
    StopCheck,
    Recovering(CoreErrorClass),
}

/// Result of one `run_cycle` call. Most error classes map here rather
/// than propagating, per §7's "skip cycle; continue" policies; only the
/// System/runtime class escalates to `Err` (SPEC_FULL.md §4.8).
#[derive(Debug)]
pub enum CycleOutcome {
    Executed(ExecutionRecord),
    Denied(TradeEvaluation),
    Skipped(CoreError),
    NoTrade(String),
}

/// Orchestrates one trading cycle over the injected subservices
/// (SPEC_FULL.md §4.8, grounded in `trading_cycle_manager.py`). Holds
/// handles, not owners, per §9's "break cyclic ownership" note.
pub struct TradingCycleManager<'a> {
    store: &'a ThresholdStore,
    strategy_manager: StrategyManager<'a>,
    selector: DynamicStrategySelector<'a>,
    classifier: RegimeClassifier<'a>,
    data: Arc<dyn DataService>,
    features: Arc<dyn FeatureService>,
    ml: Arc<dyn MlService>,
    risk: Arc<dyn RiskService>,
    execution: Arc<dyn ExecutionService>,
    state: CycleState,
}

impl<'a> TradingCycleManager<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: &'a ThresholdStore,
        strategy_manager: StrategyManager<'a>,
        data: Arc<dyn DataService>,
        features: Arc<dyn FeatureService>,
        ml: Arc<dyn MlService>,
        risk: Arc<dyn RiskService>,
        execution: Arc<dyn ExecutionService>,
    ) -> Self {
        Self {
            selector: DynamicStrategySelector::new(store),
            classifier: RegimeClassifier::new(store),
            store,
            strategy_manager,
            data,
            features,
            ml,
            risk,
            execution,
            state: CycleState::Idle,
        }
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    pub async fn run_cycle(&mut self, symbol: &str) -> CoreResult<CycleOutcome> {
        let limit: usize = self.store.get("data.fetch_limit", 200usize);
        let main_timeframe: String = self.store.get("trading.main_timeframe", "15m".to_string());

        // 1. Fetch
        self.state = CycleState::Fetching;
        let raw_frames = match self.data.fetch_multi_timeframe(symbol, limit).await {
            Ok(frames) => frames,
            Err(err) => return self.handle_step_error(err),
        };

        // 2. Featurize — a feature-service failure on one timeframe falls
        // back to its raw frame rather than aborting the cycle (§7's
        // "Feature error ... never abort the cycle").
        self.state = CycleState::Featurizing;
        let mut enriched: HashMap<String, AnalysisFrame> = HashMap::new();
        for (timeframe, frame) in &raw_frames {
            match self.features.generate_features(frame).await {
                Ok(featurized) => {
                    enriched.insert(timeframe.clone(), featurized);
                }
                Err(err) => {
                    tracing::warn!(timeframe, %err, "feature generation failed, using raw frame");
                    enriched.insert(timeframe.clone(), frame.clone());
                }
            }
        }

        let main_frame = match enriched.get(&main_timeframe) {
            Some(frame) => frame.clone(),
            None => {
                return self.handle_step_error(CoreError::Data(format!(
                    "main timeframe '{main_timeframe}' missing from fetched data"
                )));
            }
        };

        // 3. Classify
        self.state = CycleState::Classifying;
        let regime = self.classifier.classify(&main_frame);

        // 4. Apply regime weights
        let weights = self.selector.get_regime_weights(regime);
        self.strategy_manager.update_strategy_weights(&weights);

        // 5. Evaluate strategies
        self.state = CycleState::Voting;
        let integrated = match self.strategy_manager.analyze_market(&main_frame, &enriched) {
            Ok(signal) => signal,
            Err(err) => {
                tracing::error!(%err, "all strategies failed this cycle");
                return self.handle_step_error(err);
            }
        };

        // 6. Collect individual signals and attach as ML feature columns.
        let individual = self.strategy_manager.get_individual_strategy_signals();
        let frame_len = main_frame.len();
        let mut augmented = main_frame.clone();
        for (name, signal) in &individual {
            let column = format!("strategy_signal_{name}");
            augmented = augmented.with_column(column, vec![signal.encoded; frame_len]);
        }

        // 7. ML prediction — a model failure is recoverable: fall through
        // to strategy-only fusion (§7's "Model error" policy).
        self.state = CycleState::Predicting;
        let ml_prediction = match self.ml.predict(&augmented).await {
            Ok(prediction) => Some(prediction),
            Err(err) => {
                tracing::warn!(%err, "ML prediction unavailable, continuing strategy-only");
                None
            }
        };

        // 8. Trading info — failure falls back to store defaults rather
        // than aborting.
        let balance = match self.data.fetch_balance().await {
            Ok(balances) => balances
                .get("JPY")
                .map(|b| b.available)
                .unwrap_or_else(|| self.store.get("trading.fallback_balance", 0.0)),
            Err(err) => {
                tracing::warn!(%err, "balance fetch failed, using fallback");
                self.store.get("trading.fallback_balance", 0.0)
            }
        };
        let ticker = match self.data.fetch_ticker(symbol).await {
            Ok(ticker) => ticker,
            Err(err) => {
                tracing::warn!(%err, "ticker fetch failed, using last close");
                let price = main_frame.last_close().unwrap_or(0.0);
                crate::infrastructure::ports::Ticker { bid: price, ask: price }
            }
        };

        // 9. Signal fusion
        self.state = CycleState::Fusing;
        let fused = fuse_ml_and_strategy(ml_prediction, integrated, regime, self.store);

        // 10. Risk evaluation
        self.state = CycleState::EvaluatingRisk;
        let api_latency_ms: f64 = self.store.get("trading.assumed_latency_ms", 50.0);
        let evaluation = match self
            .risk
            .evaluate_trade_opportunity(
                ml_prediction.as_ref(),
                &fused,
                &main_frame,
                balance,
                ticker.bid,
                ticker.ask,
                api_latency_ms,
                Utc::now(),
            )
            .await
        {
            Ok(evaluation) => evaluation,
            Err(err) => return self.handle_step_error(err),
        };

        if !evaluation.is_approved() {
            self.state = CycleState::Idle;
            return Ok(CycleOutcome::Denied(evaluation));
        }

        // 11. Pre-execution verification
        self.state = CycleState::PreExecCheck;
        let estimated_notional = evaluation.position_size * main_frame.last_close().unwrap_or(0.0);
        let volatility: f64 = main_frame.last_value("atr_14").unwrap_or(0.0) / main_frame.last_close().unwrap_or(1.0).max(1e-9);
        let emergency = self.store.get("trading.anomaly.emergency_override", false);

        if let Some(reason) = self
            .pre_execution_verification(&evaluation, &fused, balance, estimated_notional, volatility, emergency)
            .await
        {
            let mut denied = evaluation;
            denied.denial_reasons.push(reason);
            denied.decision = crate::domain::Decision::Denied;
            self.state = CycleState::Idle;
            return Ok(CycleOutcome::Denied(denied));
        }

        // 12. Execute
        self.state = CycleState::Executing;
        let record = match self.execution.execute(&evaluation).await {
            Ok(record) => record,
            Err(err) => return self.handle_step_error(err),
        };

        // 13. Stop-condition check for already-open positions.
        self.state = CycleState::StopCheck;
        if let Err(err) = self.execution.check_stop_conditions().await {
            tracing::warn!(%err, "stop-condition check failed this cycle");
        }

        self.state = CycleState::Idle;
        Ok(CycleOutcome::Executed(record))
    }

    /// Six ordered checks, short-circuit evaluated (SPEC_FULL.md §4.8b).
    /// Returns `Some(reason)` on the first failing check.
    async fn pre_execution_verification(
        &self,
        evaluation: &TradeEvaluation,
        signal: &StrategySignal,
        balance: f64,
        estimated_notional: f64,
        volatility: f64,
        emergency: bool,
    ) -> Option<String> {
        if signal.action.is_hold() || evaluation.position_size <= 0.0 {
            return Some("no directional position to execute".to_string());
        }

        match self.execution.check_position_limits(signal).await {
            Ok(true) => {}
            Ok(false) => return Some("position/exposure limits exceeded".to_string()),
            Err(err) => tracing::warn!(%err, "position limit re-check failed, continuing"),
        }

        let balance_multiplier: f64 = self.store.get("trading.balance_safety_multiplier", 1.5);
        let required = balance_multiplier * estimated_notional;
        if balance < required {
            return Some(format!(
                "残高不足 (insufficient balance): balance {balance:.0} < required {required:.0}"
            ));
        }

        let max_volatility: f64 = self.store.get("trading.anomaly.max_volatility_for_trade", 0.05);
        if volatility > max_volatility {
            return Some(format!("volatility spike {volatility:.4} exceeds {max_volatility:.4}"));
        }

        if emergency {
            return Some("emergency condition reported".to_string());
        }

        if !self.execution.is_healthy().await {
            return Some("execution subsystem unhealthy".to_string());
        }

        None
    }

    fn handle_step_error(&mut self, err: CoreError) -> CoreResult<CycleOutcome> {
        let class = err.class();
        self.state = CycleState::Recovering(class);
        self.state = CycleState::Idle;
        if class == CoreErrorClass::System {
            Err(err)
        } else {
            Ok(CycleOutcome::Skipped(err))
        }
    }
}

/// `base_confidence = strategy_confidence * strategy_weight + ml_confidence
/// * ml_weight`, adjusted by agreement/disagreement and clamped
/// (SPEC_FULL.md §4.8a, grounded in
/// `trading_cycle_manager.py::_integrate_ml_with_strategy`). Regime-keyed
/// overrides fall back to the global `ml.strategy_integration.*` keys.
pub fn fuse_ml_and_strategy(
    ml: Option<MlPrediction>,
    signal: StrategySignal,
    regime: Regime,
    store: &ThresholdStore,
) -> StrategySignal {
    let enabled: bool = store.get("ml.strategy_integration.enabled", false);
    let Some(ml) = ml.filter(|_| enabled) else {
        return signal;
    };

    let min_ml_confidence = resolve(store, regime, "min_ml_confidence", 0.6);
    if ml.confidence < min_ml_confidence {
        return signal;
    }

    let strategy_weight = resolve(store, regime, "strategy_weight", 0.7);
    let ml_weight = resolve(store, regime, "ml_weight", 0.35);
    let high_confidence_threshold = resolve(store, regime, "high_confidence_threshold", 0.8);
    let agreement_bonus = resolve(store, regime, "agreement_bonus", 1.2);
    let disagreement_penalty = resolve(store, regime, "disagreement_penalty", 0.7);
    let hold_conversion_threshold = resolve(store, regime, "hold_conversion_threshold", 0.4);

    let base_confidence = signal.confidence * strategy_weight + ml.confidence * ml_weight;
    let ml_action = ml.action();
    let is_agreement = ml_action == signal.action;

    let mut metadata = signal.metadata.clone().unwrap_or_default();
    metadata.insert("ml_adjusted".to_string(), json!(true));
    metadata.insert("is_agreement".to_string(), json!(is_agreement));
    metadata.insert("ml_action".to_string(), json!(format!("{ml_action:?}")));
    metadata.insert("regime".to_string(), json!(regime.key()));

    if ml.confidence >= high_confidence_threshold {
        if is_agreement {
            let adjusted = (base_confidence * agreement_bonus).min(1.0);
            return StrategySignal { confidence: adjusted, strength: adjusted, metadata: Some(metadata), ..signal };
        }

        let adjusted = base_confidence * disagreement_penalty;
        if adjusted < hold_conversion_threshold {
            metadata.insert("adjustment_reason".to_string(), json!("ml_disagreement_low_confidence"));
            metadata.insert("original_action".to_string(), json!(format!("{:?}", signal.action)));
            return StrategySignal {
                action: Action::Hold,
                confidence: adjusted,
                strength: adjusted,
                entry_price: None,
                stop_loss: None,
                take_profit: None,
                position_size: None,
                risk_ratio: None,
                metadata: Some(metadata),
                ..signal
            };
        }

        return StrategySignal { confidence: adjusted, strength: adjusted, metadata: Some(metadata), ..signal };
    }

    StrategySignal { confidence: base_confidence, strength: base_confidence, metadata: Some(metadata), ..signal }
}

fn resolve(store: &ThresholdStore, regime: Regime, key: &str, default: f64) -> f64 {
    let global_default = store.get(&format!("ml.strategy_integration.{key}"), default);
    store.get(&format!("ml.regime_ml_integration.{}.{}", regime.key(), key), global_default)
}
