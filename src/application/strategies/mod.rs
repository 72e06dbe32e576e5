pub mod adx_trend_strength;
pub mod atr_exhaustion;
pub mod bb_reversal;
pub mod donchian_channel;
pub mod macd_ema_crossover;
pub mod stochastic_reversal;

use crate::domain::{Action, AnalysisFrame, StrategySignal};
use crate::errors::{CoreError, CoreResult};
use chrono::Utc;
use std::collections::{HashMap, VecDeque};

/// A directional decision before risk annotation — what `analyze()`
/// actually computes; the Signal Builder (SPEC_FULL.md §4.6) turns this
/// into a risk-annotated `StrategySignal`.
#[derive(Debug, Clone)]
pub struct DirectionalDecision {
    pub action: Action,
    pub confidence: f64,
    pub strength: f64,
    pub reason: Option<String>,
    pub indicators: HashMap<String, f64>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl DirectionalDecision {
    pub fn hold(reason: impl Into<String>) -> Self {
        Self {
            action: Action::Hold,
            confidence: 0.0,
            strength: 0.0,
            reason: Some(reason.into()),
            indicators: HashMap::new(),
            metadata: HashMap::new(),
        }
    }
}

/// Contract every concrete strategy implements (SPEC_FULL.md §4.5).
///
/// Object-safe and `Send + Sync` so a set of strategies can be held as
/// `Vec<Arc<dyn TradingStrategy>>`, matching the dynamic-dispatch pattern
/// named in SPEC_FULL.md §9.
pub trait TradingStrategy: Send + Sync {
    fn analyze(
        &self,
        main: &AnalysisFrame,
        multi_tf: &HashMap<String, AnalysisFrame>,
    ) -> DirectionalDecision;

    fn get_required_features(&self) -> &'static [&'static str];

    fn name(&self) -> &str;

    fn strategy_type(&self) -> &str;
}

/// Owns the mutable bookkeeping (`strategy_base.py`'s `is_enabled`,
/// `signal_history`, counters) that the trait object itself does not
/// carry — Rust's `&self`-by-default borrowing means this lives in a
/// sibling struct rather than behind interior mutability on every
/// strategy, per SPEC_FULL.md §4.5's "ambient" note.
pub struct StrategyRuntime {
    pub enabled: bool,
    pub history: VecDeque<StrategySignal>,
    pub max_history: usize,
    pub min_data_points: usize,
    pub total_signals: u64,
}

impl StrategyRuntime {
    pub fn new(max_history: usize, min_data_points: usize) -> Self {
        Self {
            enabled: true,
            history: VecDeque::new(),
            max_history,
            min_data_points,
            total_signals: 0,
        }
    }

    /// The framed entry point (SPEC_FULL.md §4.5): validates the input
    /// frame, invokes `analyze`, bounds/records history, and returns the
    /// directional decision. Validation failure is `CoreError::Strategy`.
    pub fn generate_signal(
        &mut self,
        strategy: &dyn TradingStrategy,
        main: &AnalysisFrame,
        multi_tf: &HashMap<String, AnalysisFrame>,
    ) -> CoreResult<DirectionalDecision> {
        self.validate_input(strategy, main)?;
        let decision = strategy.analyze(main, multi_tf);
        self.total_signals += 1;
        Ok(decision)
    }

    /// Appends a risk-annotated signal to this strategy's bounded ring
    /// history. Called by the caller after `signal_builder::annotate`
    /// since only at that point does a full `StrategySignal` exist.
    pub fn record(&mut self, signal: StrategySignal) {
        self.history.push_back(signal);
        while self.history.len() > self.max_history {
            self.history.pop_front();
        }
    }

    pub fn last_signal(&self) -> Option<&StrategySignal> {
        self.history.back()
    }

    fn validate_input(&self, strategy: &dyn TradingStrategy, main: &AnalysisFrame) -> CoreResult<()> {
        if main.is_empty() {
            return Err(CoreError::Strategy {
                strategy_name: strategy.name().to_string(),
                message: "input frame is empty".to_string(),
            });
        }

        let required = strategy.get_required_features();
        let missing = main.missing_columns(required);
        if !missing.is_empty() {
            return Err(CoreError::Strategy {
                strategy_name: strategy.name().to_string(),
                message: format!("missing required features: {}", missing.join(", ")),
            });
        }

        if main.len() < self.min_data_points {
            return Err(CoreError::Strategy {
                strategy_name: strategy.name().to_string(),
                message: format!(
                    "insufficient data points: {} < {}",
                    main.len(),
                    self.min_data_points
                ),
            });
        }

        Ok(())
    }
}

pub fn now() -> chrono::DateTime<Utc> {
    Utc::now()
}
