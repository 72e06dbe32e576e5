use crate::domain::{Action, AnalysisFrame, Candle, Decision, StrategySignal, TradeEvaluation};
use crate::errors::{CoreError, CoreResult};
use crate::infrastructure::ports::{
    Balance, DataService, ExecutionService, ExecutionRecord, FeatureService, MlPrediction, MlService,
    RiskService, Ticker,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::info;

/// Fixed, seeded market-data fixture (SPEC_FULL.md §6, grounded in the
/// teacher's `infrastructure/mock.rs::MockMarketDataService` style: no
/// real I/O, deterministic responses for tests).
pub struct MockDataService {
    pub frames: HashMap<String, AnalysisFrame>,
    pub ticker: Ticker,
    pub balances: HashMap<String, Balance>,
}

impl MockDataService {
    pub fn flat(timeframes: &[&str], candle: Candle, bars: usize) -> Self {
        let frame = AnalysisFrame::new(vec![candle; bars]);
        let frames = timeframes.iter().map(|tf| (tf.to_string(), frame.clone())).collect();
        Self {
            frames,
            ticker: Ticker { bid: candle.close * 0.999, ask: candle.close * 1.001 },
            balances: HashMap::from([(
                "JPY".to_string(),
                Balance { total: 2_000_000.0, available: 2_000_000.0 },
            )]),
        }
    }
}

#[async_trait]
impl DataService for MockDataService {
    async fn fetch_multi_timeframe(
        &self,
        _symbol: &str,
        _limit: usize,
    ) -> CoreResult<HashMap<String, AnalysisFrame>> {
        Ok(self.frames.clone())
    }

    async fn fetch_ticker(&self, _symbol: &str) -> CoreResult<Ticker> {
        Ok(self.ticker)
    }

    async fn fetch_balance(&self) -> CoreResult<HashMap<String, Balance>> {
        Ok(self.balances.clone())
    }
}

/// Passthrough feature service: tests attach indicator columns directly
/// to the frames they construct, so this fixture just hands the frame
/// back unchanged.
pub struct MockFeatureService;

#[async_trait]
impl FeatureService for MockFeatureService {
    async fn generate_features(&self, frame: &AnalysisFrame) -> CoreResult<AnalysisFrame> {
        Ok(frame.clone())
    }
}

/// Returns a fixed prediction every call (SPEC_FULL.md §6 "a cached
/// prediction may be substituted" for offline/replay mode).
pub struct MockMlService {
    pub prediction: MlPrediction,
}

impl MockMlService {
    pub fn fixed(prediction: i32, confidence: f64) -> Self {
        Self { prediction: MlPrediction { prediction, confidence } }
    }
}

#[async_trait]
impl MlService for MockMlService {
    async fn predict(&self, _frame: &AnalysisFrame) -> CoreResult<MlPrediction> {
        Ok(self.prediction)
    }

    async fn ensure_correct_model(&self, _n_features: usize) -> CoreResult<()> {
        Ok(())
    }
}

/// Approves any directional signal with a fixed risk score, denies HOLD
/// (SPEC_FULL.md §6).
pub struct MockRiskService {
    pub base_size: f64,
}

#[async_trait]
impl RiskService for MockRiskService {
    async fn evaluate_trade_opportunity(
        &self,
        _ml: Option<&MlPrediction>,
        signal: &StrategySignal,
        _market: &AnalysisFrame,
        _current_balance: f64,
        _bid: f64,
        _ask: f64,
        _api_latency_ms: f64,
        _reference_timestamp: DateTime<Utc>,
    ) -> CoreResult<TradeEvaluation> {
        if signal.action.is_hold() {
            return Ok(TradeEvaluation {
                decision: Decision::Denied,
                side: Action::Hold,
                position_size: 0.0,
                stop_loss: None,
                take_profit: None,
                risk_score: 0.0,
                denial_reasons: vec!["no directional signal".to_string()],
                metadata: HashMap::new(),
            });
        }

        Ok(TradeEvaluation {
            decision: Decision::Approved,
            side: signal.action,
            position_size: signal.position_size.unwrap_or(self.base_size),
            stop_loss: signal.stop_loss,
            take_profit: signal.take_profit,
            risk_score: signal.confidence,
            denial_reasons: Vec::new(),
            metadata: HashMap::new(),
        })
    }
}

/// Records every submitted evaluation in-memory; always healthy and
/// within limits unless configured otherwise.
pub struct MockExecutionService {
    pub executed: RwLock<Vec<TradeEvaluation>>,
    pub position_limit_ok: bool,
    pub healthy: bool,
}

impl MockExecutionService {
    pub fn new() -> Self {
        Self { executed: RwLock::new(Vec::new()), position_limit_ok: true, healthy: true }
    }
}

impl Default for MockExecutionService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExecutionService for MockExecutionService {
    async fn execute(&self, evaluation: &TradeEvaluation) -> CoreResult<ExecutionRecord> {
        if !evaluation.is_approved() {
            return Err(CoreError::PreExecDenial("cannot execute a non-approved evaluation".to_string()));
        }
        info!(side = ?evaluation.side, size = evaluation.position_size, "MockExecution: order placed");
        self.executed.write().unwrap().push(evaluation.clone());
        Ok(ExecutionRecord { success: true, order_id: Some("mock-order".to_string()), message: None })
    }

    async fn check_position_limits(&self, _signal: &StrategySignal) -> CoreResult<bool> {
        Ok(self.position_limit_ok)
    }

    async fn check_stop_conditions(&self) -> CoreResult<()> {
        Ok(())
    }

    async fn is_healthy(&self) -> bool {
        self.healthy
    }
}
