use crate::domain::{AnalysisFrame, StrategySignal, TradeEvaluation};
use crate::errors::CoreResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Best bid/ask quote from the external Data Service (SPEC_FULL.md §6).
#[derive(Debug, Clone, Copy)]
pub struct Ticker {
    pub bid: f64,
    pub ask: f64,
}

/// One currency's balance line from `fetch_balance` (SPEC_FULL.md §6).
#[derive(Debug, Clone, Copy)]
pub struct Balance {
    pub total: f64,
    pub available: f64,
}

/// Output of the external ML Service for the last row of a feature frame
/// (SPEC_FULL.md §6): a three-class prediction plus the argmax
/// probability as confidence.
#[derive(Debug, Clone, Copy)]
pub struct MlPrediction {
    pub prediction: i32,
    pub confidence: f64,
}

impl MlPrediction {
    /// Three-class mapping `{0 -> SELL, 1 -> HOLD, 2 -> BUY}` (SPEC_FULL.md §4.8a).
    pub fn action(&self) -> crate::domain::Action {
        match self.prediction {
            0 => crate::domain::Action::Sell,
            2 => crate::domain::Action::Buy,
            _ => crate::domain::Action::Hold,
        }
    }
}

/// Outcome of a submitted order (SPEC_FULL.md §6 "structured execution record").
#[derive(Debug, Clone)]
pub struct ExecutionRecord {
    pub success: bool,
    pub order_id: Option<String>,
    pub message: Option<String>,
}

/// Fetches market data (SPEC_FULL.md §6, grounded in the teacher's
/// `domain/ports.rs::MarketDataService`).
#[async_trait]
pub trait DataService: Send + Sync {
    async fn fetch_multi_timeframe(
        &self,
        symbol: &str,
        limit: usize,
    ) -> CoreResult<HashMap<String, AnalysisFrame>>;

    async fn fetch_ticker(&self, symbol: &str) -> CoreResult<Ticker>;

    async fn fetch_balance(&self) -> CoreResult<HashMap<String, Balance>>;
}

/// Appends indicator columns to a raw candle frame (SPEC_FULL.md §6).
#[async_trait]
pub trait FeatureService: Send + Sync {
    async fn generate_features(&self, frame: &AnalysisFrame) -> CoreResult<AnalysisFrame>;
}

/// Produces the single ML prediction consumed by Signal Fusion
/// (SPEC_FULL.md §4.8a, §6).
#[async_trait]
pub trait MlService: Send + Sync {
    async fn predict(&self, frame: &AnalysisFrame) -> CoreResult<MlPrediction>;

    /// Recoverable by design (SPEC_FULL.md §7 "Model error"): failure means
    /// fall through to strategy-only, not abort the cycle.
    async fn ensure_correct_model(&self, n_features: usize) -> CoreResult<()>;
}

/// Produces a `TradeEvaluation` from the fused signal and live market
/// context (SPEC_FULL.md §6).
#[async_trait]
pub trait RiskService: Send + Sync {
    #[allow(clippy::too_many_arguments)]
    async fn evaluate_trade_opportunity(
        &self,
        ml: Option<&MlPrediction>,
        signal: &StrategySignal,
        market: &AnalysisFrame,
        current_balance: f64,
        bid: f64,
        ask: f64,
        api_latency_ms: f64,
        reference_timestamp: DateTime<Utc>,
    ) -> CoreResult<TradeEvaluation>;
}

/// Submits orders and checks standing positions (SPEC_FULL.md §6).
#[async_trait]
pub trait ExecutionService: Send + Sync {
    async fn execute(&self, evaluation: &TradeEvaluation) -> CoreResult<ExecutionRecord>;

    /// The "limit-check hook" re-consulted during pre-execution
    /// verification (SPEC_FULL.md §4.8b step 2).
    async fn check_position_limits(&self, signal: &StrategySignal) -> CoreResult<bool>;

    async fn check_stop_conditions(&self) -> CoreResult<()>;

    async fn is_healthy(&self) -> bool;
}
