pub mod frame;
pub mod regime;
pub mod signal;
pub mod threshold_store;

pub use frame::{AnalysisFrame, Candle};
pub use regime::Regime;
pub use signal::{Action, Decision, StrategySignal, TradeEvaluation};
pub use threshold_store::ThresholdStore;
