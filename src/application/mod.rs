pub mod regime_classifier;
pub mod signal_builder;
pub mod strategies;
pub mod strategy_loader;
pub mod strategy_manager;
pub mod strategy_registry;
pub mod strategy_selector;
pub mod trading_cycle_manager;

pub use regime_classifier::{RegimeClassifier, RegimeStats};
pub use strategy_loader::{LoadedStrategy, StrategyLoader};
pub use strategy_manager::{IndividualSignal, StrategyManager};
pub use strategy_registry::{StrategyRegistration, StrategyRegistry};
pub use strategy_selector::DynamicStrategySelector;
pub use trading_cycle_manager::{fuse_ml_and_strategy, CycleOutcome, CycleState, TradingCycleManager};
