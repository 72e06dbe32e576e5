pub mod mock;
pub mod ports;

pub use ports::{Balance, DataService, ExecutionRecord, ExecutionService, FeatureService, MlPrediction, MlService, RiskService, Ticker};
