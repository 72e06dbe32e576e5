use thiserror::Error;

/// Error taxonomy for the decision core (see SPEC_FULL.md §7).
///
/// Each variant maps to exactly one policy in the Trading Cycle Manager's
/// step handler; there is no catch-all conversion.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("data error: {0}")]
    Data(String),

    #[error("feature error: {0}")]
    Feature(String),

    #[error("model error: {0}")]
    Model(String),

    #[error("strategy error ({strategy_name}): {message}")]
    Strategy {
        strategy_name: String,
        message: String,
    },

    #[error("connection/timeout error: {0}")]
    Connection(String),

    #[error("invalid value/shape: {0}")]
    ValueShape(String),

    #[error("pre-execution denial: {0}")]
    PreExecDenial(String),

    #[error("system error: {0}")]
    System(String),

    #[error("threshold lookup failed for path '{0}'")]
    Threshold(String),

    #[error("strategy '{0}' already registered under class '{1}'")]
    DuplicateStrategy(String, String),

    #[error("strategy '{0}' not found in registry")]
    UnknownStrategy(String),
}

/// The taxonomy class a `CoreError` belongs to, used by the Trading Cycle
/// Manager's step handler to look up a policy (SPEC_FULL.md §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreErrorClass {
    Data,
    Feature,
    Model,
    Strategy,
    Connection,
    ValueShape,
    PreExecDenial,
    System,
}

impl CoreError {
    pub fn class(&self) -> CoreErrorClass {
        match self {
            CoreError::Data(_) => CoreErrorClass::Data,
            CoreError::Feature(_) => CoreErrorClass::Feature,
            CoreError::Model(_) => CoreErrorClass::Model,
            CoreError::Strategy { .. } => CoreErrorClass::Strategy,
            CoreError::Connection(_) => CoreErrorClass::Connection,
            CoreError::ValueShape(_) => CoreErrorClass::ValueShape,
            CoreError::PreExecDenial(_) => CoreErrorClass::PreExecDenial,
            CoreError::System(_) => CoreErrorClass::System,
            CoreError::Threshold(_) => CoreErrorClass::ValueShape,
            CoreError::DuplicateStrategy(..) => CoreErrorClass::System,
            CoreError::UnknownStrategy(_) => CoreErrorClass::System,
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
