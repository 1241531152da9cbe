use crate::domain::material::MaterialId;
use thiserror::Error;

/// Validation failures raised by the decision engine.
///
/// None of these are transient: the engine performs no I/O, so callers should surface them
/// as-is rather than retry.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unknown material: {0}")]
    UnknownMaterial(MaterialId),

    #[error("forecast series for {0} has no price points")]
    EmptySeries(MaterialId),

    #[error("quantity must be positive (got {0})")]
    InvalidQuantity(i64),
}

impl EngineError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
