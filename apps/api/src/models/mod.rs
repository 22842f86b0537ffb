pub mod document;
pub mod job;

use thiserror::Error;

/// Returned when a TEXT column holds a value no enum variant maps to.
#[derive(Debug, Error)]
#[error("unknown {kind} value '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}
