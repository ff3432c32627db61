//! Error types for value decomposition

use thiserror::Error;

/// Errors raised while decomposing a raw value
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValueError {
    #[error("cannot decompose an empty value")]
    Empty,

    #[error("malformed color `{0}`")]
    Color(String),

    #[error("invalid number `{0}`")]
    Number(String),
}
