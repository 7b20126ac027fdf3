use thiserror::Error;

use crate::ids::ItemId;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("item not found: {0}")]
    UnknownItem(ItemId),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid config: {0}")]
    Config(String),

    #[error("invalid data: {0}")]
    InvalidData(String),
}

impl CoreError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }
}
