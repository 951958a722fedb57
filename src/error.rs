use thiserror::Error as ThisError;

/// Failure taxonomy shared by the view-model, backends and sync controller.
///
/// Every variant leaves the canonical collection untouched.
#[derive(Debug, ThisError, Clone, PartialEq, Eq)]
pub enum InventoryError {
    #[error("{0}")]
    Validation(String),

    #[error("item not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Backend(String),
}

impl InventoryError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }
}

impl From<std::io::Error> for InventoryError {
    fn from(err: std::io::Error) -> Self {
        Self::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for InventoryError {
    fn from(err: serde_json::Error) -> Self {
        Self::Backend(err.to_string())
    }
}

pub type InventoryResult<T> = Result<T, InventoryError>;
