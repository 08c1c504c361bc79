//! Error taxonomy shared by the report renderer, the batch applier and the service.

/// Error returned by every ESG operation.
///
/// Each variant maps to one HTTP status in the service layer, so callers
/// always receive a structured error rather than a partial document.
#[derive(Debug, thiserror::Error)]
pub enum EsgError {
    /// Unknown company, or a company without any snapshot.
    #[error("{0}")]
    NotFound(String),
    /// A request payload failed boundary validation.
    #[error("{0}")]
    Validation(String),
    /// Write-lock contention outlasted the retry ceiling.
    #[error("{0}")]
    StoreBusy(String),
    /// Unsupported report output format.
    #[error("Unsupported report format: {0}")]
    InvalidFormat(String),
    /// Unexpected failure. The message is logged, never sent to callers.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl EsgError {
    /// Wrap any store or IO failure as an internal error.
    pub fn internal<E: std::fmt::Display>(e: E) -> Self {
        Self::Internal(e.to_string())
    }

    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::StoreBusy(_) => "STORE_BUSY",
            Self::InvalidFormat(_) => "INVALID_FORMAT",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Result alias for ESG operations.
pub type EsgResult<T> = Result<T, EsgError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(EsgError::NotFound("x".into()).code(), "NOT_FOUND");
        assert_eq!(EsgError::Validation("x".into()).code(), "VALIDATION_ERROR");
        assert_eq!(EsgError::StoreBusy("x".into()).code(), "STORE_BUSY");
        assert_eq!(EsgError::InvalidFormat("csv".into()).code(), "INVALID_FORMAT");
        assert_eq!(EsgError::internal("boom").code(), "INTERNAL_ERROR");
    }

    #[test]
    fn test_invalid_format_message_names_format() {
        let err = EsgError::InvalidFormat("docx".into());
        assert_eq!(err.to_string(), "Unsupported report format: docx");
    }
}
