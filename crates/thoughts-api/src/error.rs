use async_graphql::ErrorExtensions;
use thiserror::Error;
use tracing::error;

/// Failures a resolver can report. Every variant maps to a stable
/// `extensions.code` in the GraphQL error envelope.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("You need to be logged in!")]
    Unauthenticated,

    /// Same message for unknown email and wrong password.
    #[error("Incorrect credentials")]
    AuthenticationFailed,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Validation(String),

    #[error("That {0} is already taken")]
    UniquenessViolation(&'static str),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated => "UNAUTHENTICATED",
            ApiError::AuthenticationFailed => "AUTHENTICATION_ERROR",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::UniquenessViolation(_) => "UNIQUENESS_VIOLATION",
            ApiError::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }
}

impl ErrorExtensions for ApiError {
    fn extend(&self) -> async_graphql::Error {
        let message = match self {
            ApiError::Internal(e) => {
                error!("Internal error: {:#}", e);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let code = self.code();
        async_graphql::Error::new(message).extend_with(|_, ext| ext.set("code", code))
    }
}
