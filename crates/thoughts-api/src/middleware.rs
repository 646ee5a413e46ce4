use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use thoughts_types::api::Claims;

use crate::auth::{AppState, Credentials};
use crate::error::ApiError;

/// Caller identity for a single request. Built fresh from the bearer token
/// on every request and never stored server-side.
#[derive(Debug, Clone, Default)]
pub struct Session {
    claims: Option<Claims>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(claims: Claims) -> Self {
        Self {
            claims: Some(claims),
        }
    }

    /// A missing, malformed, expired or forged token yields an anonymous
    /// session rather than an error.
    pub fn from_headers(credentials: &Credentials, headers: &HeaderMap) -> Self {
        let Some(token) = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
        else {
            return Self::anonymous();
        };

        match credentials.authenticate(token) {
            Ok(claims) => Self::authenticated(claims),
            Err(e) => {
                debug!("Treating request as anonymous: {}", e);
                Self::anonymous()
            }
        }
    }

    pub fn claims(&self) -> Option<&Claims> {
        self.claims.as_ref()
    }

    /// Identity for operations that cannot run anonymously.
    pub fn require(&self) -> Result<&Claims, ApiError> {
        self.claims.as_ref().ok_or(ApiError::Unauthenticated)
    }
}

/// Decode the Authorization header into a `Session` request extension.
pub async fn resolve_session(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let session = Session::from_headers(&state.credentials, req.headers());
    req.extensions_mut().insert(session);
    next.run(req).await
}
