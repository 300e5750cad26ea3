use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::providers::ProviderError;
use crate::signature::SignatureRejection;

/// Failures of the persistent link store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<sea_orm::DbErr> for StoreError {
    fn from(err: sea_orm::DbErr) -> Self {
        StoreError::Database(err.to_string())
    }
}

/// Problems loading the site registry
#[derive(Debug, Error)]
pub enum SiteError {
    #[error("Failed to read sites file '{path}': {details}")]
    Read { path: String, details: String },

    #[error("Invalid sites document: {0}")]
    Parse(String),
}

/// Everything that can abort one of the two browser hops.
///
/// The user never sees the cause: every variant renders as a plain redirect
/// to `/`, and the reason only reaches the log.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("Unknown site: {0}")]
    UnknownSite(String),

    #[error("Missing query parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Required scopes were not granted (got: {0})")]
    InsufficientScope(String),

    #[error("Unknown or already consumed state token")]
    UnknownState,

    #[error("{step} failed: {source}")]
    Upstream {
        step: &'static str,
        #[source]
        source: ProviderError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LinkError {
    pub fn upstream(step: &'static str) -> impl FnOnce(ProviderError) -> LinkError {
        move |source| LinkError::Upstream { step, source }
    }
}

pub type LinkResult<T> = Result<T, LinkError>;

impl IntoResponse for LinkError {
    fn into_response(self) -> Response {
        match &self {
            LinkError::UnknownSite(_) | LinkError::MissingParameter(_) | LinkError::UnknownState => {
                tracing::debug!(error = %self, "Redirecting visitor to the start page");
            }
            LinkError::Store(_) => {
                tracing::error!(error = %self, "Link store failure during OAuth hop");
            }
            _ => {
                tracing::warn!(error = %self, "OAuth hop aborted");
            }
        }

        found("/")
    }
}

/// Refusals on the webhook endpoint. Responses are always empty.
#[derive(Debug, Error)]
pub enum InteractionError {
    #[error("Rejected interaction: {0}")]
    Unauthorized(#[from] SignatureRejection),

    #[error("Unparsable interaction body: {0}")]
    InvalidBody(String),
}

impl IntoResponse for InteractionError {
    fn into_response(self) -> Response {
        match &self {
            InteractionError::Unauthorized(_) => {
                tracing::debug!(error = %self, "Refusing webhook");
                StatusCode::UNAUTHORIZED.into_response()
            }
            InteractionError::InvalidBody(_) => {
                tracing::warn!(error = %self, "Refusing webhook");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

/// `302 Found` to `location`.
///
/// axum's `Redirect` helpers only emit 303/307/308.
pub fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_error_redirects_home() {
        let response = LinkError::UnknownState.into_response();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/");
    }

    #[test]
    fn test_interaction_errors_are_empty() {
        let response = InteractionError::from(SignatureRejection::Invalid).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = InteractionError::InvalidBody("eof".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_upstream_error_message_names_step() {
        let err = LinkError::upstream("Wiki token exchange")(ProviderError::Status {
            status: 400,
            message: "invalid_grant".to_string(),
        });
        let text = err.to_string();
        assert!(text.contains("Wiki token exchange"));
        assert!(text.contains("invalid_grant"));
    }
}
