use crate::image::ImageError;
use crate::provider::ProviderError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

// Everything a handler can fail with. Every variant renders as
// {"error": "..."} with the matching status; provider details are logged
// server-side, never echoed to the caller.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Rate limit exceeded: more than {limit} requests per minute. Please slow down.")]
    RateLimited { limit: u32 },

    #[error("Usage limit reached: {current}/{limit} {category} used. Limits reset {period}.")]
    QuotaExceeded {
        category: &'static str,
        current: u64,
        limit: u64,
        period: &'static str,
    },

    #[error("{0}")]
    InvalidRequest(&'static str),

    #[error("Image processing failed: {0}")]
    Image(#[from] ImageError),

    #[error("generation failed: {0}")]
    Provider(#[from] ProviderError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::RateLimited { .. } | ApiError::QuotaExceeded { .. } => {
                StatusCode::TOO_MANY_REQUESTS
            }
            ApiError::InvalidRequest(_) | ApiError::Image(_) => StatusCode::BAD_REQUEST,
            ApiError::Provider(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Provider(e) => {
                tracing::error!(error = %e, "provider call failed");
                "The model failed to generate a response. Please try again.".to_string()
            }
            _ => self.to_string(),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_match_the_taxonomy() {
        assert_eq!(ApiError::RateLimited { limit: 10 }.status(), StatusCode::TOO_MANY_REQUESTS);
        let quota = ApiError::QuotaExceeded {
            category: "questions",
            current: 50,
            limit: 50,
            period: "daily",
        };
        assert_eq!(quota.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(ApiError::InvalidRequest("no message").status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::Provider(ProviderError::Empty).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn quota_message_names_the_limit() {
        let quota = ApiError::QuotaExceeded {
            category: "questions",
            current: 2,
            limit: 2,
            period: "daily",
        };
        let message = quota.to_string();
        assert!(message.contains("2/2"));
        assert!(message.contains("questions"));
    }
}
