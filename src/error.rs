use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use log::error;
use serde_json::json;
use std::error::Error as StdError;
use thiserror::Error;

/// Everything the chat endpoint can answer with besides a token stream.
/// Each variant maps onto exactly one client-visible JSON shape; upstream
/// internals stop at `Upstream` and are only ever logged server-side.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed request shape. Never reaches the upstream API.
    #[error("{0}")]
    Validation(String),

    /// The conversation hit the turn cap. A business rule, not a failure;
    /// the `limitReached` flag lets the client branch without string
    /// matching.
    #[error("conversation turn cap of {max_turns} reached")]
    LimitReached { max_turns: usize },

    /// The upstream streaming call could not be established. Surfaced as
    /// an opaque 500.
    #[error("upstream completion request failed")]
    Upstream(#[source] Box<dyn StdError + Send + Sync>),

    /// The global request limiter rejected the request.
    #[error("request rate limit exceeded")]
    Busy,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(reason) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": reason }))).into_response()
            }
            ApiError::LimitReached { max_turns } => {
                let copy = format!(
                    "I hope you enjoyed our conversation, but this is where it ends. \
                     It is limited to {} messages, but if you want to keep talking you \
                     can contact me directly through the contact button or on LinkedIn.",
                    max_turns
                );
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    Json(json!({ "error": copy, "limitReached": true })),
                )
                    .into_response()
            }
            ApiError::Upstream(cause) => {
                error!("Upstream completion request failed: {}", cause);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "error": "Something went wrong while processing your request. Please try again."
                    })),
                )
                    .into_response()
            }
            ApiError::Busy => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "error": "The assistant is handling too many requests right now. Please retry in a moment."
                })),
            )
                .into_response(),
        }
    }
}
