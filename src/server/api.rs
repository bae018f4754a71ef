use axum::body::{Body, Bytes};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Request, State};
use axum::http::{header, HeaderName, HeaderValue};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::StreamExt;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use log::{error, info, warn};
use std::num::NonZeroU32;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use uuid::Uuid;

use crate::error::ApiError;
use crate::gate;
use crate::llm::ChunkStream;
use crate::models::chat::ChatRequest;
use crate::relay::CompletionRelay;

/// Global request quota guarding the public endpoint.
const REQUESTS_PER_SECOND: u32 = 10;

#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<CompletionRelay>,
    pub max_turns: usize,
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl AppState {
    pub fn new(relay: Arc<CompletionRelay>, max_turns: usize) -> Self {
        let quota = Quota::per_second(NonZeroU32::new(REQUESTS_PER_SECOND).unwrap());
        Self {
            relay,
            max_turns,
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }
}

pub fn create_router(state: AppState, static_dir: Option<&str>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut app = Router::new()
        .route("/api/chat", post(chat_handler))
        .route("/health", get(|| async { "OK" }))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            throttle_middleware,
        ))
        .layer(cors)
        .with_state(state);

    if let Some(dir) = static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app
}

async fn throttle_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if state.limiter.check().is_err() {
        warn!("Global request rate limit exceeded, rejecting request");
        return Err(ApiError::Busy);
    }
    Ok(next.run(req).await)
}

async fn chat_handler(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload.map_err(|_| {
        ApiError::Validation("The messages field must be an array of role/content pairs".to_string())
    })?;

    gate::check_turn_cap(&request.messages, state.max_turns)?;

    let request_id = Uuid::new_v4();
    info!(
        "Chat request {}: {} turn(s) in payload",
        request_id,
        gate::turn_count(&request.messages)
    );

    let stream = state
        .relay
        .stream_reply(&request.messages)
        .await
        .map_err(ApiError::Upstream)?;

    Ok(stream_response(stream, request_id))
}

/// Wraps the relay's delta stream into an unbuffered plain-text response.
/// Frames pass through in arrival order with no batching; a mid-stream
/// failure can only terminate the body abnormally since the status line and
/// headers are long gone.
fn stream_response(stream: ChunkStream, request_id: Uuid) -> Response {
    let body_stream = stream.filter_map(move |item| async move {
        match item {
            Ok(text) if text.is_empty() => None,
            Ok(text) => Some(Ok(Bytes::from(text))),
            Err(e) => {
                error!("Chat request {}: stream failed mid-flight: {}", request_id, e);
                Some(Err(std::io::Error::other(e)))
            }
        }
    });

    let mut response = Response::new(Body::from_stream(body_stream));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-transform"),
    );
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    // Tells nginx-style intermediaries not to coalesce fragments.
    headers.insert(
        HeaderName::from_static("x-accel-buffering"),
        HeaderValue::from_static("no"),
    );
    response
}
