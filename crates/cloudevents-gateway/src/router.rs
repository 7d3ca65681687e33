//! HTTP routes for the gateway.

use crate::domain::event::InboundEvent;
use crate::forwarder::EventForwarder;
use crate::handshake::{validate_event_source, HandshakeState};
use crate::middleware::{AuthConfig, AuthLayer, TracingLayer};
use axum::{
    extract::{DefaultBodyLimit, FromRef, State},
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use bytes::Bytes;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::warn;

pub const EVENTS_PATH: &str = "/events";
pub const HEALTH_PATH: &str = "/healthz";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub forwarder: EventForwarder,
    pub handshake: HandshakeState,
}

impl FromRef<AppState> for EventForwarder {
    fn from_ref(state: &AppState) -> Self {
        state.forwarder.clone()
    }
}

impl FromRef<AppState> for HandshakeState {
    fn from_ref(state: &AppState) -> Self {
        state.handshake.clone()
    }
}

/// Build the gateway router.
///
/// Every method on `/events` reaches [`events_endpoint`]; the auth layer
/// only checks `POST`. Bodies past `max_body_size` are refused with 413.
pub fn build_router(state: AppState, auth: AuthConfig, max_body_size: usize) -> Router {
    let events = Router::new()
        .route(EVENTS_PATH, any(events_endpoint))
        .layer(AuthLayer::new(auth));

    Router::new()
        .merge(events)
        .route(HEALTH_PATH, get(health_check))
        .layer(DefaultBodyLimit::max(max_body_size))
        .layer(RequestBodyLimitLayer::new(max_body_size))
        .layer(TracingLayer::new())
        .with_state(state)
}

/// `POST` submits an event, anything else is a handshake attempt
async fn events_endpoint(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if method == Method::POST {
        submit_event(&state.forwarder, &headers, &body).await
    } else {
        validate_event_source(State(state.handshake), method, headers).await
    }
}

/// Accept one authorized event and forward it upstream
async fn submit_event(forwarder: &EventForwarder, headers: &HeaderMap, body: &Bytes) -> Response {
    let event = match InboundEvent::from_http(headers, body) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "Unable to read CloudEvent from request");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    match forwarder.forward(&event).await {
        Ok(()) => StatusCode::OK.into_response(),
        // Already logged by the forwarder
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "cloudevents-gateway",
        "version": crate::VERSION
    }))
}
