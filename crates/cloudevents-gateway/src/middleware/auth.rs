//! Authentication middleware.
//!
//! Checks the bearer token presented with an event submission against the
//! credential registry. In per-originator mode the body has to be buffered
//! and parsed first, because the expected token depends on the event's
//! `source`; the buffered bytes are handed on so the handler sees the
//! request unchanged. Only `POST` is checked; the handshake on the same
//! path is unauthenticated.

use crate::domain::event::InboundEvent;
use crate::domain::registry::{AuthMode, CredentialRegistry};
use axum::{
    body::Body,
    extract::{FromRequest, Query},
    http::{header::AUTHORIZATION, Method, Request, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use std::sync::Arc;
use tower::{Layer, Service};
use tracing::{debug, warn};

/// Query parameter accepted when no `Authorization` header is sent
pub const ACCESS_TOKEN_PARAM: &str = "access_token";

/// Authentication configuration.
///
/// The body buffered for source lookup obeys the route's
/// `DefaultBodyLimit`.
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// Hashed credentials
    pub registry: Arc<CredentialRegistry>,
}

/// Authentication layer
#[derive(Clone)]
pub struct AuthLayer {
    config: Arc<AuthConfig>,
}

impl AuthLayer {
    pub fn new(config: AuthConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService {
            inner,
            config: Arc::clone(&self.config),
        }
    }
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService<S> {
    inner: S,
    config: Arc<AuthConfig>,
}

impl<S> Service<Request<Body>> for AuthService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let config = Arc::clone(&self.config);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            if req.method() != Method::POST {
                return inner.call(req).await;
            }

            let token = extract_token(&req);

            let req = match config.registry.mode() {
                AuthMode::Flat => {
                    if !config.registry.verify(None, token.as_deref().unwrap_or_default()) {
                        warn!("Event rejected - token not on the allow-list");
                        return Ok(forbidden_response());
                    }
                    req
                }
                AuthMode::PerOriginator => {
                    let (parts, body) = req.into_parts();
                    // 413 past the body limit, 400 for any other read failure
                    let buffered = Request::from_parts(parts.clone(), body);
                    let bytes = match Bytes::from_request(buffered, &()).await {
                        Ok(bytes) => bytes,
                        Err(rejection) => {
                            warn!(error = %rejection, "Unable to buffer request body");
                            return Ok(rejection.into_response());
                        }
                    };

                    let event = match InboundEvent::from_http(&parts.headers, &bytes) {
                        Ok(event) => event,
                        Err(e) => {
                            warn!(error = %e, "Unable to read CloudEvent from request");
                            return Ok(StatusCode::BAD_REQUEST.into_response());
                        }
                    };

                    let authorized = config
                        .registry
                        .verify(Some(&event.source), token.as_deref().unwrap_or_default());
                    if !authorized {
                        warn!(source = %event.source, "Event rejected - invalid token for source");
                        return Ok(forbidden_response());
                    }
                    debug!(source = %event.source, id = %event.id, "Event authorized");

                    Request::from_parts(parts, Body::from(bytes))
                }
            };

            inner.call(req).await
        })
    }
}

/// Bearer token from the `Authorization` header, else the `access_token`
/// query parameter.
///
/// The header is split on its first space and the scheme must be exactly
/// `Bearer`; any other scheme, or an empty token, counts as no header at
/// all. A repeated query parameter yields its first value.
fn extract_token<B>(req: &Request<B>) -> Option<String> {
    if let Some(auth) = req.headers().get(AUTHORIZATION) {
        if let Ok(auth_str) = auth.to_str() {
            if let Some(("Bearer", token)) = auth_str.split_once(' ') {
                if !token.is_empty() {
                    return Some(token.to_string());
                }
            }
        }
    }

    let Query(params) = Query::<Vec<(String, String)>>::try_from_uri(req.uri()).ok()?;
    params
        .into_iter()
        .find(|(name, _)| name == ACCESS_TOKEN_PARAM)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

/// Denials carry no body
fn forbidden_response() -> Response {
    StatusCode::FORBIDDEN.into_response()
}
