//! # Gateway Integration Tests
//!
//! Drive the full router (tracing, body limit, auth, handshake, forwarder)
//! with an in-memory upstream client.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::{header, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use tower::ServiceExt;

use cloudevents_gateway::domain::config::{HandshakeConfig, PayloadMode};
use cloudevents_gateway::domain::event::{GATEWAY_EVENT_SOURCE, GATEWAY_EVENT_TYPE};
use cloudevents_gateway::handshake::{ALLOWED_ORIGIN_HEADER, ALLOWED_RATE_HEADER};
use cloudevents_gateway::ports::outbound::recording::RecordingEventsClient;
use cloudevents_gateway::{
    build_router, AppState, AuthConfig, AuthMode, CredentialRegistry, EventForwarder,
    HandshakeState,
};

const MAX_BODY: usize = 4096;

fn gateway(registry: CredentialRegistry, client: Arc<RecordingEventsClient>) -> Router {
    let state = AppState {
        forwarder: EventForwarder::new(client, PayloadMode::Envelope),
        handshake: HandshakeState::new(&HandshakeConfig::default(), "test-agent").unwrap(),
    };
    build_router(
        state,
        AuthConfig {
            registry: Arc::new(registry),
        },
        MAX_BODY,
    )
}

fn per_originator() -> CredentialRegistry {
    let mut registry = CredentialRegistry::new(AuthMode::PerOriginator);
    registry.add_token("foo", "foo-token");
    registry.add_token("other", "other-token");
    registry
}

fn flat() -> CredentialRegistry {
    let mut registry = CredentialRegistry::new(AuthMode::Flat);
    registry.add_token("", "shared-token");
    registry
}

fn structured_body(source: &str) -> String {
    serde_json::json!({
        "specversion": "1.0",
        "id": "evt-1",
        "source": source,
        "type": "bar",
        "datacontenttype": "application/json",
        "data": {"foo": "bar"}
    })
    .to_string()
}

fn submit(uri: &str, auth: Option<&str>, body: impl Into<Body>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/cloudevents+json");
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    builder.body(body.into()).unwrap()
}

async fn body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

#[tokio::test]
async fn test_structured_event_with_bearer_token_is_forwarded() {
    // Arrange
    let client = Arc::new(RecordingEventsClient::accepting());
    let app = gateway(per_originator(), client.clone());

    // Act
    let response = app
        .oneshot(submit("/events", Some("Bearer foo-token"), structured_body("foo")))
        .await
        .unwrap();

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_bytes(response).await.is_empty());

    let events = client.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].source, GATEWAY_EVENT_SOURCE);
    assert_eq!(events[0].event_type, GATEWAY_EVENT_TYPE);
    assert_eq!(
        events[0].qualifiers,
        BTreeMap::from([
            ("source".to_string(), "foo".to_string()),
            ("type".to_string(), "bar".to_string()),
        ])
    );

    // The auth layer buffered the body; the handler still saw all of it
    let payload: serde_json::Value = serde_json::from_str(&events[0].payload).unwrap();
    assert_eq!(payload["id"], "evt-1");
    assert_eq!(payload["data"]["foo"], "bar");
}

#[tokio::test]
async fn test_token_in_query_parameter_is_accepted() {
    let client = Arc::new(RecordingEventsClient::accepting());
    let app = gateway(per_originator(), client.clone());

    let response = app
        .oneshot(submit("/events?access_token=foo-token", None, structured_body("foo")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(client.events().len(), 1);
}

#[tokio::test]
async fn test_empty_bearer_header_falls_back_to_query_token() {
    let client = Arc::new(RecordingEventsClient::accepting());
    let app = gateway(per_originator(), client.clone());

    let response = app
        .oneshot(submit(
            "/events?access_token=foo-token",
            Some("Bearer "),
            structured_body("foo"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(client.events().len(), 1);
}

#[tokio::test]
async fn test_first_of_repeated_query_tokens_is_used() {
    let client = Arc::new(RecordingEventsClient::accepting());
    let app = gateway(per_originator(), client.clone());

    let accepted = app
        .clone()
        .oneshot(submit(
            "/events?access_token=foo-token&access_token=nope",
            None,
            structured_body("foo"),
        ))
        .await
        .unwrap();
    assert_eq!(accepted.status(), StatusCode::OK);

    let rejected = app
        .oneshot(submit(
            "/events?access_token=nope&access_token=foo-token",
            None,
            structured_body("foo"),
        ))
        .await
        .unwrap();
    assert_eq!(rejected.status(), StatusCode::FORBIDDEN);

    assert_eq!(client.events().len(), 1);
}

#[tokio::test]
async fn test_rejections_are_forbidden_and_never_forwarded() {
    let cases = [
        ("wrong token", "/events", Some("Bearer nope"), "foo"),
        ("no token", "/events", None, "foo"),
        ("unknown source", "/events", Some("Bearer foo-token"), "stranger"),
        ("token of another source", "/events", Some("Bearer other-token"), "foo"),
        ("wrong scheme", "/events", Some("Basic foo-token"), "foo"),
        ("wrong query token", "/events?access_token=nope", None, "foo"),
    ];

    for (name, uri, auth, source) in cases {
        let client = Arc::new(RecordingEventsClient::accepting());
        let app = gateway(per_originator(), client.clone());

        let response = app
            .oneshot(submit(uri, auth, structured_body(source)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{name}");
        assert!(body_bytes(response).await.is_empty(), "{name}");
        assert!(client.events().is_empty(), "{name}");
    }
}

#[tokio::test]
async fn test_malformed_event_is_bad_request() {
    let client = Arc::new(RecordingEventsClient::accepting());
    let app = gateway(per_originator(), client.clone());

    let response = app
        .oneshot(submit("/events", Some("Bearer foo-token"), "{not json"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(client.events().is_empty());
}

#[tokio::test]
async fn test_binary_mode_event_is_forwarded() {
    let client = Arc::new(RecordingEventsClient::accepting());
    let app = gateway(per_originator(), client.clone());

    let request = Request::builder()
        .method(Method::POST)
        .uri("/events")
        .header(header::AUTHORIZATION, "Bearer foo-token")
        .header(header::CONTENT_TYPE, "application/json")
        .header("ce-specversion", "1.0")
        .header("ce-id", "evt-2")
        .header("ce-source", "foo")
        .header("ce-type", "bar")
        .body(Body::from(r#"{"foo":"bar"}"#))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let events = client.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].qualifiers["source"], "foo");
    assert_eq!(events[0].qualifiers["type"], "bar");
}

#[tokio::test]
async fn test_upstream_failure_is_internal_error() {
    let client = Arc::new(RecordingEventsClient::failing("boom"));
    let app = gateway(per_originator(), client.clone());

    let response = app
        .oneshot(submit("/events", Some("Bearer foo-token"), structured_body("foo")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(client.events().len(), 1);
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let client = Arc::new(RecordingEventsClient::accepting());
    let app = gateway(per_originator(), client.clone());

    let response = app
        .oneshot(submit("/events", Some("Bearer foo-token"), vec![b'x'; MAX_BODY + 1]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(client.events().is_empty());
}

#[tokio::test]
async fn test_interrupted_body_is_bad_request() {
    for (registry, auth) in [
        (per_originator(), "Bearer foo-token"),
        (flat(), "Bearer shared-token"),
    ] {
        let client = Arc::new(RecordingEventsClient::accepting());
        let app = gateway(registry, client.clone());

        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"{")),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
        ];
        let body = Body::from_stream(futures::stream::iter(chunks));

        let response = app
            .oneshot(submit("/events", Some(auth), body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(client.events().is_empty());
    }
}

#[tokio::test]
async fn test_flat_mode_checks_token_without_source() {
    let client = Arc::new(RecordingEventsClient::accepting());
    let app = gateway(flat(), client.clone());

    let accepted = app
        .clone()
        .oneshot(submit("/events", Some("Bearer shared-token"), structured_body("anyone")))
        .await
        .unwrap();
    assert_eq!(accepted.status(), StatusCode::OK);

    let rejected = app
        .clone()
        .oneshot(submit("/events", Some("Bearer nope"), structured_body("anyone")))
        .await
        .unwrap();
    assert_eq!(rejected.status(), StatusCode::FORBIDDEN);

    // Authorized but unparseable: rejected by the handler, not the auth layer
    let malformed = app
        .oneshot(submit("/events", Some("Bearer shared-token"), "garbage"))
        .await
        .unwrap();
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);

    assert_eq!(client.events().len(), 1);
}

#[tokio::test]
async fn test_handshake_is_unauthenticated() {
    let client = Arc::new(RecordingEventsClient::accepting());
    let app = gateway(per_originator(), client.clone());

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/events")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[&ALLOWED_ORIGIN_HEADER], "*");
    let rate: u32 = response.headers()[&ALLOWED_RATE_HEADER]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert_eq!(rate, 1000);
    assert_eq!(response.headers()[header::ALLOW], "POST");
    assert!(client.events().is_empty());
}

#[tokio::test]
async fn test_other_methods_on_events_are_not_allowed() {
    for method in [Method::GET, Method::PUT, Method::DELETE, Method::PATCH] {
        let app = gateway(per_originator(), Arc::new(RecordingEventsClient::accepting()));

        let request = Request::builder()
            .method(method.clone())
            .uri("/events")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED, "{method}");
        assert!(response.headers().get(&ALLOWED_ORIGIN_HEADER).is_none());
        assert!(response.headers().get(header::ALLOW).is_none());
    }
}

#[tokio::test]
async fn test_health_check() {
    let app = gateway(per_originator(), Arc::new(RecordingEventsClient::accepting()));

    let request = Request::builder()
        .uri("/healthz")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], cloudevents_gateway::VERSION);
}
