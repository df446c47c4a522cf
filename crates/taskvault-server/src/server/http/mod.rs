//! The JSON task API.
//!
//! | Method   | Path          | Success                         |
//! |----------|---------------|---------------------------------|
//! | `GET`    | `/tasks`      | `200` "All tasks retrieved"     |
//! | `POST`   | `/tasks`      | `201` "Task created"            |
//! | `GET`    | `/tasks/{id}` | `200` "Task retrieved"          |
//! | `PUT`    | `/tasks/{id}` | `200` "Task updated"            |
//! | `DELETE` | `/tasks/{id}` | `200` "Task deleted"            |
//!
//! Every `/tasks` route runs behind [`auth::authenticate`]. Anything else is
//! answered with `404` "Route not found".

pub mod auth;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod rate_limit;

use crate::server::config::{CorsOrigin, ServerConfig};
use auth::TokenIssuer;
use axum::Router;
use axum::http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, StatusCode};
use axum::middleware;
use axum::routing::get;
use core::time::Duration;
use rate_limit::ClientRateLimiter;
use std::sync::Arc;
use taskvault::TaskService;
use tower::ServiceBuilder;
use tower_http::cors::{self, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

#[derive(Clone)]
pub struct AppState {
    pub tasks: Arc<TaskService>,
    pub tokens: Arc<TokenIssuer>,
}

impl AppState {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            tasks: Arc::new(TaskService::default()),
            tokens: Arc::new(TokenIssuer::new(
                config.secret_key.as_bytes(),
                config.token_ttl,
            )),
        }
    }
}

/// Builds the application with fresh, empty state.
pub fn router(config: &ServerConfig) -> Router {
    router_with_state(config, AppState::new(config))
}

pub fn router_with_state(config: &ServerConfig, state: AppState) -> Router {
    let app = Router::new()
        .route("/tasks", get(handlers::get_all_tasks).post(handlers::create_task))
        .route(
            "/tasks/{id}",
            get(handlers::get_task)
                .put(handlers::update_task)
                .delete(handlers::delete_task),
        )
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state.tokens),
            auth::authenticate,
        ))
        .fallback(handlers::route_not_found)
        .method_not_allowed_fallback(handlers::route_not_found)
        .with_state(state);

    with_middleware(app, config)
}

/// Wraps `app` in the timeout, rate limit, request id, trace and CORS layers.
fn with_middleware(app: Router, config: &ServerConfig) -> Router {
    let app = app.layer(TimeoutLayer::with_status_code(
        StatusCode::REQUEST_TIMEOUT,
        config.request_timeout,
    ));

    let app = match config.rate_limit_per_minute {
        Some(limit) => app.layer(middleware::from_fn_with_state(
            Arc::new(ClientRateLimiter::per_minute(limit)),
            rate_limit::rate_limit,
        )),
        None => app,
    };

    app.layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                    .on_response(DefaultOnResponse::new().level(Level::INFO)),
            )
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(cors_layer(&config.cors_origin)),
    )
}

fn cors_layer(origin: &CorsOrigin) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([ACCEPT, AUTHORIZATION, CONTENT_TYPE])
        // Anonymous clients read their new token from this header.
        .expose_headers([AUTHORIZATION])
        .max_age(Duration::from_secs(12 * 60 * 60));

    match origin {
        CorsOrigin::Any => layer.allow_origin(cors::Any),
        CorsOrigin::Exact(origin) => layer
            .allow_origin(origin.clone())
            .allow_credentials(true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::extract::ConnectInfo;
    use axum::http::{HeaderMap, HeaderValue, Request};
    use core::num::NonZeroU32;
    use serde_json::{Value, json};
    use std::net::SocketAddr;
    use tower::ServiceExt;

    struct Reply {
        status: StatusCode,
        headers: HeaderMap,
        body: Value,
    }

    async fn send(app: &Router, req: Request<Body>) -> Reply {
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let headers = res.headers().clone();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        Reply {
            status,
            headers,
            body,
        }
    }

    fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, token);
        }
        match body {
            Some(body) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    /// Makes an anonymous request and returns the minted `Authorization` value.
    async fn new_identity(app: &Router) -> String {
        let reply = send(app, request(Method::GET, "/tasks", None, None)).await;
        assert_eq!(reply.status, StatusCode::OK);
        reply.headers[AUTHORIZATION].to_str().unwrap().to_string()
    }

    fn new_task() -> Value {
        json!({ "title": "Buy milk and eggs", "description": "From the corner store" })
    }

    #[tokio::test]
    async fn anonymous_request_is_issued_a_token() {
        let app = router(&ServerConfig::for_tests());
        let reply = send(&app, request(Method::GET, "/tasks", None, None)).await;

        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body, json!({ "message": "All tasks retrieved", "data": [] }));
        let token = reply.headers[AUTHORIZATION].to_str().unwrap();
        assert!(token.starts_with("Bearer "));
    }

    #[tokio::test]
    async fn null_and_undefined_headers_are_anonymous() {
        let app = router(&ServerConfig::for_tests());
        for value in ["null", "undefined"] {
            let reply = send(&app, request(Method::GET, "/tasks", Some(value), None)).await;
            assert_eq!(reply.status, StatusCode::OK);
            assert!(reply.headers.contains_key(AUTHORIZATION));
        }
    }

    #[tokio::test]
    async fn presented_token_is_not_reissued() {
        let app = router(&ServerConfig::for_tests());
        let token = new_identity(&app).await;
        let reply = send(&app, request(Method::GET, "/tasks", Some(&token), None)).await;
        assert_eq!(reply.status, StatusCode::OK);
        assert!(!reply.headers.contains_key(AUTHORIZATION));
    }

    #[tokio::test]
    async fn crud_round_trip() {
        let app = router(&ServerConfig::for_tests());
        let token = new_identity(&app).await;
        let token = Some(token.as_str());

        let created = send(&app, request(Method::POST, "/tasks", token, Some(new_task()))).await;
        assert_eq!(created.status, StatusCode::CREATED);
        assert_eq!(created.body["message"], "Task created");
        assert_eq!(created.body["data"]["title"], "Buy milk and eggs");
        let id = created.body["data"]["id"].as_str().unwrap().to_string();
        assert_ne!(id, "1");
        let uri = format!("/tasks/{id}");

        let fetched = send(&app, request(Method::GET, &uri, token, None)).await;
        assert_eq!(fetched.status, StatusCode::OK);
        assert_eq!(fetched.body["message"], "Task retrieved");
        assert_eq!(fetched.body["data"], created.body["data"]);

        let listed = send(&app, request(Method::GET, "/tasks", token, None)).await;
        let data = created.body["data"].clone();
        assert_eq!(listed.body["data"], json!([data]));

        let updated = send(
            &app,
            request(Method::PUT, &uri, token, Some(json!({ "title": "Buy bread" }))),
        )
        .await;
        assert_eq!(updated.status, StatusCode::OK);
        assert_eq!(
            updated.body,
            json!({
                "message": "Task updated",
                "data": { "id": id, "title": "Buy bread", "description": "From the corner store" }
            })
        );

        let deleted = send(&app, request(Method::DELETE, &uri, token, None)).await;
        assert_eq!(deleted.status, StatusCode::OK);
        assert_eq!(deleted.body, json!({ "message": "Task deleted", "data": null }));

        let gone = send(&app, request(Method::GET, &uri, token, None)).await;
        assert_eq!(gone.status, StatusCode::NOT_FOUND);
        assert_eq!(gone.body, json!({ "message": "Task not found", "error": "invalid id" }));
    }

    #[tokio::test]
    async fn tasks_are_private_to_their_owner() {
        let app = router(&ServerConfig::for_tests());
        let alice = new_identity(&app).await;
        let bob = new_identity(&app).await;

        let created = send(
            &app,
            request(Method::POST, "/tasks", Some(&alice), Some(new_task())),
        )
        .await;
        let uri = format!("/tasks/{}", created.body["data"]["id"].as_str().unwrap());

        let reply = send(&app, request(Method::GET, &uri, Some(&bob), None)).await;
        assert_eq!(reply.status, StatusCode::NOT_FOUND);
        let reply = send(&app, request(Method::DELETE, &uri, Some(&bob), None)).await;
        assert_eq!(reply.status, StatusCode::NOT_FOUND);
        let reply = send(&app, request(Method::GET, "/tasks", Some(&bob), None)).await;
        assert_eq!(reply.body["data"], json!([]));

        let reply = send(&app, request(Method::GET, &uri, Some(&alice), None)).await;
        assert_eq!(reply.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn malformed_authorization_is_unauthorized() {
        let app = router(&ServerConfig::for_tests());

        let reply = send(&app, request(Method::GET, "/tasks", Some("Token abc"), None)).await;
        assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
        assert_eq!(
            reply.body,
            json!({ "message": "Unauthorized", "error": "invalid token format" })
        );

        let reply = send(
            &app,
            request(Method::GET, "/tasks", Some("Bearer not.a.jwt"), None),
        )
        .await;
        assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
        assert_eq!(reply.body["message"], "Unauthorized");
    }

    #[tokio::test]
    async fn token_from_another_secret_is_unauthorized() {
        let app = router(&ServerConfig::for_tests());
        let foreign = TokenIssuer::new(b"another-secret", Duration::from_secs(60))
            .issue("intruder")
            .unwrap();
        let reply = send(
            &app,
            request(Method::GET, "/tasks", Some(&format!("Bearer {foreign}")), None),
        )
        .await;
        assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn bad_input_is_rejected() {
        let app = router(&ServerConfig::for_tests());
        let token = new_identity(&app).await;
        let token = Some(token.as_str());

        let reply = send(
            &app,
            Request::builder()
                .method(Method::POST)
                .uri("/tasks")
                .header(AUTHORIZATION, token.unwrap())
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
        assert_eq!(reply.body["message"], "Invalid request body");

        let reply = send(
            &app,
            request(
                Method::POST,
                "/tasks",
                token,
                Some(json!({ "title": "abc", "description": "abcdefgh" })),
            ),
        )
        .await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
        assert_eq!(reply.body["message"], "Validation failed");
        assert_eq!(
            reply.body["error"],
            json!({ "title": "Title must be at least 5 characters" })
        );

        for uri in ["/tasks/abc", "/tasks/-1", "/tasks/+47910"] {
            let reply = send(&app, request(Method::GET, uri, token, None)).await;
            assert_eq!(reply.status, StatusCode::BAD_REQUEST);
            assert_eq!(reply.body["message"], "Invalid task ID");
        }
    }

    #[tokio::test]
    async fn slow_requests_time_out() {
        let config = ServerConfig {
            request_timeout: Duration::from_millis(10),
            ..ServerConfig::for_tests()
        };
        let slow = Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "done"
            }),
        );
        let app = with_middleware(slow, &config);

        let reply = app
            .oneshot(Request::get("/slow").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(reply.status(), StatusCode::REQUEST_TIMEOUT);
        assert!(reply.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn raw_identifier_is_not_found() {
        let app = router(&ServerConfig::for_tests());
        let token = new_identity(&app).await;
        send(&app, request(Method::POST, "/tasks", Some(&token), Some(new_task()))).await;

        let reply = send(&app, request(Method::GET, "/tasks/1", Some(&token), None)).await;
        assert_eq!(reply.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let app = router(&ServerConfig::for_tests());
        let reply = send(&app, request(Method::GET, "/nope", None, None)).await;
        assert_eq!(reply.status, StatusCode::NOT_FOUND);
        assert_eq!(
            reply.body,
            json!({ "message": "Route not found", "error": "invalid route" })
        );
        assert!(!reply.headers.contains_key(AUTHORIZATION));
    }

    #[tokio::test]
    async fn responses_carry_request_id() {
        let app = router(&ServerConfig::for_tests());
        let reply = send(&app, request(Method::GET, "/tasks", None, None)).await;
        assert!(reply.headers.contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn requests_over_limit_are_rejected() {
        let config = ServerConfig {
            rate_limit_per_minute: NonZeroU32::new(2),
            ..ServerConfig::for_tests()
        };
        let app = router(&config);
        let peer = ConnectInfo(SocketAddr::from(([192, 0, 2, 1], 4000)));

        let mut last = None;
        for _ in 0..3 {
            let mut req = request(Method::GET, "/tasks", None, None);
            req.extensions_mut().insert(peer);
            last = Some(send(&app, req).await);
            let reply = last.as_ref().unwrap();
            assert_eq!(reply.headers["x-ratelimit-limit"], "2");
        }

        let reply = last.unwrap();
        assert_eq!(reply.status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(reply.headers["x-ratelimit-remaining"], "0");
        assert_eq!(reply.body["message"], "Limit exceeded");
    }

    #[tokio::test]
    async fn cors_preflight_allows_configured_origin() {
        let origin = HeaderValue::from_static("http://localhost:3000");
        let config = ServerConfig {
            cors_origin: CorsOrigin::Exact(origin.clone()),
            ..ServerConfig::for_tests()
        };
        let app = router(&config);

        let req = Request::builder()
            .method(Method::OPTIONS)
            .uri("/tasks")
            .header("origin", origin.clone())
            .header("access-control-request-method", "POST")
            .body(Body::empty())
            .unwrap();
        let reply = send(&app, req).await;

        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.headers["access-control-allow-origin"], origin);
        assert_eq!(reply.headers["access-control-allow-credentials"], "true");
    }
}
