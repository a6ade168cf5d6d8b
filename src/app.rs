use std::net::SocketAddr;

use axum::{
    http::{HeaderValue, Method},
    middleware,
    routing::get,
    Router,
};
use tower_cookies::CookieManagerLayer;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowHeaders, AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use crate::config::AppConfig;
use crate::error::{not_found, panic_response};
use crate::state::AppState;
use crate::{auth, cards, users};

pub fn build_app(state: AppState) -> Router {
    let protected = Router::new()
        .merge(users::router())
        .merge(cards::router())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    Router::new()
        .merge(auth::router())
        .route("/health", get(|| async { "ok" }).fallback(not_found))
        .merge(protected)
        .fallback(not_found)
        .with_state(state.clone())
        .layer(CookieManagerLayer::new())
        .layer(cors_layer(&state.config.cors_origins))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "ignoring unparsable CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::HEAD,
            Method::PUT,
            Method::PATCH,
            Method::POST,
            Method::DELETE,
        ])
        .allow_headers(AllowHeaders::mirror_request())
}

pub async fn serve(app: Router, config: &AppConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        async_trait,
        body::{to_bytes, Body},
        http::{header, HeaderMap, Request, StatusCode},
    };
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::{json, Value};
    use time::{Duration, OffsetDateTime};
    use tower::ServiceExt;

    use super::*;
    use crate::auth::extractors::{AUTH_REQUIRED, INVALID_TOKEN};
    use crate::auth::handlers::BAD_CREDENTIALS;
    use crate::auth::jwt::Claims;
    use crate::cards::repo::CardRepo;
    use crate::cards::repo_types::{Card, NewCard};
    use crate::db::{ObjectId, StoreError};
    use crate::error::INTERNAL_MESSAGE;
    use crate::state::{test_config, TEST_JWT_SECRET};
    use crate::users::repo::UserRepo;
    use crate::users::repo_types::{NewUser, User, UserPatch};

    struct Reply {
        status: StatusCode,
        headers: HeaderMap,
        body: Value,
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Reply {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header(header::COOKIE, format!("jwt={token}"));
        }
        let req = match body {
            Some(body) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let headers = res.headers().clone();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
        };
        Reply {
            status,
            headers,
            body,
        }
    }

    fn set_cookie(reply: &Reply) -> String {
        reply
            .headers
            .get(header::SET_COOKIE)
            .expect("set-cookie header")
            .to_str()
            .unwrap()
            .to_string()
    }

    async fn sign_up(app: &Router, email: &str) -> Value {
        let reply = send(
            app,
            Method::POST,
            "/signup",
            None,
            Some(json!({ "email": email, "password": "password1", "name": "Al" })),
        )
        .await;
        assert_eq!(reply.status, StatusCode::CREATED, "{:?}", reply.body);
        reply.body
    }

    async fn sign_in(app: &Router, email: &str) -> String {
        let reply = send(
            app,
            Method::POST,
            "/signin",
            None,
            Some(json!({ "email": email, "password": "password1" })),
        )
        .await;
        assert_eq!(reply.status, StatusCode::OK, "{:?}", reply.body);
        let cookie = set_cookie(&reply);
        cookie
            .split(';')
            .next()
            .and_then(|kv| kv.strip_prefix("jwt="))
            .expect("jwt cookie")
            .to_string()
    }

    /// Registers and logs in, returning (user id, token).
    async fn member(app: &Router, email: &str) -> (String, String) {
        let user = sign_up(app, email).await;
        let token = sign_in(app, email).await;
        (user["_id"].as_str().unwrap().to_string(), token)
    }

    async fn create_card(app: &Router, token: &str) -> Value {
        let reply = send(
            app,
            Method::POST,
            "/cards",
            Some(token),
            Some(json!({ "name": "Baikal", "link": "https://example.com/baikal.jpg" })),
        )
        .await;
        assert_eq!(reply.status, StatusCode::CREATED, "{:?}", reply.body);
        reply.body
    }

    fn app() -> Router {
        build_app(AppState::fake())
    }

    /// Store that fails every call, to prove a request never reached it.
    struct BrokenStore;

    fn broken<T>() -> Result<T, StoreError> {
        Err(StoreError::Backend(anyhow::anyhow!("connection reset by 10.1.2.3")))
    }

    #[async_trait]
    impl UserRepo for BrokenStore {
        async fn find_all(&self) -> Result<Vec<User>, StoreError> {
            broken()
        }
        async fn find_by_id(&self, _: &ObjectId) -> Result<Option<User>, StoreError> {
            broken()
        }
        async fn find_by_email(&self, _: &str) -> Result<Option<User>, StoreError> {
            broken()
        }
        async fn create(&self, _: NewUser) -> Result<User, StoreError> {
            broken()
        }
        async fn update(&self, _: &ObjectId, _: UserPatch) -> Result<Option<User>, StoreError> {
            broken()
        }
    }

    #[async_trait]
    impl CardRepo for BrokenStore {
        async fn find_all(&self) -> Result<Vec<Card>, StoreError> {
            broken()
        }
        async fn find_by_id(&self, _: &ObjectId) -> Result<Option<Card>, StoreError> {
            broken()
        }
        async fn create(&self, _: NewCard) -> Result<Card, StoreError> {
            broken()
        }
        async fn delete(&self, _: &ObjectId) -> Result<Option<Card>, StoreError> {
            broken()
        }
        async fn add_like(&self, _: &ObjectId, _: &ObjectId) -> Result<Option<Card>, StoreError> {
            broken()
        }
        async fn remove_like(
            &self,
            _: &ObjectId,
            _: &ObjectId,
        ) -> Result<Option<Card>, StoreError> {
            broken()
        }
    }

    fn broken_app() -> (Router, String) {
        let store = Arc::new(BrokenStore);
        let state = AppState::from_parts(Arc::new(test_config()), store.clone(), store);
        let token = state.keys.sign(&ObjectId::new()).unwrap();
        (build_app(state), token)
    }

    fn protected_requests() -> Vec<(Method, String, Option<Value>)> {
        let id = ObjectId::new().to_string();
        vec![
            (Method::GET, "/users".into(), None),
            (Method::GET, "/users/me".into(), None),
            (Method::GET, format!("/users/{id}"), None),
            (
                Method::PATCH,
                "/users/me".into(),
                Some(json!({ "name": "Jacques", "about": "Diver" })),
            ),
            (
                Method::PATCH,
                "/users/me/avatar".into(),
                Some(json!({ "avatar": "https://example.com/a.png" })),
            ),
            (Method::GET, "/cards".into(), None),
            (
                Method::POST,
                "/cards".into(),
                Some(json!({ "name": "Baikal", "link": "https://example.com/b.jpg" })),
            ),
            (Method::DELETE, format!("/cards/{id}"), None),
            (Method::PUT, format!("/cards/{id}/likes"), None),
            (Method::DELETE, format!("/cards/{id}/likes"), None),
        ]
    }

    #[tokio::test]
    async fn health_is_public() {
        let reply = send(&app(), Method::GET, "/health", None, None).await;
        assert_eq!(reply.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn sign_up_returns_created_user_without_password() {
        let app = app();
        let user = sign_up(&app, "a@b.com").await;
        assert_eq!(user["email"], "a@b.com");
        assert_eq!(user["name"], "Al");
        assert!(user["_id"].as_str().is_some_and(|id| id.len() == 24));
        assert!(user.get("password").is_none());
        assert!(user.get("password_hash").is_none());
        assert!(user["about"].is_string());
        assert!(user["avatar"].is_string());
    }

    #[tokio::test]
    async fn repeated_sign_up_conflicts() {
        let app = app();
        sign_up(&app, "a@b.com").await;
        let reply = send(
            &app,
            Method::POST,
            "/signup",
            None,
            Some(json!({ "email": "A@b.com", "password": "password1", "name": "Al" })),
        )
        .await;
        assert_eq!(reply.status, StatusCode::CONFLICT);
        assert!(reply.body["message"].is_string());
    }

    #[tokio::test]
    async fn sign_up_body_is_validated() {
        let app = app();
        let cases = [
            json!({ "email": "a@b.com", "password": "short" }),
            json!({ "email": "not-an-email", "password": "password1" }),
            json!({ "email": "a@b.com", "password": "password1", "name": "A" }),
            json!({ "email": "a@b.com", "password": "password1", "avatar": "pic.png" }),
            json!({ "email": "a@b.com", "password": "password1", "role": "admin" }),
            json!({ "password": "password1" }),
        ];
        for body in cases {
            let reply = send(&app, Method::POST, "/signup", None, Some(body.clone())).await;
            assert_eq!(reply.status, StatusCode::BAD_REQUEST, "{body}");
            assert!(reply.body["message"].is_string());
        }
    }

    #[tokio::test]
    async fn malformed_json_is_a_bad_request() {
        let app = app();
        let req = Request::builder()
            .method(Method::POST)
            .uri("/signin")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn sign_in_sets_session_cookie() {
        let app = app();
        sign_up(&app, "a@b.com").await;
        let reply = send(
            &app,
            Method::POST,
            "/signin",
            None,
            Some(json!({ "email": "a@b.com", "password": "password1" })),
        )
        .await;
        assert_eq!(reply.status, StatusCode::OK);
        assert!(reply.body["message"].is_string());
        assert!(reply.body.get("token").is_none());

        let cookie = set_cookie(&reply);
        assert!(cookie.starts_with("jwt="));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(cookie.contains("Max-Age=604800"));
    }

    #[tokio::test]
    async fn bad_credentials_are_indistinguishable() {
        let app = app();
        sign_up(&app, "a@b.com").await;

        let wrong_password = send(
            &app,
            Method::POST,
            "/signin",
            None,
            Some(json!({ "email": "a@b.com", "password": "password2" })),
        )
        .await;
        let unknown_email = send(
            &app,
            Method::POST,
            "/signin",
            None,
            Some(json!({ "email": "nobody@b.com", "password": "password1" })),
        )
        .await;

        assert_eq!(wrong_password.status, StatusCode::UNAUTHORIZED);
        assert_eq!(unknown_email.status, StatusCode::UNAUTHORIZED);
        assert_eq!(wrong_password.body, unknown_email.body);
        assert_eq!(wrong_password.body["message"], BAD_CREDENTIALS);
        assert!(wrong_password.headers.get(header::SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn protected_routes_require_a_cookie() {
        let app = app();
        for (method, uri, body) in protected_requests() {
            let reply = send(&app, method.clone(), &uri, None, body).await;
            assert_eq!(reply.status, StatusCode::UNAUTHORIZED, "{method} {uri}");
            assert_eq!(reply.body["message"], AUTH_REQUIRED);
        }
    }

    #[tokio::test]
    async fn protected_routes_reject_tampered_tokens() {
        let app = app();
        let (_, token) = member(&app, "a@b.com").await;
        let mut parts: Vec<String> = token.split('.').map(String::from).collect();
        let flipped = if parts[2].starts_with('A') { "B" } else { "A" };
        parts[2].replace_range(0..1, flipped);
        let tampered = parts.join(".");

        for (method, uri, body) in protected_requests() {
            let reply = send(&app, method.clone(), &uri, Some(&tampered), body).await;
            assert_eq!(reply.status, StatusCode::UNAUTHORIZED, "{method} {uri}");
            assert_eq!(reply.body["message"], INVALID_TOKEN);
        }

        // The rejected POST /cards and PATCH /users/me left no trace.
        let cards = send(&app, Method::GET, "/cards", Some(&token), None).await;
        assert_eq!(cards.body, json!([]));
        let me = send(&app, Method::GET, "/users/me", Some(&token), None).await;
        assert_eq!(me.body["name"], "Al");
    }

    #[tokio::test]
    async fn expired_tokens_are_rejected() {
        let app = app();
        let (id, _) = member(&app, "a@b.com").await;
        let now = OffsetDateTime::now_utc();
        let claims = Claims {
            sub: ObjectId::parse(&id).unwrap(),
            iat: (now - Duration::days(8)).unix_timestamp() as usize,
            exp: (now - Duration::days(1)).unix_timestamp() as usize,
        };
        let expired = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
        )
        .unwrap();

        let reply = send(&app, Method::GET, "/users/me", Some(&expired), None).await;
        assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
        assert_eq!(reply.body["message"], INVALID_TOKEN);
    }

    #[tokio::test]
    async fn malformed_ids_fail_before_the_store() {
        let (app, token) = broken_app();
        let short = "65a1f0c2e4b0a1b2c3d4e5f";
        for (method, uri) in [
            (Method::GET, format!("/users/{short}")),
            (Method::DELETE, format!("/cards/{short}")),
            (Method::PUT, format!("/cards/{short}/likes")),
            (Method::DELETE, "/cards/not-hex!/likes".to_string()),
        ] {
            let reply = send(&app, method.clone(), &uri, Some(&token), None).await;
            assert_eq!(reply.status, StatusCode::BAD_REQUEST, "{method} {uri}");
        }
    }

    #[tokio::test]
    async fn invalid_bodies_fail_before_the_store() {
        let (app, token) = broken_app();
        let reply = send(
            &app,
            Method::POST,
            "/cards",
            Some(&token),
            Some(json!({ "name": "Baikal", "link": "not a link" })),
        )
        .await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn store_failures_become_generic_500() {
        let (app, token) = broken_app();
        let reply = send(&app, Method::GET, "/users", Some(&token), None).await;
        assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(reply.body, json!({ "message": INTERNAL_MESSAGE }));
        assert!(!reply.body.to_string().contains("10.1.2.3"));
    }

    #[tokio::test]
    async fn current_user_and_lookup_by_id() {
        let app = app();
        let (id, token) = member(&app, "a@b.com").await;

        let me = send(&app, Method::GET, "/users/me", Some(&token), None).await;
        assert_eq!(me.status, StatusCode::OK);
        assert_eq!(me.body["_id"], id.as_str());

        let by_id = send(&app, Method::GET, &format!("/users/{id}"), Some(&token), None).await;
        assert_eq!(by_id.body, me.body);

        let all = send(&app, Method::GET, "/users", Some(&token), None).await;
        assert_eq!(all.body.as_array().map(Vec::len), Some(1));

        let missing = ObjectId::new();
        let reply = send(&app, Method::GET, &format!("/users/{missing}"), Some(&token), None).await;
        assert_eq!(reply.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn profile_and_avatar_updates() {
        let app = app();
        let (_, token) = member(&app, "a@b.com").await;

        let reply = send(
            &app,
            Method::PATCH,
            "/users/me",
            Some(&token),
            Some(json!({ "name": "Jacques", "about": "Diver" })),
        )
        .await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body["name"], "Jacques");
        assert_eq!(reply.body["about"], "Diver");

        let reply = send(
            &app,
            Method::PATCH,
            "/users/me/avatar",
            Some(&token),
            Some(json!({ "avatar": "https://www.example.com/me.png" })),
        )
        .await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body["avatar"], "https://www.example.com/me.png");
        assert_eq!(reply.body["name"], "Jacques");

        let reply = send(
            &app,
            Method::PATCH,
            "/users/me/avatar",
            Some(&token),
            Some(json!({ "avatar": "me.png" })),
        )
        .await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn update_of_vanished_user_is_not_found() {
        let app = app();
        let ghost = AppState::fake().keys.sign(&ObjectId::new()).unwrap();
        let reply = send(
            &app,
            Method::PATCH,
            "/users/me",
            Some(&ghost),
            Some(json!({ "name": "Jacques", "about": "Diver" })),
        )
        .await;
        assert_eq!(reply.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn created_card_is_owned_and_unliked() {
        let app = app();
        let (id, token) = member(&app, "a@b.com").await;
        let card = create_card(&app, &token).await;
        assert_eq!(card["owner"], id.as_str());
        assert_eq!(card["likes"], json!([]));
        assert_eq!(card["name"], "Baikal");

        let cards = send(&app, Method::GET, "/cards", Some(&token), None).await;
        assert_eq!(cards.body, json!([card]));
    }

    #[tokio::test]
    async fn only_the_owner_deletes_a_card() {
        let app = app();
        let (_, owner) = member(&app, "owner@b.com").await;
        let (_, other) = member(&app, "other@b.com").await;
        let card = create_card(&app, &owner).await;
        let uri = format!("/cards/{}", card["_id"].as_str().unwrap());

        let reply = send(&app, Method::DELETE, &uri, Some(&other), None).await;
        assert_eq!(reply.status, StatusCode::FORBIDDEN);

        let reply = send(&app, Method::DELETE, &uri, Some(&owner), None).await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body["_id"], card["_id"]);

        let cards = send(&app, Method::GET, "/cards", Some(&owner), None).await;
        assert_eq!(cards.body, json!([]));

        let reply = send(&app, Method::DELETE, &uri, Some(&owner), None).await;
        assert_eq!(reply.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn likes_are_idempotent() {
        let app = app();
        let (owner_id, owner) = member(&app, "owner@b.com").await;
        let (fan_id, fan) = member(&app, "fan@b.com").await;
        let card = create_card(&app, &owner).await;
        let uri = format!("/cards/{}/likes", card["_id"].as_str().unwrap());

        send(&app, Method::PUT, &uri, Some(&fan), None).await;
        let reply = send(&app, Method::PUT, &uri, Some(&fan), None).await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body["likes"], json!([fan_id]));

        let reply = send(&app, Method::PUT, &uri, Some(&owner), None).await;
        assert_eq!(reply.body["likes"].as_array().map(Vec::len), Some(2));

        send(&app, Method::DELETE, &uri, Some(&fan), None).await;
        let reply = send(&app, Method::DELETE, &uri, Some(&fan), None).await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body["likes"], json!([owner_id]));
    }

    #[tokio::test]
    async fn liking_a_missing_card_is_not_found() {
        let app = app();
        let (_, token) = member(&app, "a@b.com").await;
        let uri = format!("/cards/{}/likes", ObjectId::new());
        for method in [Method::PUT, Method::DELETE] {
            let reply = send(&app, method, &uri, Some(&token), None).await;
            assert_eq!(reply.status, StatusCode::NOT_FOUND);
            assert!(reply.body["message"].is_string());
        }
    }

    #[tokio::test]
    async fn logout_clears_the_cookie() {
        let app = app();
        let (_, token) = member(&app, "a@b.com").await;
        let reply = send(&app, Method::DELETE, "/logout", Some(&token), None).await;
        assert_eq!(reply.status, StatusCode::OK);
        assert!(reply.body["exit"].is_string());
        let cookie = set_cookie(&reply);
        assert!(cookie.starts_with("jwt=;"));
        assert!(cookie.contains("Max-Age=0"));

        let reply = send(&app, Method::DELETE, "/logout", None, None).await;
        assert_eq!(reply.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_routes_are_not_found() {
        let app = app();
        let reply = send(&app, Method::GET, "/nowhere", None, None).await;
        assert_eq!(reply.status, StatusCode::NOT_FOUND);
        assert!(reply.body["message"].is_string());
    }

    #[tokio::test]
    async fn wrong_method_on_known_path_is_not_found() {
        let app = app();
        let (_, token) = member(&app, "a@b.com").await;
        let card_path = format!("/cards/{}", ObjectId::new());
        let cases = [
            (Method::POST, "/users"),
            (Method::GET, card_path.as_str()),
            (Method::PUT, "/users/me"),
            (Method::GET, "/signin"),
        ];
        for (method, uri) in cases {
            let reply = send(&app, method.clone(), uri, Some(&token), None).await;
            assert_eq!(reply.status, StatusCode::NOT_FOUND, "{method} {uri}");
            assert!(reply.body["message"].is_string(), "{method} {uri}");
        }

        let reply = send(&app, Method::POST, "/users", None, None).await;
        assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    }
}
