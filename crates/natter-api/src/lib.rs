//! Request layer for natter: bearer-token middleware, the authorization gate,
//! chat creation, and the user/chat/message handlers.

pub mod auth;
pub mod chats;
mod convert;
pub mod creation;
pub mod error;
pub mod extract;
pub mod gate;
pub mod messages;
pub mod middleware;
pub mod users;
mod validate;

use axum::{
    Router,
    routing::{delete, get, post},
};
use serde::Deserialize;
use tracing::error;

pub use auth::{AppState, AppStateInner};
pub use error::{ApiError, ApiResult};

const DEFAULT_PAGE_SIZE: u32 = 50;
const MAX_PAGE_SIZE: u32 = 200;

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Page {
    #[serde(default = "default_limit")]
    limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_limit() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl Page {
    pub fn limit(&self) -> u32 {
        self.limit.min(MAX_PAGE_SIZE)
    }
}

/// Run blocking work (SQLite, Argon2) off the async runtime.
pub(crate) async fn blocking<F, T>(f: F) -> ApiResult<T>
where
    F: FnOnce() -> ApiResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal
    })?
}

/// All routes. Everything outside `/auth` requires a bearer token.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login));

    let protected_routes = Router::new()
        .route("/users", get(users::list_users))
        .route("/users/me/seen", post(users::touch_last_seen))
        .route(
            "/users/{user_id}",
            get(users::get_user).put(users::update_user).delete(users::delete_user),
        )
        .route("/chats", post(chats::create_chat).get(chats::list_chats))
        .route(
            "/chats/{chat_id}",
            get(chats::get_chat).put(chats::update_chat).delete(chats::delete_chat),
        )
        .route("/chats/{chat_id}/members", post(chats::add_members))
        .route(
            "/chats/{chat_id}/members/{user_id}",
            delete(chats::remove_member),
        )
        .route("/chats/{chat_id}/messages", get(messages::get_messages))
        .route("/messages", post(messages::send_message))
        .route(
            "/messages/{message_id}",
            get(messages::get_message)
                .put(messages::update_message)
                .delete(messages::delete_message),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode, header};
    use chrono::{Duration, Utc};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use natter_auth::{SigningKey, TokenService};
    use natter_db::Database;

    struct Harness {
        app: Router,
        state: AppState,
    }

    impl Harness {
        fn new() -> Self {
            let db = Database::open_in_memory().unwrap();
            let tokens = TokenService::with_lifetime_hours(SigningKey::generate(), 24);
            let state = AppStateInner::new(db, tokens);
            Self { app: router(state.clone()), state }
        }

        /// Seed a user directly and return (id, token).
        fn user(&self, name: &str) -> (i64, String) {
            let row = self.state.db.create_user(name, "$argon2id$stub", name).unwrap();
            let (token, _) = self.state.tokens.issue(row.id, name).unwrap();
            (row.id, token)
        }

        async fn call(
            &self,
            method: Method,
            uri: &str,
            token: Option<&str>,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            let mut req = Request::builder()
                .method(method)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json");
            if let Some(token) = token {
                req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
            }
            let body = body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty);

            let resp = self.app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
            let status = resp.status();
            let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
            let value = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap()
            };
            (status, value)
        }
    }

    #[tokio::test]
    async fn protected_routes_need_a_valid_token() {
        let h = Harness::new();

        let (status, _) = h.call(Method::GET, "/chats", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = h.call(Method::GET, "/chats", Some("natter.v1.local.AAAA"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "invalid token");

        let foreign = TokenService::with_lifetime_hours(SigningKey::generate(), 24);
        let (token, _) = foreign.issue(1, "mallory").unwrap();
        let (status, _) = h.call(Method::GET, "/chats", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn expired_token_is_rejected_as_expired() {
        let h = Harness::new();
        let (id, _) = h.user("alice");
        let (token, _) = h
            .state
            .tokens
            .issue_at(Utc::now() - Duration::hours(25), id, "alice")
            .unwrap();

        let (status, body) = h.call(Method::GET, "/chats", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "token expired");
    }

    #[tokio::test]
    async fn create_chat_reports_partial_invitation() {
        let h = Harness::new();
        let (carol, token) = h.user("carol");
        let (mike, _) = h.user("mike");

        let (status, body) = h
            .call(
                Method::POST,
                "/chats",
                Some(&token),
                Some(json!({ "name": "team", "is_group": true, "member_ids": [carol, mike, 999] })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["creator_id"], carol);
        assert_eq!(body["invitation"]["added"], json!([mike]));
        assert_eq!(body["invitation"]["skipped"][1]["reason"], "unknown_user");

        let chat_id = body["id"].as_i64().unwrap();
        let (status, detail) = h.call(Method::GET, &format!("/chats/{chat_id}"), Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        let members = detail["members"].as_array().unwrap();
        assert_eq!(members.len(), 2);
        assert!(members.iter().any(|m| m["user_id"] == carol && m["is_admin"] == true));
        assert!(members.iter().any(|m| m["user_id"] == mike && m["is_admin"] == false));
    }

    #[tokio::test]
    async fn create_chat_requires_members() {
        let h = Harness::new();
        let (_, token) = h.user("carol");
        let (status, _) = h
            .call(Method::POST, "/chats", Some(&token), Some(json!({ "name": "x", "member_ids": [] })))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn non_admin_rename_is_forbidden_and_missing_chat_is_not_found() {
        let h = Harness::new();
        let (carol, _) = h.user("carol");
        let (mike, mike_token) = h.user("mike");
        let chat = creation::create_chat_with_members(&h.state.db, "team", true, carol, &[mike])
            .unwrap()
            .chat;

        let rename = Some(json!({ "name": "mine now" }));
        let (status, _) = h
            .call(Method::PUT, &format!("/chats/{}", chat.id), Some(&mike_token), rename.clone())
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = h.call(Method::PUT, "/chats/4040", Some(&mike_token), rename).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "chat not found");
    }

    #[tokio::test]
    async fn only_creator_deletes_chat() {
        let h = Harness::new();
        let (carol, carol_token) = h.user("carol");
        let (adam, adam_token) = h.user("adam");
        let chat = creation::create_chat_with_members(&h.state.db, "team", true, carol, &[]).unwrap().chat;
        h.state.db.add_member(chat.id, adam, true).unwrap();
        let uri = format!("/chats/{}", chat.id);

        let (status, _) = h.call(Method::DELETE, &uri, Some(&adam_token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = h.call(Method::DELETE, &uri, Some(&carol_token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = h.call(Method::GET, &uri, Some(&carol_token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn admins_manage_members_but_not_the_creator() {
        let h = Harness::new();
        let (carol, _) = h.user("carol");
        let (adam, adam_token) = h.user("adam");
        let (nina, _) = h.user("nina");
        let chat = creation::create_chat_with_members(&h.state.db, "team", true, carol, &[]).unwrap().chat;
        h.state.db.add_member(chat.id, adam, true).unwrap();

        let (status, body) = h
            .call(
                Method::POST,
                &format!("/chats/{}/members", chat.id),
                Some(&adam_token),
                Some(json!({ "member_ids": [nina, adam] })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["added"], json!([nina]));
        assert_eq!(body["skipped"][0]["reason"], "already_member");

        let creator_uri = format!("/chats/{}/members/{}", chat.id, carol);
        let (status, _) = h.call(Method::DELETE, &creator_uri, Some(&adam_token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let nina_uri = format!("/chats/{}/members/{}", chat.id, nina);
        let (status, _) = h.call(Method::DELETE, &nina_uri, Some(&adam_token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = h.call(Method::DELETE, &nina_uri, Some(&adam_token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn messages_follow_membership_and_authorship() {
        let h = Harness::new();
        let (carol, carol_token) = h.user("carol");
        let (mike, mike_token) = h.user("mike");
        let (_, otto_token) = h.user("otto");
        let chat = creation::create_chat_with_members(&h.state.db, "team", true, carol, &[mike])
            .unwrap()
            .chat;
        let send = json!({ "chat_id": chat.id, "content": "hello" });

        let (status, _) = h.call(Method::POST, "/messages", Some(&otto_token), Some(send.clone())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, message) = h.call(Method::POST, "/messages", Some(&mike_token), Some(send)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(message["sender_id"], mike);
        let uri = format!("/messages/{}", message["id"]);

        let (status, _) = h.call(Method::GET, &uri, Some(&carol_token), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = h.call(Method::GET, &uri, Some(&otto_token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let edit = Some(json!({ "content": "edited" }));
        let (status, _) = h.call(Method::PUT, &uri, Some(&carol_token), edit.clone()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, body) = h.call(Method::PUT, &uri, Some(&mike_token), edit).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["content"], "edited");

        let (status, listed) = h
            .call(Method::GET, &format!("/chats/{}/messages", chat.id), Some(&carol_token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed.as_array().unwrap().len(), 1);

        let (status, _) = h.call(Method::DELETE, &uri, Some(&mike_token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = h.call(Method::GET, &uri, Some(&mike_token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn profiles_are_self_service() {
        let h = Harness::new();
        let (alice, alice_token) = h.user("alice");
        let (bob, _) = h.user("bob");

        let (status, _) = h
            .call(
                Method::PUT,
                &format!("/users/{bob}"),
                Some(&alice_token),
                Some(json!({ "display_name": "pwned" })),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = h.call(Method::DELETE, "/users/4040", Some(&alice_token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = h
            .call(
                Method::PUT,
                &format!("/users/{alice}"),
                Some(&alice_token),
                Some(json!({ "display_name": "Alice" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["display_name"], "Alice");
        assert!(body.get("password").is_none());
    }

    #[tokio::test]
    async fn register_then_login() {
        let h = Harness::new();
        let creds = json!({ "username": "dana", "password": "s3cret-pass" });

        let (status, body) = h.call(Method::POST, "/auth/register", None, Some(creds.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        let user_id = body["user"]["id"].as_i64().unwrap();

        let (status, _) = h.call(Method::POST, "/auth/register", None, Some(creds.clone())).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let wrong = json!({ "username": "dana", "password": "not-it" });
        let (status, wrong_body) = h.call(Method::POST, "/auth/login", None, Some(wrong)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let ghost = json!({ "username": "ghost", "password": "whatever" });
        let (status, ghost_body) = h.call(Method::POST, "/auth/login", None, Some(ghost)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(wrong_body, ghost_body);

        let (status, body) = h.call(Method::POST, "/auth/login", None, Some(creds)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["user"]["last_seen"].is_string());
        let token = body["token"].as_str().unwrap().to_string();

        let (status, me) = h.call(Method::GET, &format!("/users/{user_id}"), Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["username"], "dana");
    }

    #[tokio::test]
    async fn register_losing_a_race_for_the_name_is_a_conflict() {
        let h = Harness::new();
        // Another registration takes "dana" between the lookup and the insert.
        h.state
            .db
            .with_conn(|conn| {
                Ok(conn.execute_batch(
                    "CREATE TRIGGER steal_name BEFORE INSERT ON users
                     WHEN NEW.username = 'dana'
                       AND NOT EXISTS (SELECT 1 FROM users WHERE username = 'dana')
                     BEGIN INSERT INTO users (username, password) VALUES ('dana', 'x'); END;",
                )?)
            })
            .unwrap();

        let creds = json!({ "username": "dana", "password": "s3cret-pass" });
        let (status, body) = h.call(Method::POST, "/auth/register", None, Some(creds)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "username is already taken");
    }

    #[tokio::test]
    async fn rejected_bodies_use_the_error_shape() {
        let h = Harness::new();
        let (_, token) = h.user("carol");

        let (status, body) = h
            .call(
                Method::POST,
                "/chats",
                Some(&token),
                Some(json!({ "name": "team", "member_ids": [1], "topic": "extra" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("expected fields"));

        let req = Request::builder()
            .method(Method::POST)
            .uri("/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{\"username\": "))
            .unwrap();
        let resp = h.app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body["error"].as_str().unwrap().contains("not valid JSON"));

        let req = Request::builder()
            .method(Method::POST)
            .uri("/auth/login")
            .body(Body::from(r#"{"username":"carol","password":"whatever"}"#))
            .unwrap();
        let resp = h.app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body["error"].as_str().unwrap().contains("Content-Type"));
    }
}
