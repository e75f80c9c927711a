use axum::{
    extract::{FromRef, Query, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use tracing::{error, instrument};

use crate::{
    auth::{
        dto::{LoginRequest, LoginResponse, RegisterRequest, ResendQuery, VerifyRequest},
        jwt::JwtKeys,
        repo_types::User,
        services,
    },
    error::AuthError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/verify", post(verify))
        .route("/auth/resend", post(resend))
}

/// Verify and resend answer in plain text: the message on success, the error text with 400 otherwise.
fn plain_text_error(e: AuthError) -> (StatusCode, String) {
    if e.is_internal() {
        error!(error = ?e, "verification flow failed");
        return (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".into());
    }
    (StatusCode::BAD_REQUEST, e.to_string())
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<User>, AuthError> {
    let user = services::register(&state, payload).await?;
    Ok(Json(user))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AuthError> {
    let user = services::login(&state, payload).await?;
    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(&user)?;
    Ok(Json(LoginResponse {
        token,
        expires_in: keys.expires_in(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn verify(
    State(state): State<AppState>,
    Json(payload): Json<VerifyRequest>,
) -> Result<&'static str, (StatusCode, String)> {
    services::verify_user(&state, payload)
        .await
        .map_err(plain_text_error)?;
    Ok("Account verified successfully!")
}

#[instrument(skip(state))]
pub async fn resend(
    State(state): State<AppState>,
    Query(query): Query<ResendQuery>,
) -> Result<&'static str, (StatusCode, String)> {
    services::resend_verification_code(&state, &query.email)
        .await
        .map_err(plain_text_error)?;
    Ok("Verification code resent successfully!")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{auth::repo::InMemoryUserStore, mail::RecordingMailer};
    use axum::{body::Body, http::Request};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app(state: AppState) -> Router {
        auth_routes().with_state(state)
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_string(resp: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn register_returns_user_without_secrets() {
        let state = AppState::fake();
        let resp = app(state)
            .oneshot(post_json(
                "/auth/register",
                serde_json::json!({"email": "a@x.com", "username": "alice", "password": "p1"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body_string(resp).await).unwrap();
        assert_eq!(json["email"], "a@x.com");
        assert_eq!(json["username"], "alice");
        assert_eq!(json["enabled"], false);
        assert!(json["verificationCodeExpiresAt"].is_string());
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("verificationCode").is_none());
    }

    #[tokio::test]
    async fn full_flow_register_verify_login() {
        let mailer = Arc::new(RecordingMailer::default());
        let state = AppState::fake_with(Arc::new(InMemoryUserStore::default()), mailer.clone());
        let register = serde_json::json!({"email": "a@x.com", "username": "alice", "password": "p1"});
        let login = serde_json::json!({"username": "alice", "password": "p1"});

        let resp = app(state.clone())
            .oneshot(post_json("/auth/register", register.clone()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app(state.clone())
            .oneshot(post_json("/auth/register", register))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let resp = app(state.clone())
            .oneshot(post_json("/auth/login", login.clone()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let code = state
            .users
            .find_by_email("a@x.com")
            .await
            .unwrap()
            .unwrap()
            .verification_code
            .unwrap();
        assert!(mailer.sent()[0].html_body.contains(&code));

        let verify = serde_json::json!({"email": "a@x.com", "verificationCode": code});
        let resp = app(state.clone())
            .oneshot(post_json("/auth/verify", verify.clone()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_string(resp).await, "Account verified successfully!");

        let resp = app(state.clone())
            .oneshot(post_json("/auth/verify", verify))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(body_string(resp).await.contains("Verification code is null"));

        let resp = app(state.clone())
            .oneshot(post_json("/auth/login", login))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_string(resp).await).unwrap();
        assert_eq!(json["expiresIn"], 3600);
        let token = json["token"].as_str().unwrap();
        let claims = JwtKeys::from_ref(&state).verify(token).unwrap();
        assert_eq!(claims.username, "alice");
    }

    #[tokio::test]
    async fn resend_reports_errors_as_plain_text_400() {
        let state = AppState::fake();

        let resp = app(state.clone())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/auth/resend?email=ghost%40x.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_string(resp).await, "User not found!");

        app(state.clone())
            .oneshot(post_json(
                "/auth/register",
                serde_json::json!({"email": "a@x.com", "username": "alice", "password": "p1"}),
            ))
            .await
            .unwrap();
        let resp = app(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/auth/resend?email=a%40x.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_string(resp).await, "Verification code resent successfully!");
    }

    #[tokio::test]
    async fn verify_wrong_code_is_400() {
        let state = AppState::fake();
        app(state.clone())
            .oneshot(post_json(
                "/auth/register",
                serde_json::json!({"email": "a@x.com", "username": "alice", "password": "p1"}),
            ))
            .await
            .unwrap();
        let code = state
            .users
            .find_by_email("a@x.com")
            .await
            .unwrap()
            .unwrap()
            .verification_code
            .unwrap();
        let wrong = if code == "999999" { "999998" } else { "999999" };

        let resp = app(state)
            .oneshot(post_json(
                "/auth/verify",
                serde_json::json!({"email": "a@x.com", "verificationCode": wrong}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_string(resp).await, "Incorrect verification code!");
    }
}
