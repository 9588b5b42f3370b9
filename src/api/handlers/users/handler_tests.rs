//! Router-level tests for the owner's user-administration routes.

use anyhow::{anyhow, Context, Result};
use axum::{
    body::Body,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Request, Response, StatusCode,
    },
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use super::Role;
use crate::{api::app, test_support::TestApp};

fn router(test: &TestApp) -> Result<Router> {
    app(test.state.clone())
}

async fn body_json(response: Response<Body>) -> Result<Value> {
    let bytes = response
        .into_body()
        .collect()
        .await
        .context("read body")?
        .to_bytes();
    serde_json::from_slice(&bytes).context("decode body")
}

async fn access_token(test: &TestApp, email: &str, role: Role) -> Result<String> {
    let user = test.with_user(email, "password-123", role).await;
    let pair = test
        .state
        .tokens()
        .issue(&user)
        .await
        .map_err(|err| anyhow!("{err}"))?;
    Ok(pair.access_token)
}

fn get(uri: &str, token: Option<&str>) -> Result<Request<Body>> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).context("build request")
}

fn create(token: Option<&str>, body: &Value) -> Result<Request<Body>> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/v1/users")
        .header(CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    builder
        .body(Body::from(body.to_string()))
        .context("build request")
}

fn guest() -> Value {
    json!({"email": "guest@x.com", "name": "Guest Writer", "password": "initial-password"})
}

#[tokio::test]
async fn owner_creates_admin_who_can_log_in() -> Result<()> {
    let test = TestApp::new();
    let token = access_token(&test, "owner@x.com", Role::Owner).await?;

    let response = router(&test)?.oneshot(create(Some(&token), &guest())?).await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await?;
    assert_eq!(body["success"], true);
    assert_eq!(body["user"]["email"], "guest@x.com");
    assert_eq!(body["user"]["role"], "admin");

    let login = Request::builder()
        .method("POST")
        .uri("/v1/auth/login")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({"email": "guest@x.com", "password": "initial-password"}).to_string(),
        ))?;
    let response = router(&test)?.oneshot(login).await?;
    assert_eq!(response.status(), StatusCode::OK);

    let again = router(&test)?.oneshot(create(Some(&token), &guest())?).await?;
    assert_eq!(again.status(), StatusCode::CONFLICT);
    Ok(())
}

#[tokio::test]
async fn user_routes_need_an_owner_token() -> Result<()> {
    let test = TestApp::new();
    let admin = access_token(&test, "admin@x.com", Role::Admin).await?;

    let response = router(&test)?.oneshot(get("/v1/users", None)?).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = router(&test)?.oneshot(create(None, &guest())?).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = router(&test)?
        .oneshot(get("/v1/users", Some(&admin))?)
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = router(&test)?.oneshot(create(Some(&admin), &guest())?).await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(!test.identity.is_registered("guest@x.com").await);
    Ok(())
}

#[tokio::test]
async fn owner_lists_and_looks_up_users() -> Result<()> {
    let test = TestApp::new();
    let token = access_token(&test, "owner@x.com", Role::Owner).await?;
    let admin = test.users.seed("admin@x.com", Role::Admin).await;

    let response = router(&test)?
        .oneshot(get("/v1/users", Some(&token))?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await?;
    assert_eq!(body["users"].as_array().map(Vec::len), Some(2));

    let response = router(&test)?
        .oneshot(get(&format!("/v1/users/{}", admin.id), Some(&token))?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await?;
    assert_eq!(body["user"]["email"], "admin@x.com");

    let response = router(&test)?
        .oneshot(get(&format!("/v1/users/{}", Uuid::new_v4()), Some(&token))?)
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = router(&test)?
        .oneshot(get("/v1/users/not-a-uuid", Some(&token))?)
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn malformed_create_body_is_bad_request() -> Result<()> {
    let test = TestApp::new();
    let token = access_token(&test, "owner@x.com", Role::Owner).await?;

    let response = router(&test)?
        .oneshot(create(Some(&token), &json!({"email": "guest@x.com"}))?)
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await?;
    assert_eq!(body["success"], false);
    assert_eq!(test.users.count().await, 1);
    Ok(())
}
