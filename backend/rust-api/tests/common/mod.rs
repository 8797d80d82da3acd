#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use voting_api::{
    config::Config,
    create_router,
    models::form::{CreateFormRequest, FormResponse},
    models::user::{LoginRequest, RegisterRequest},
    repository::{InMemoryStore, Store},
    services::{auth_service::AuthService, form_service::FormService, AppState},
    middlewares::auth::JwtService,
};

pub const PASSWORD: &str = "correct-horse-battery";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.environment = "test".to_string();
    // Cheapest cost bcrypt accepts
    config.auth.bcrypt_cost = 4;
    config
}

pub fn test_store() -> Arc<dyn Store> {
    init_tracing();
    Arc::new(InMemoryStore::new())
}

pub fn create_test_app() -> (Router, Arc<dyn Store>) {
    let store = test_store();
    let state = Arc::new(AppState::with_store(test_config(), store.clone()));
    (create_router(state), store)
}

pub fn auth_service(store: &Arc<dyn Store>) -> AuthService {
    let config = test_config();
    AuthService::new(
        store.clone(),
        JwtService::new(&config.auth.jwt_secret),
        &config.auth,
    )
}

/// Registers a user straight through the service and returns its id.
pub async fn create_user(store: &Arc<dyn Store>, email: &str) -> String {
    auth_service(store)
        .register(RegisterRequest {
            email: email.to_string(),
            password: PASSWORD.to_string(),
        })
        .await
        .unwrap()
        .id
}

pub fn lunch_form_request() -> CreateFormRequest {
    serde_json::from_value(lunch_form_json()).unwrap()
}

/// Two questions: a single choice with two options and a free text one.
pub fn lunch_form_json() -> Value {
    json!({
        "title": "Friday lunch",
        "description": "Where do we eat?",
        "questions": [
            {
                "title": "Place",
                "type": "single_choice",
                "options": [{ "title": "Pizza" }, { "title": "Sushi" }]
            },
            { "title": "Comments", "type": "text" }
        ]
    })
}

pub async fn create_lunch_form(store: &Arc<dyn Store>, owner_id: &str) -> FormResponse {
    FormService::new(store.clone())
        .create_form(owner_id, lunch_form_request())
        .await
        .unwrap()
}

/// Sends a JSON request through the router and returns status and parsed body
/// (`Value::Null` for empty bodies).
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };

    (status, value)
}

/// Registers and logs in over HTTP, returning the access token.
pub async fn register_and_login(app: &Router, email: &str) -> String {
    let body = json!({ "email": email, "password": PASSWORD });
    let (status, _) = send(app, "POST", "/api/v1/auth/register", None, Some(body.clone())).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, value) = send(app, "POST", "/api/v1/auth/login", None, Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    value["access_token"].as_str().unwrap().to_string()
}

pub async fn login(store: &Arc<dyn Store>, email: &str) -> voting_api::models::user::AuthResponse {
    auth_service(store)
        .login(LoginRequest {
            email: email.to_string(),
            password: PASSWORD.to_string(),
        })
        .await
        .unwrap()
}
