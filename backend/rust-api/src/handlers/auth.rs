use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::sync::Arc;

use crate::{
    error::ServiceError,
    extractors::AppJson,
    middlewares::auth::{JwtClaims, JwtService, TOKEN_COOKIE},
    models::{
        refresh_token::{RefreshTokenRequest, RefreshTokenResponse},
        user::{LoginRequest, RegisterRequest},
    },
    services::{auth_service::AuthService, AppState},
};

fn auth_service(state: &AppState) -> AuthService {
    AuthService::new(
        state.store.clone(),
        JwtService::new(&state.config.auth.jwt_secret),
        &state.config.auth,
    )
}

/// POST /api/v1/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<RegisterRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let profile = auth_service(&state).register(req).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

/// POST /api/v1/auth/login
///
/// Besides the JSON body, the access token is set as an http-only cookie for
/// browser clients.
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    AppJson(req): AppJson<LoginRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let response = auth_service(&state).login(req).await?;

    let cookie = Cookie::build((TOKEN_COOKIE, response.access_token.clone()))
        .path("/")
        .http_only(true)
        .secure(state.config.auth.cookie_secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(
            state.config.auth.access_token_ttl_seconds,
        ))
        .build();

    Ok((jar.add(cookie), Json(response)))
}

/// POST /api/v1/auth/refresh
pub async fn refresh_token(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<RefreshTokenRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let access_token = auth_service(&state)
        .refresh_token(&req.refresh_token)
        .await?;
    Ok(Json(RefreshTokenResponse { access_token }))
}

/// POST /api/v1/auth/logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    AppJson(req): AppJson<RefreshTokenRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    auth_service(&state).logout(&req.refresh_token).await?;

    let jar = jar.remove(Cookie::build(TOKEN_COOKIE).path("/"));
    Ok((StatusCode::NO_CONTENT, jar))
}

/// GET /api/v1/auth/me
pub async fn me(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, ServiceError> {
    let profile = auth_service(&state).get_user(&claims.sub).await?;
    Ok(Json(profile))
}
