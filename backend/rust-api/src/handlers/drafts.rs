use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use std::sync::Arc;

use crate::{
    error::ServiceError, extractors::AppJson, middlewares::auth::JwtClaims,
    models::draft::SaveDraftRequest, services::draft_service::DraftService, services::AppState,
};

/// POST /api/v1/drafts
pub async fn save_draft(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<SaveDraftRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let draft = DraftService::new(state.store.clone())
        .save_draft(&claims.sub, req)
        .await?;
    Ok(Json(draft))
}

/// GET /api/v1/drafts/{form_id}
pub async fn get_draft(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(form_id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let draft = DraftService::new(state.store.clone())
        .get_draft(&claims.sub, &form_id)
        .await?;
    Ok(Json(draft))
}

/// DELETE /api/v1/drafts/{form_id}
pub async fn delete_draft(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(form_id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    DraftService::new(state.store.clone())
        .discard_draft(&claims.sub, &form_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
