use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use std::sync::Arc;

use crate::{
    error::ServiceError,
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::{
        form::{CreateFormRequest, UpdateFormRequest},
        participation::ParticipationStatus,
        submission::{HasVotedQuery, HasVotedResponse, SubmissionResponse, SubmitFormRequest},
    },
    services::{
        draft_service::DraftService, form_service::FormService,
        participation_service::ParticipationService, submission_service::SubmissionService,
        AppState,
    },
};

/// POST /api/v1/forms
pub async fn create_form(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<CreateFormRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let form = FormService::new(state.store.clone())
        .create_form(&claims.sub, req)
        .await?;
    Ok((StatusCode::CREATED, Json(form)))
}

/// GET /api/v1/forms/user
pub async fn list_user_forms(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, ServiceError> {
    let forms = FormService::new(state.store.clone())
        .list_user_forms(&claims.sub)
        .await?;
    Ok(Json(forms))
}

/// GET /api/v1/forms/{id}
pub async fn get_form(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(form_id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let form = FormService::new(state.store.clone())
        .get_form(&claims.sub, &form_id)
        .await?;
    Ok(Json(form))
}

/// GET /api/v1/forms/{id}/public
pub async fn get_public_form(
    State(state): State<Arc<AppState>>,
    Path(form_id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let form = FormService::new(state.store.clone())
        .get_public_form(&form_id)
        .await?;
    Ok(Json(form))
}

/// PUT /api/v1/forms/{id}
pub async fn update_form(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(form_id): Path<String>,
    AppJson(req): AppJson<UpdateFormRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let form = FormService::new(state.store.clone())
        .update_form(&claims.sub, &form_id, req)
        .await?;
    Ok(Json(form))
}

/// DELETE /api/v1/forms/{id}
pub async fn delete_form(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(form_id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    FormService::new(state.store.clone())
        .delete_form(&claims.sub, &form_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/forms/{id}/submit
///
/// Once the submission is stored the participation is marked completed and
/// the draft dropped. Failures in those follow-ups are logged, not returned:
/// the submission itself already succeeded.
pub async fn submit_form(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(form_id): Path<String>,
    AppJson(req): AppJson<SubmitFormRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let submission = SubmissionService::new(state.store.clone())
        .submit(&form_id, &claims.sub, &req.answers)
        .await?;

    if let Err(e) = ParticipationService::new(state.store.clone())
        .set_status(&claims.sub, &form_id, ParticipationStatus::Completed)
        .await
    {
        tracing::warn!(
            user_id = %claims.sub,
            form_id = %form_id,
            error = %e,
            "Could not mark participation completed"
        );
    }
    if let Err(e) = DraftService::new(state.store.clone())
        .remove_draft(&claims.sub, &form_id)
        .await
    {
        tracing::warn!(
            user_id = %claims.sub,
            form_id = %form_id,
            error = %e,
            "Could not remove draft after submission"
        );
    }

    Ok((StatusCode::CREATED, Json(SubmissionResponse::from(submission))))
}

/// GET /api/v1/forms/{id}/hasvoted?email=
pub async fn has_voted(
    State(state): State<Arc<AppState>>,
    Path(form_id): Path<String>,
    Query(query): Query<HasVotedQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let submitted = SubmissionService::new(state.store.clone())
        .has_submitted(&form_id, &query.email)
        .await?;
    Ok(Json(HasVotedResponse { submitted }))
}

/// GET /api/v1/forms/{id}/voters
pub async fn list_voters(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(form_id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let voters = SubmissionService::new(state.store.clone())
        .voters(&form_id, &claims.sub)
        .await?;
    Ok(Json(voters))
}
