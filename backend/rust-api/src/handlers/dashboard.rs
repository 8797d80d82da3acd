use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use std::sync::Arc;

use crate::{
    error::ServiceError,
    middlewares::auth::JwtClaims,
    models::{
        dashboard::ActivitiesQuery,
        participation::{ParticipationResponse, ParticipationStatus},
    },
    services::{
        dashboard_service::DashboardService, participation_service::ParticipationService,
        AppState,
    },
};

/// GET /api/v1/dashboard
pub async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, ServiceError> {
    let data = DashboardService::new(state.store.clone())
        .dashboard(&claims.sub)
        .await?;
    Ok(Json(data))
}

/// GET /api/v1/dashboard/activities?status=&page=&per_page=
pub async fn list_activities(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Query(query): Query<ActivitiesQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let page = DashboardService::new(state.store.clone())
        .activities(&claims.sub, &query)
        .await?;
    Ok(Json(page))
}

/// GET /api/v1/dashboard/forms/{form_id}/status
pub async fn get_status(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(form_id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let participation = ParticipationService::new(state.store.clone())
        .get_participation(&claims.sub, &form_id)
        .await?;
    Ok(Json(ParticipationResponse::from(participation)))
}

/// PUT /api/v1/dashboard/forms/{form_id}/status/{status}
pub async fn set_status(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path((form_id, status)): Path<(String, String)>,
) -> Result<impl IntoResponse, ServiceError> {
    let status = match status.parse::<ParticipationStatus>() {
        Ok(status) if status != ParticipationStatus::Deleted => status,
        _ => {
            return Err(ServiceError::Validation(format!(
                "status must be one of available, in_progress, completed; got {}",
                status
            )))
        }
    };

    let participation = ParticipationService::new(state.store.clone())
        .set_status(&claims.sub, &form_id, status)
        .await?;
    Ok(Json(ParticipationResponse::from(participation)))
}

/// DELETE /api/v1/dashboard/forms/{form_id}/status
pub async fn delete_status(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(form_id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    ParticipationService::new(state.store.clone())
        .delete_participation(&claims.sub, &form_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
