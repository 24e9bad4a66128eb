use axum::{
    Json,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
};
use skillloop_shared::api::{
    CreateSessionReq, RateSessionReq, SessionDto, SessionListQuery, UpdateSessionReq,
};
use skillloop_shared::domain::{SessionStatus, SessionType};
use uuid::Uuid;

use super::auth::AuthCtx;
use super::{AppError, AppState, parse_rfc3339, rfc3339};
use crate::storage::models::{Session, SessionChangeset};
use crate::storage::sessions::SessionDraft;

fn to_dto(s: Session) -> Result<SessionDto, AppError> {
    let session_type: SessionType = s.session_type.parse().map_err(AppError::internal)?;
    let status: SessionStatus = s.status.parse().map_err(AppError::internal)?;
    Ok(SessionDto {
        id: s.id,
        user_id: s.user_id,
        participant_id: s.participant_id,
        title: s.title,
        description: s.description,
        session_type,
        status,
        duration: s.duration,
        scheduled_at: s.scheduled_at.map(rfc3339),
        rating: s.rating,
        feedback: s.feedback,
        rated_by: s.rated_by,
        created_at: rfc3339(s.created_at),
        updated_at: rfc3339(s.updated_at),
    })
}

fn to_dtos(rows: Vec<Session>) -> Result<Vec<SessionDto>, AppError> {
    rows.into_iter().map(to_dto).collect()
}

fn parse_user_id(field: &str, value: &str) -> Result<String, AppError> {
    Uuid::parse_str(value)
        .map(|u| u.to_string())
        .map_err(|_| AppError::bad_request(format!("invalid {}: {}", field, value)))
}

/// Parses the value of a clearable field, keeping absent and null apart.
fn parse_nullable<T>(
    field: Option<Option<String>>,
    parse: impl FnOnce(&str) -> Result<T, AppError>,
) -> Result<Option<Option<T>>, AppError> {
    match field {
        None => Ok(None),
        Some(None) => Ok(Some(None)),
        Some(Some(v)) => parse(&v).map(|p| Some(Some(p))),
    }
}

pub(super) async fn api_list_sessions(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Query(q): Query<SessionListQuery>,
) -> Result<Json<Vec<SessionDto>>, AppError> {
    let rows = state
        .store
        .list_sessions_for_user(&auth.user_id, q.status)
        .await?;
    Ok(Json(to_dtos(rows)?))
}

pub(super) async fn api_session_history(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
) -> Result<Json<Vec<SessionDto>>, AppError> {
    let rows = state.store.session_history(&auth.user_id).await?;
    Ok(Json(to_dtos(rows)?))
}

pub(super) async fn api_get_session(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionDto>, AppError> {
    let session = state
        .store
        .get_session_for_party(&id.to_string(), &auth.user_id)
        .await?;
    Ok(Json(to_dto(session)?))
}

pub(super) async fn api_create_session(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Json(body): Json<CreateSessionReq>,
) -> Result<(StatusCode, Json<SessionDto>), AppError> {
    let scheduled_at = body
        .scheduled_at
        .as_deref()
        .map(|v| parse_rfc3339("scheduled_at", v))
        .transpose()?;
    let participant_id = body
        .participant_id
        .as_deref()
        .map(|v| parse_user_id("participant_id", v))
        .transpose()?;
    let draft = SessionDraft {
        title: body.title,
        description: body.description,
        session_type: body.session_type,
        duration: body.duration,
        scheduled_at,
        participant_id,
    };
    let session = state.store.create_session(&auth.user_id, draft).await?;
    Ok((StatusCode::CREATED, Json(to_dto(session)?)))
}

pub(super) async fn api_update_session(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateSessionReq>,
) -> Result<Json<SessionDto>, AppError> {
    let changes = SessionChangeset {
        title: body.title,
        description: body.description,
        session_type: body.session_type.map(|t| t.as_str().to_string()),
        duration: body.duration,
        scheduled_at: parse_nullable(body.scheduled_at, |v| parse_rfc3339("scheduled_at", v))?,
        participant_id: parse_nullable(body.participant_id, |v| {
            parse_user_id("participant_id", v)
        })?,
    };
    let session = state
        .store
        .update_session(&id.to_string(), &auth.user_id, changes)
        .await?;
    Ok(Json(to_dto(session)?))
}

pub(super) async fn api_complete_session(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionDto>, AppError> {
    let done = state
        .store
        .complete_session(&id.to_string(), &auth.user_id)
        .await?;
    Ok(Json(to_dto(done.session)?))
}

pub(super) async fn api_rate_session(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(id): Path<Uuid>,
    Json(body): Json<RateSessionReq>,
) -> Result<Json<SessionDto>, AppError> {
    let session = state
        .store
        .rate_session(&id.to_string(), &auth.user_id, body.rating, body.feedback)
        .await?;
    Ok(Json(to_dto(session)?))
}

pub(super) async fn api_delete_session(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state
        .store
        .delete_session(&id.to_string(), &auth.user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
