use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
};
use skillloop_shared::api::{CreateMatchReq, MatchDto};
use skillloop_shared::domain::MatchStatus;
use uuid::Uuid;

use super::auth::AuthCtx;
use super::{AppError, AppState, rfc3339};
use crate::storage::models::Match;

fn to_dto(m: Match) -> Result<MatchDto, AppError> {
    let status: MatchStatus = m.status.parse().map_err(AppError::internal)?;
    Ok(MatchDto {
        id: m.id,
        user_id: m.user_id,
        matched_user_id: m.matched_user_id,
        skill: m.skill,
        status,
        created_at: rfc3339(m.created_at),
        updated_at: rfc3339(m.updated_at),
    })
}

pub(super) async fn api_list_matches(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
) -> Result<Json<Vec<MatchDto>>, AppError> {
    let rows = state.store.list_matches_for_user(&auth.user_id).await?;
    let items = rows.into_iter().map(to_dto).collect::<Result<_, _>>()?;
    Ok(Json(items))
}

pub(super) async fn api_create_match(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Json(body): Json<CreateMatchReq>,
) -> Result<(StatusCode, Json<MatchDto>), AppError> {
    let matched = Uuid::parse_str(&body.matched_user_id).map_err(|_| {
        AppError::bad_request(format!("invalid matched_user_id: {}", body.matched_user_id))
    })?;
    let created = state
        .store
        .create_match(&auth.user_id, &matched.to_string(), body.skill.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(to_dto(created)?)))
}

async fn resolve(
    state: &AppState,
    auth: &AuthCtx,
    id: Uuid,
    next: MatchStatus,
) -> Result<Json<MatchDto>, AppError> {
    let updated = state
        .store
        .set_match_status(&id.to_string(), &auth.user_id, next)
        .await?;
    Ok(Json(to_dto(updated)?))
}

pub(super) async fn api_accept_match(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(id): Path<Uuid>,
) -> Result<Json<MatchDto>, AppError> {
    resolve(&state, &auth, id, MatchStatus::Accepted).await
}

pub(super) async fn api_reject_match(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(id): Path<Uuid>,
) -> Result<Json<MatchDto>, AppError> {
    resolve(&state, &auth, id, MatchStatus::Rejected).await
}
