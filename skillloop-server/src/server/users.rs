use axum::{
    Json,
    extract::{Extension, Query, State},
};
use serde::Deserialize;
use skillloop_shared::api::{CreditTransactionDto, UserDto};

use super::auth::AuthCtx;
use super::{AppError, AppState, rfc3339};

pub(super) async fn api_me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
) -> Result<Json<UserDto>, AppError> {
    let user = state
        .store
        .get_user(&auth.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    Ok(Json(UserDto {
        id: user.id,
        email: user.email,
        display_name: user.display_name,
        credits: user.credits,
        rating: user.rating,
    }))
}

#[derive(Deserialize)]
pub(super) struct PageOpts {
    page: Option<usize>,
    per_page: Option<usize>,
}

pub(super) async fn api_list_credit_transactions(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Query(opts): Query<PageOpts>,
) -> Result<Json<Vec<CreditTransactionDto>>, AppError> {
    let page = opts.page.unwrap_or(1);
    let per_page = opts.per_page.unwrap_or(20);
    let rows = state
        .store
        .list_credit_transactions(&auth.user_id, page, per_page)
        .await?;
    let items = rows
        .into_iter()
        .map(|t| CreditTransactionDto {
            id: t.id,
            session_id: t.session_id,
            amount: t.amount,
            transaction_type: t.transaction_type,
            description: t.description,
            balance_after: t.balance_after,
            created_at: rfc3339(t.created_at),
        })
        .collect();
    Ok(Json(items))
}
