use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::AppState;
use crate::db::queries;
use crate::error::AppError;
use crate::handlers::Pagination;
use crate::services::posting::PostingService;

pub async fn list_transactions(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> Result<impl IntoResponse, AppError> {
    let limit = pagination.limit.unwrap_or(20);
    let offset = pagination.offset.unwrap_or(0);

    let transactions = queries::list_transactions(&state.db, limit, offset).await?;
    Ok(Json(transactions))
}

pub async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let snapshot = queries::get_snapshot(&state.db, id).await.map_err(|e| match e {
        sqlx::Error::RowNotFound => AppError::NotFound(format!("Transaction {} not found", id)),
        _ => AppError::Database(e),
    })?;
    Ok(Json(snapshot))
}

pub async fn post_draft(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let snapshot = PostingService::new(state.db.clone()).post_draft(id).await?;
    Ok(Json(snapshot))
}

pub async fn reverse_transaction(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let snapshot = PostingService::new(state.db.clone()).reverse(id).await?;
    Ok(Json(snapshot))
}

pub async fn delete_draft(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    PostingService::new(state.db.clone()).delete_draft(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
