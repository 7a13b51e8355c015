use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::AppState;
use crate::db::models::Account;
use crate::db::queries;
use crate::domain::AccountType;
use crate::error::AppError;
use crate::validation;

#[derive(Deserialize)]
pub struct CreateAccountRequest {
    pub name: String,
    pub account_type: String,
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub is_gst: bool,
    #[serde(default)]
    pub is_tds: bool,
}

#[derive(Deserialize)]
pub struct ListAccountsQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

pub async fn create_account(
    State(state): State<AppState>,
    Json(payload): Json<CreateAccountRequest>,
) -> Result<impl IntoResponse, AppError> {
    validation::validate_account_name(&payload.name)?;
    let account_type: AccountType = payload
        .account_type
        .parse()
        .map_err(AppError::Validation)?;

    let mut account = Account::new(validation::sanitize_string(&payload.name), account_type);
    account.parent_id = payload.parent_id;
    account.is_gst = payload.is_gst;
    account.is_tds = payload.is_tds;

    let saved = queries::insert_account(&state.db, &account).await?;
    Ok(Json(saved))
}

pub async fn list_accounts(
    State(state): State<AppState>,
    Query(query): Query<ListAccountsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let accounts = queries::list_accounts(&state.db, query.include_inactive).await?;
    Ok(Json(accounts))
}

pub async fn get_account(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let account = queries::get_account(&state.db, id).await.map_err(|e| match e {
        sqlx::Error::RowNotFound => AppError::NotFound(format!("Account {} not found", id)),
        _ => AppError::Database(e),
    })?;
    Ok(Json(account))
}

/// Accounts with history are deactivated, never removed; the balance
/// invariant depends on old entries keeping their account reference.
pub async fn deactivate_account(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let account = queries::deactivate_account(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Account {} not found", id)))?;
    Ok(Json(account))
}
