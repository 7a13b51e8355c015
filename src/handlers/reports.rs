use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use crate::AppState;
use crate::error::AppError;
use crate::services::reports;

#[derive(Deserialize)]
pub struct LedgerQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Deserialize)]
pub struct TrialBalanceQuery {
    pub as_of: Option<NaiveDate>,
}

pub async fn trial_balance(
    State(state): State<AppState>,
    Query(query): Query<TrialBalanceQuery>,
) -> Result<impl IntoResponse, AppError> {
    let report = reports::trial_balance(&state.db, query.as_of).await?;
    Ok(Json(report))
}

pub async fn account_ledger(
    State(state): State<AppState>,
    Path(account_id): Path<Uuid>,
    Query(query): Query<LedgerQuery>,
) -> Result<impl IntoResponse, AppError> {
    let ledger = reports::account_ledger(&state.db, account_id, query.from, query.to).await?;
    Ok(Json(ledger))
}
