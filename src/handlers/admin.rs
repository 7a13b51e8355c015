use axum::{Json, extract::State, response::IntoResponse};

use crate::AppState;
use crate::error::AppError;
use crate::services::aggregator::BalanceAggregator;

/// Manual reconciliation endpoint: rebuilds every account's totals from
/// the transaction log and reports what changed. Idempotent.
pub async fn recalculate_balances(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let report = BalanceAggregator::new(state.db.clone())
        .recalculate_all()
        .await?;
    Ok(Json(report))
}
