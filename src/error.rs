use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bigdecimal::BigDecimal;
use serde_json::json;
use thiserror::Error;

use crate::validation::ValidationError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Missing system accounts: {}", .0.join(", "))]
    MissingAccounts(Vec<String>),

    #[error("Entries do not balance: debits {total_debit}, credits {total_credit}")]
    Unbalanced {
        total_debit: BigDecimal,
        total_credit: BigDecimal,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::MissingAccounts(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Unbalanced { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Structured detail so clients can show the specific missing roles
    /// or the imbalance, not a generic failure.
    fn details(&self) -> serde_json::Value {
        match self {
            AppError::MissingAccounts(roles) => json!({ "missing_roles": roles }),
            AppError::Unbalanced {
                total_debit,
                total_credit,
            } => json!({
                "total_debit": total_debit.to_string(),
                "total_credit": total_credit.to_string(),
                "difference": (total_debit - total_credit).to_string(),
            }),
            _ => serde_json::Value::Null,
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
            "details": self.details(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_missing_accounts_status_code() {
        let error = AppError::MissingAccounts(vec!["Accounts Receivable".to_string()]);
        assert_eq!(error.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(error.to_string().contains("Accounts Receivable"));
    }

    #[test]
    fn test_unbalanced_status_code_and_details() {
        let error = AppError::Unbalanced {
            total_debit: BigDecimal::from_str("100.00").unwrap(),
            total_credit: BigDecimal::from_str("90.00").unwrap(),
        };
        assert_eq!(error.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(error.details()["difference"], "10.00");
    }

    #[test]
    fn test_validation_error_status_code() {
        let error = AppError::Validation("Invalid input".to_string());
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_not_found_error_status_code() {
        let error = AppError::NotFound("Account not found".to_string());
        assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_conflict_error_status_code() {
        let error = AppError::Conflict("Transaction already reversed".to_string());
        assert_eq!(error.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_database_error_status_code() {
        let error = AppError::Database(sqlx::Error::RowNotFound);
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_missing_accounts_response() {
        let error = AppError::MissingAccounts(vec!["TDS Payable".to_string()]);
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_not_found_error_response() {
        let error = AppError::NotFound("Transaction not found".to_string());
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
