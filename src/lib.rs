pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod services;
pub mod validation;

use axum::{
    Router,
    routing::{delete, get, post, put},
};
use tower_http::cors::CorsLayer;

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/accounts", get(handlers::accounts::list_accounts))
        .route("/accounts", post(handlers::accounts::create_account))
        .route("/accounts/:id", get(handlers::accounts::get_account))
        .route("/accounts/:id", delete(handlers::accounts::deactivate_account))
        .route("/invoices", post(handlers::postings::post_invoice))
        .route("/invoices/:id", put(handlers::postings::update_invoice))
        .route("/bills", post(handlers::postings::post_bill))
        .route("/bills/:id", put(handlers::postings::update_bill))
        .route("/payments", post(handlers::postings::post_payment))
        .route("/payments/:id", put(handlers::postings::update_payment))
        .route("/journal-entries", post(handlers::postings::post_journal))
        .route("/journal-entries/:id", put(handlers::postings::update_journal))
        .route("/transactions", get(handlers::transactions::list_transactions))
        .route("/transactions/:id", get(handlers::transactions::get_transaction))
        .route("/transactions/:id", delete(handlers::transactions::delete_draft))
        .route("/transactions/:id/post", post(handlers::transactions::post_draft))
        .route(
            "/transactions/:id/reverse",
            post(handlers::transactions::reverse_transaction),
        )
        .route("/reports/trial-balance", get(handlers::reports::trial_balance))
        .route(
            "/reports/accounts/:id/ledger",
            get(handlers::reports::account_ledger),
        )
        .route("/admin/recalculate-balances", post(handlers::admin::recalculate_balances))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
