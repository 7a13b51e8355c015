//! Read-only reporting views over the registry and transaction history.
//! The trial balance doubles as the system's self-audit: a debit/credit
//! mismatch there is rendered as an integrity warning, never hidden.

use std::collections::BTreeMap;

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::Serialize;
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::db::queries;
use crate::domain::account::EntryDirection;
use crate::error::AppError;

#[derive(Debug, Clone, Serialize)]
pub struct TrialBalanceRow {
    pub account_id: Uuid,
    pub name: String,
    pub account_type: String,
    pub total_debit: BigDecimal,
    pub total_credit: BigDecimal,
    pub balance: BigDecimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrialBalance {
    pub rows: Vec<TrialBalanceRow>,
    pub total_debit: BigDecimal,
    pub total_credit: BigDecimal,
    /// False when total debits and credits disagree. Should be impossible
    /// while the aggregator is correct, checked anyway.
    pub balanced: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct LedgerRow {
    pub entry_id: Uuid,
    pub transaction_id: Uuid,
    pub txn_date: NaiveDate,
    pub kind: String,
    pub description: Option<String>,
    pub direction: String,
    pub amount: BigDecimal,
    pub running_balance: BigDecimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountLedger {
    pub account_id: Uuid,
    pub account_name: String,
    pub rows: Vec<LedgerRow>,
    pub closing_balance: BigDecimal,
}

/// Every active account with its running totals, grouped by type, plus the
/// ledger-wide debit/credit totals. With `as_of` set, totals are computed
/// from entries dated on or before that day instead of the stored running
/// totals, so the report can be cut at any past date.
pub async fn trial_balance(
    pool: &PgPool,
    as_of: Option<NaiveDate>,
) -> Result<TrialBalance, AppError> {
    let accounts = queries::list_accounts(pool, false).await?;

    let as_of_totals: Option<BTreeMap<Uuid, (BigDecimal, BigDecimal)>> = match as_of {
        Some(date) => Some(
            queries::account_totals_as_of(pool, date)
                .await?
                .into_iter()
                .map(|(id, debit, credit)| (id, (debit, credit)))
                .collect(),
        ),
        None => None,
    };

    let mut total_debit = BigDecimal::from(0);
    let mut total_credit = BigDecimal::from(0);
    let mut rows: Vec<TrialBalanceRow> = Vec::with_capacity(accounts.len());
    for account in accounts {
        let (debit, credit) = match &as_of_totals {
            Some(totals) => totals
                .get(&account.id)
                .cloned()
                .unwrap_or_else(|| (BigDecimal::from(0), BigDecimal::from(0))),
            None => (account.total_debit, account.total_credit),
        };
        total_debit += &debit;
        total_credit += &credit;
        let balance = &debit - &credit;
        rows.push(TrialBalanceRow {
            account_id: account.id,
            name: account.name,
            account_type: account.account_type,
            total_debit: debit,
            total_credit: credit,
            balance,
        });
    }

    let balanced = total_debit == total_credit;
    if !balanced {
        warn!(
            %total_debit,
            %total_credit,
            "trial balance integrity check failed"
        );
    }

    Ok(TrialBalance {
        rows,
        total_debit,
        total_credit,
        balanced,
    })
}

/// Left-to-right running balance over signed (direction, amount) pairs.
/// Balance after row i is the balance after row i-1 plus the signed amount.
pub fn running_balance(rows: &[(EntryDirection, BigDecimal)]) -> Vec<BigDecimal> {
    let mut balance = BigDecimal::from(0);
    rows.iter()
        .map(|(direction, amount)| {
            match direction {
                EntryDirection::Debit => balance += amount,
                EntryDirection::Credit => balance -= amount,
            }
            balance.clone()
        })
        .collect()
}

/// All entries touching one account, in date order, with a running balance
/// column.
pub async fn account_ledger(
    pool: &PgPool,
    account_id: Uuid,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<AccountLedger, AppError> {
    let account = queries::get_account(pool, account_id)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => {
                AppError::NotFound(format!("Account {account_id} not found"))
            }
            other => AppError::Database(other),
        })?;

    let raw = queries::account_ledger_rows(pool, account_id, from, to).await?;

    let mut directions: Vec<(EntryDirection, BigDecimal)> = Vec::with_capacity(raw.len());
    for (_, _, _, _, _, direction, amount) in &raw {
        let parsed = direction
            .parse::<EntryDirection>()
            .map_err(AppError::Internal)?;
        directions.push((parsed, amount.clone()));
    }
    let balances = running_balance(&directions);

    let rows: Vec<LedgerRow> = raw
        .into_iter()
        .zip(balances)
        .map(
            |((entry_id, transaction_id, txn_date, kind, description, direction, amount), bal)| {
                LedgerRow {
                    entry_id,
                    transaction_id,
                    txn_date,
                    kind,
                    description,
                    direction,
                    amount,
                    running_balance: bal,
                }
            },
        )
        .collect();

    let closing_balance = rows
        .last()
        .map(|row| row.running_balance.clone())
        .unwrap_or_else(|| BigDecimal::from(0));

    Ok(AccountLedger {
        account_id,
        account_name: account.name,
        rows,
        closing_balance,
    })
}
