use sqlx::{PgPool, Result, Postgres, Transaction as SqlxTransaction};
use sqlx::types::BigDecimal;
use uuid::Uuid;

use crate::db::models::{Account, LedgerEntry, Transaction, TransactionSnapshot};
use crate::domain::posting::EntryLine;

// --- Account Queries ---

pub async fn insert_account(pool: &PgPool, account: &Account) -> Result<Account> {
    sqlx::query_as::<_, Account>(
        r#"
        INSERT INTO accounts (
            id, name, account_type, parent_id, is_gst, is_tds, is_system, active,
            total_debit, total_credit, balance, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        RETURNING *
        "#,
    )
    .bind(account.id)
    .bind(&account.name)
    .bind(&account.account_type)
    .bind(account.parent_id)
    .bind(account.is_gst)
    .bind(account.is_tds)
    .bind(account.is_system)
    .bind(account.active)
    .bind(&account.total_debit)
    .bind(&account.total_credit)
    .bind(&account.balance)
    .bind(account.created_at)
    .bind(account.updated_at)
    .fetch_one(pool)
    .await
}

pub async fn get_account(pool: &PgPool, id: Uuid) -> Result<Account> {
    sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
}

pub async fn list_accounts(pool: &PgPool, include_inactive: bool) -> Result<Vec<Account>> {
    sqlx::query_as::<_, Account>(
        "SELECT * FROM accounts WHERE active OR $1 ORDER BY account_type, name",
    )
    .bind(include_inactive)
    .fetch_all(pool)
    .await
}

pub async fn find_account_by_name(pool: &PgPool, name: &str) -> Result<Option<Account>> {
    sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE name = $1 AND active")
        .bind(name)
        .fetch_optional(pool)
        .await
}

pub async fn find_accounts_by_type(pool: &PgPool, account_type: &str) -> Result<Vec<Account>> {
    sqlx::query_as::<_, Account>(
        "SELECT * FROM accounts WHERE account_type = $1 AND active ORDER BY name",
    )
    .bind(account_type)
    .fetch_all(pool)
    .await
}

pub async fn find_gst_accounts(pool: &PgPool) -> Result<Vec<Account>> {
    sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE is_gst AND active ORDER BY name")
        .fetch_all(pool)
        .await
}

pub async fn find_tds_accounts(pool: &PgPool) -> Result<Vec<Account>> {
    sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE is_tds AND active ORDER BY name")
        .fetch_all(pool)
        .await
}

pub async fn account_has_entries(pool: &PgPool, id: Uuid) -> Result<bool> {
    let row: (bool,) =
        sqlx::query_as("SELECT EXISTS(SELECT 1 FROM ledger_entries WHERE account_id = $1)")
            .bind(id)
            .fetch_one(pool)
            .await?;
    Ok(row.0)
}

/// Soft deactivation only; accounts referenced by entries are never removed.
pub async fn deactivate_account(pool: &PgPool, id: Uuid) -> Result<Option<Account>> {
    sqlx::query_as::<_, Account>(
        "UPDATE accounts SET active = FALSE, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

// --- Transaction Queries ---

pub async fn insert_transaction_with_entries(
    executor: &mut SqlxTransaction<'_, Postgres>,
    txn: &Transaction,
    lines: &[EntryLine],
) -> Result<TransactionSnapshot> {
    let saved = sqlx::query_as::<_, Transaction>(
        r#"
        INSERT INTO transactions (
            id, kind, status, txn_date, description, reference,
            subtotal, tax_amount, total_amount,
            related_transaction_id, reverses_transaction_id, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        RETURNING *
        "#,
    )
    .bind(txn.id)
    .bind(&txn.kind)
    .bind(&txn.status)
    .bind(txn.txn_date)
    .bind(&txn.description)
    .bind(&txn.reference)
    .bind(&txn.subtotal)
    .bind(&txn.tax_amount)
    .bind(&txn.total_amount)
    .bind(txn.related_transaction_id)
    .bind(txn.reverses_transaction_id)
    .bind(txn.created_at)
    .bind(txn.updated_at)
    .fetch_one(&mut **executor)
    .await?;

    let entries = insert_entries(executor, saved.id, lines).await?;

    Ok(TransactionSnapshot {
        transaction: saved,
        entries,
    })
}

async fn insert_entries(
    executor: &mut SqlxTransaction<'_, Postgres>,
    transaction_id: Uuid,
    lines: &[EntryLine],
) -> Result<Vec<LedgerEntry>> {
    let mut entries = Vec::with_capacity(lines.len());
    for (index, line) in lines.iter().enumerate() {
        let entry = sqlx::query_as::<_, LedgerEntry>(
            r#"
            INSERT INTO ledger_entries (id, transaction_id, account_id, line_no, direction, amount, memo)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(transaction_id)
        .bind(line.account_id)
        .bind(index as i32 + 1)
        .bind(line.direction.as_str())
        .bind(&line.amount)
        .bind(&line.memo)
        .fetch_one(&mut **executor)
        .await?;
        entries.push(entry);
    }
    Ok(entries)
}

/// Replace the entry set and rewrite the denormalized figures. Entries are
/// always regenerated as a whole, never patched line by line.
pub async fn update_transaction_with_entries(
    executor: &mut SqlxTransaction<'_, Postgres>,
    txn: &Transaction,
    lines: &[EntryLine],
) -> Result<TransactionSnapshot> {
    let saved = sqlx::query_as::<_, Transaction>(
        r#"
        UPDATE transactions
        SET kind = $2, status = $3, txn_date = $4, description = $5, reference = $6,
            subtotal = $7, tax_amount = $8, total_amount = $9,
            related_transaction_id = $10, updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(txn.id)
    .bind(&txn.kind)
    .bind(&txn.status)
    .bind(txn.txn_date)
    .bind(&txn.description)
    .bind(&txn.reference)
    .bind(&txn.subtotal)
    .bind(&txn.tax_amount)
    .bind(&txn.total_amount)
    .bind(txn.related_transaction_id)
    .fetch_one(&mut **executor)
    .await?;

    sqlx::query("DELETE FROM ledger_entries WHERE transaction_id = $1")
        .bind(txn.id)
        .execute(&mut **executor)
        .await?;

    let entries = insert_entries(executor, saved.id, lines).await?;

    Ok(TransactionSnapshot {
        transaction: saved,
        entries,
    })
}

pub async fn set_transaction_status(
    executor: &mut SqlxTransaction<'_, Postgres>,
    id: Uuid,
    status: &str,
) -> Result<Transaction> {
    sqlx::query_as::<_, Transaction>(
        "UPDATE transactions SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(status)
    .fetch_one(&mut **executor)
    .await
}

pub async fn delete_transaction(
    executor: &mut SqlxTransaction<'_, Postgres>,
    id: Uuid,
) -> Result<()> {
    sqlx::query("DELETE FROM transactions WHERE id = $1")
        .bind(id)
        .execute(&mut **executor)
        .await?;
    Ok(())
}

pub async fn get_transaction(pool: &PgPool, id: Uuid) -> Result<Transaction> {
    sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
}

pub async fn get_transaction_entries(pool: &PgPool, id: Uuid) -> Result<Vec<LedgerEntry>> {
    sqlx::query_as::<_, LedgerEntry>(
        "SELECT * FROM ledger_entries WHERE transaction_id = $1 ORDER BY line_no",
    )
    .bind(id)
    .fetch_all(pool)
    .await
}

pub async fn get_snapshot(pool: &PgPool, id: Uuid) -> Result<TransactionSnapshot> {
    let transaction = get_transaction(pool, id).await?;
    let entries = get_transaction_entries(pool, id).await?;
    Ok(TransactionSnapshot {
        transaction,
        entries,
    })
}

pub async fn list_transactions(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<Transaction>> {
    sqlx::query_as::<_, Transaction>(
        "SELECT * FROM transactions ORDER BY txn_date DESC, created_at DESC LIMIT $1 OFFSET $2",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

// --- Aggregation Queries ---

/// Atomic read-modify-write of one account's running totals. A single
/// UPDATE so concurrent aggregator batches never lose each other's deltas.
pub async fn apply_account_delta(
    executor: &mut SqlxTransaction<'_, Postgres>,
    account_id: Uuid,
    debit_delta: &BigDecimal,
    credit_delta: &BigDecimal,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE accounts
        SET total_debit = total_debit + $2,
            total_credit = total_credit + $3,
            balance = (total_debit + $2) - (total_credit + $3),
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(account_id)
    .bind(debit_delta)
    .bind(credit_delta)
    .execute(&mut **executor)
    .await?;
    Ok(())
}

/// Totals rebuilt from scratch over every contributing entry, keyed by
/// account. Accounts with no entries come back as zeros.
pub async fn rebuild_account_totals(
    executor: &mut SqlxTransaction<'_, Postgres>,
) -> Result<Vec<(Uuid, BigDecimal, BigDecimal)>> {
    sqlx::query_as::<_, (Uuid, BigDecimal, BigDecimal)>(
        r#"
        SELECT a.id,
               COALESCE(SUM(CASE WHEN e.direction = 'debit' THEN e.amount END), 0) AS total_debit,
               COALESCE(SUM(CASE WHEN e.direction = 'credit' THEN e.amount END), 0) AS total_credit
        FROM accounts a
        LEFT JOIN (
            ledger_entries e
            JOIN transactions t ON t.id = e.transaction_id AND t.status <> 'draft'
        ) ON e.account_id = a.id
        GROUP BY a.id
        ORDER BY a.id
        "#,
    )
    .fetch_all(&mut **executor)
    .await
}

/// Current stored totals, locked for the duration of a rebuild.
pub async fn lock_account_totals(
    executor: &mut SqlxTransaction<'_, Postgres>,
) -> Result<Vec<(Uuid, String, BigDecimal, BigDecimal)>> {
    sqlx::query_as::<_, (Uuid, String, BigDecimal, BigDecimal)>(
        "SELECT id, name, total_debit, total_credit FROM accounts ORDER BY id FOR UPDATE",
    )
    .fetch_all(&mut **executor)
    .await
}

pub async fn set_account_totals(
    executor: &mut SqlxTransaction<'_, Postgres>,
    account_id: Uuid,
    total_debit: &BigDecimal,
    total_credit: &BigDecimal,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE accounts
        SET total_debit = $2,
            total_credit = $3,
            balance = $2 - $3,
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(account_id)
    .bind(total_debit)
    .bind(total_credit)
    .execute(&mut **executor)
    .await?;
    Ok(())
}

// --- Reporting Queries ---

/// Per-account totals over contributing entries dated on or before
/// `as_of`. Accounts with no matching entries come back as zeros.
pub async fn account_totals_as_of(
    pool: &PgPool,
    as_of: chrono::NaiveDate,
) -> Result<Vec<(Uuid, BigDecimal, BigDecimal)>> {
    sqlx::query_as::<_, (Uuid, BigDecimal, BigDecimal)>(
        r#"
        SELECT a.id,
               COALESCE(SUM(CASE WHEN e.direction = 'debit' THEN e.amount END), 0) AS total_debit,
               COALESCE(SUM(CASE WHEN e.direction = 'credit' THEN e.amount END), 0) AS total_credit
        FROM accounts a
        LEFT JOIN (
            ledger_entries e
            JOIN transactions t
              ON t.id = e.transaction_id AND t.status <> 'draft' AND t.txn_date <= $1
        ) ON e.account_id = a.id
        GROUP BY a.id
        ORDER BY a.id
        "#,
    )
    .bind(as_of)
    .fetch_all(pool)
    .await
}

/// Entries for one account across all non-draft transactions, in date
/// order, joined with the owning transaction for display.
pub async fn account_ledger_rows(
    pool: &PgPool,
    account_id: Uuid,
    from: Option<chrono::NaiveDate>,
    to: Option<chrono::NaiveDate>,
) -> Result<Vec<(Uuid, Uuid, chrono::NaiveDate, String, Option<String>, String, BigDecimal)>> {
    sqlx::query_as::<_, (Uuid, Uuid, chrono::NaiveDate, String, Option<String>, String, BigDecimal)>(
        r#"
        SELECT e.id, t.id, t.txn_date, t.kind, t.description, e.direction, e.amount
        FROM ledger_entries e
        JOIN transactions t ON t.id = e.transaction_id
        WHERE e.account_id = $1
          AND t.status <> 'draft'
          AND ($2::date IS NULL OR t.txn_date >= $2)
          AND ($3::date IS NULL OR t.txn_date <= $3)
        ORDER BY t.txn_date, t.created_at, e.line_no
        "#,
    )
    .bind(account_id)
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await
}
