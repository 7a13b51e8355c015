//! Balance aggregation: keeps every account's running debit/credit/balance
//! totals equal to the sum of contributing entries referencing it.
//!
//! The aggregator is driven by explicit transaction events carrying the old
//! and new snapshots, so the delta math is testable without a database. All
//! account updates for one event are applied in a single SQL transaction,
//! with deltas ordered by account id so concurrent events take row locks in
//! the same order.

use std::collections::BTreeMap;

use bigdecimal::BigDecimal;
use serde::Serialize;
use sqlx::PgPool;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::db::models::TransactionSnapshot;
use crate::db::queries;
use crate::domain::account::EntryDirection;
use crate::domain::posting::EntryLine;
use crate::error::AppError;

const MAX_APPLY_ATTEMPTS: u32 = 3;

/// Transaction write event: (old, new) snapshot pair. Create has no old,
/// delete has no new, update has both.
#[derive(Debug, Clone)]
pub struct TransactionEvent {
    pub old: Option<TransactionSnapshot>,
    pub new: Option<TransactionSnapshot>,
}

impl TransactionEvent {
    pub fn created(new: TransactionSnapshot) -> Self {
        Self {
            old: None,
            new: Some(new),
        }
    }

    pub fn updated(old: TransactionSnapshot, new: TransactionSnapshot) -> Self {
        Self {
            old: Some(old),
            new: Some(new),
        }
    }

    pub fn deleted(old: TransactionSnapshot) -> Self {
        Self {
            old: Some(old),
            new: None,
        }
    }
}

/// Net change to one account's running totals.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountDelta {
    pub account_id: Uuid,
    pub debit_delta: BigDecimal,
    pub credit_delta: BigDecimal,
}

/// Old entries are reversed, new entries reapplied, and the per-account net
/// computed. Zero-net accounts are dropped. Output is ordered by account id.
pub fn account_deltas(old: &[EntryLine], new: &[EntryLine]) -> Vec<AccountDelta> {
    let mut totals: BTreeMap<Uuid, (BigDecimal, BigDecimal)> = BTreeMap::new();

    for line in old {
        let slot = totals
            .entry(line.account_id)
            .or_insert_with(|| (BigDecimal::from(0), BigDecimal::from(0)));
        match line.direction {
            EntryDirection::Debit => slot.0 -= &line.amount,
            EntryDirection::Credit => slot.1 -= &line.amount,
        }
    }
    for line in new {
        let slot = totals
            .entry(line.account_id)
            .or_insert_with(|| (BigDecimal::from(0), BigDecimal::from(0)));
        match line.direction {
            EntryDirection::Debit => slot.0 += &line.amount,
            EntryDirection::Credit => slot.1 += &line.amount,
        }
    }

    let zero = BigDecimal::from(0);
    totals
        .into_iter()
        .filter(|(_, (debit, credit))| debit != &zero || credit != &zero)
        .map(|(account_id, (debit_delta, credit_delta))| AccountDelta {
            account_id,
            debit_delta,
            credit_delta,
        })
        .collect()
}

/// One account changed by a full rebuild.
#[derive(Debug, Clone, Serialize)]
pub struct RebuiltAccount {
    pub account_id: Uuid,
    pub name: String,
    pub old_balance: BigDecimal,
    pub new_balance: BigDecimal,
}

/// Outcome of `recalculate_all`.
#[derive(Debug, Clone, Serialize)]
pub struct RecalculationReport {
    pub accounts_scanned: usize,
    pub accounts_changed: Vec<RebuiltAccount>,
}

#[derive(Clone)]
pub struct BalanceAggregator {
    pool: PgPool,
}

impl BalanceAggregator {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// React to one transaction write. Applies the account deltas as a
    /// single atomic batch, retrying a bounded number of times on conflict.
    /// A failure after retries is logged for operator reconciliation via
    /// `recalculate_all`; the registry is never left partially applied.
    pub async fn handle_event(&self, event: &TransactionEvent) -> Result<(), AppError> {
        let old_lines: Vec<EntryLine> = match event.old.as_ref() {
            Some(snapshot) => snapshot.contributing_lines().map_err(AppError::Internal)?,
            None => Vec::new(),
        };
        let new_lines: Vec<EntryLine> = match event.new.as_ref() {
            Some(snapshot) => snapshot.contributing_lines().map_err(AppError::Internal)?,
            None => Vec::new(),
        };

        let deltas = account_deltas(&old_lines, &new_lines);
        if deltas.is_empty() {
            return Ok(());
        }

        let txn_id = event
            .new
            .as_ref()
            .or(event.old.as_ref())
            .map(|snap| snap.transaction.id);

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.apply_deltas(&deltas).await {
                Ok(()) => {
                    info!(
                        transaction_id = ?txn_id,
                        accounts = deltas.len(),
                        "applied balance deltas"
                    );
                    return Ok(());
                }
                Err(err) if attempt < MAX_APPLY_ATTEMPTS && is_retryable(&err) => {
                    warn!(
                        transaction_id = ?txn_id,
                        attempt,
                        "balance delta apply conflicted, retrying: {err}"
                    );
                }
                Err(err) => {
                    error!(
                        transaction_id = ?txn_id,
                        "balance delta apply failed, run a full recalculation: {err}"
                    );
                    return Err(AppError::Database(err));
                }
            }
        }
    }

    async fn apply_deltas(&self, deltas: &[AccountDelta]) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for delta in deltas {
            queries::apply_account_delta(
                &mut tx,
                delta.account_id,
                &delta.debit_delta,
                &delta.credit_delta,
            )
            .await?;
        }
        tx.commit().await
    }

    /// Manual reconciliation tool: ignore incremental state and rebuild
    /// every account's totals from the entries table. Idempotent; running
    /// it twice reports no further changes.
    pub async fn recalculate_all(&self) -> Result<RecalculationReport, AppError> {
        let mut tx = self.pool.begin().await?;

        let current = queries::lock_account_totals(&mut tx).await?;
        let rebuilt = queries::rebuild_account_totals(&mut tx).await?;
        let rebuilt_by_id: BTreeMap<Uuid, (BigDecimal, BigDecimal)> = rebuilt
            .into_iter()
            .map(|(id, debit, credit)| (id, (debit, credit)))
            .collect();

        let mut changed = Vec::new();
        for (id, name, stored_debit, stored_credit) in &current {
            let Some((debit, credit)) = rebuilt_by_id.get(id) else {
                continue;
            };
            if debit == stored_debit && credit == stored_credit {
                continue;
            }
            queries::set_account_totals(&mut tx, *id, debit, credit).await?;
            changed.push(RebuiltAccount {
                account_id: *id,
                name: name.clone(),
                old_balance: stored_debit - stored_credit,
                new_balance: debit - credit,
            });
        }

        tx.commit().await?;

        info!(
            accounts_scanned = current.len(),
            accounts_changed = changed.len(),
            "full balance recalculation complete"
        );

        Ok(RecalculationReport {
            accounts_scanned: current.len(),
            accounts_changed: changed,
        })
    }
}

/// Serialization failures and deadlocks are worth retrying; anything else
/// is escalated.
fn is_retryable(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            matches!(db_err.code().as_deref(), Some("40001") | Some("40P01"))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn debit(account: Uuid, amount: &str) -> EntryLine {
        EntryLine::debit(account, dec(amount))
    }

    fn credit(account: Uuid, amount: &str) -> EntryLine {
        EntryLine::credit(account, dec(amount))
    }

    #[test]
    fn create_event_adds_each_entry() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let new = vec![debit(a, "118.00"), credit(b, "118.00")];

        let deltas = account_deltas(&[], &new);
        assert_eq!(deltas.len(), 2);

        let for_a = deltas.iter().find(|d| d.account_id == a).unwrap();
        assert_eq!(for_a.debit_delta, dec("118.00"));
        assert_eq!(for_a.credit_delta, dec("0"));

        let for_b = deltas.iter().find(|d| d.account_id == b).unwrap();
        assert_eq!(for_b.credit_delta, dec("118.00"));
    }

    #[test]
    fn delete_event_is_exact_negation_of_create() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let lines = vec![debit(a, "500"), credit(b, "500")];

        let created = account_deltas(&[], &lines);
        let deleted = account_deltas(&lines, &[]);

        assert_eq!(created.len(), deleted.len());
        for (c, d) in created.iter().zip(&deleted) {
            assert_eq!(c.account_id, d.account_id);
            assert_eq!(&c.debit_delta + &d.debit_delta, dec("0"));
            assert_eq!(&c.credit_delta + &d.credit_delta, dec("0"));
        }
    }

    #[test]
    fn update_applies_only_the_net_difference() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let old = vec![debit(a, "100"), credit(b, "100")];
        let new = vec![debit(a, "150"), credit(b, "150")];

        let deltas = account_deltas(&old, &new);
        assert_eq!(deltas.len(), 2);
        let for_a = deltas.iter().find(|d| d.account_id == a).unwrap();
        assert_eq!(for_a.debit_delta, dec("50"));
        let for_b = deltas.iter().find(|d| d.account_id == b).unwrap();
        assert_eq!(for_b.credit_delta, dec("50"));
    }

    #[test]
    fn identical_old_and_new_produce_no_deltas() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let lines = vec![debit(a, "100"), credit(b, "100")];
        assert!(account_deltas(&lines, &lines).is_empty());
    }

    #[test]
    fn deltas_come_out_ordered_by_account_id() {
        let mut ids: Vec<Uuid> = (0..6).map(|_| Uuid::new_v4()).collect();
        let lines: Vec<EntryLine> = ids.iter().map(|id| debit(*id, "10")).collect();

        let deltas = account_deltas(&[], &lines);
        ids.sort();
        let delta_ids: Vec<Uuid> = deltas.iter().map(|d| d.account_id).collect();
        assert_eq!(delta_ids, ids);
    }

    /// Incremental deltas applied over a sequence of events must net out to
    /// the same totals a from-scratch rebuild over the final state gives.
    #[test]
    fn incremental_deltas_match_full_recomputation() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();

        let v1 = vec![debit(a, "118"), credit(b, "100"), credit(c, "18")];
        let v2 = vec![debit(a, "236"), credit(b, "200"), credit(c, "36")];

        // create v1, update v1 -> v2, then delete.
        let mut totals: BTreeMap<Uuid, (BigDecimal, BigDecimal)> = BTreeMap::new();
        for deltas in [
            account_deltas(&[], &v1),
            account_deltas(&v1, &v2),
            account_deltas(&v2, &[]),
        ] {
            for delta in deltas {
                let slot = totals
                    .entry(delta.account_id)
                    .or_insert_with(|| (BigDecimal::from(0), BigDecimal::from(0)));
                slot.0 += delta.debit_delta;
                slot.1 += delta.credit_delta;
            }
        }

        // Final state has no transactions, so every account nets to zero.
        for (debit_total, credit_total) in totals.values() {
            assert_eq!(debit_total, &dec("0"));
            assert_eq!(credit_total, &dec("0"));
        }
    }

    #[test]
    fn retryable_error_classification() {
        assert!(!is_retryable(&sqlx::Error::RowNotFound));
    }
}
