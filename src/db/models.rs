use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::BigDecimal;
use uuid::Uuid;

use crate::domain::{AccountType, EntryDirection, TransactionKind, TransactionStatus};
use crate::domain::posting::EntryLine;

/// One node in the chart of accounts. The running totals are owned by the
/// balance aggregator; every other write path leaves them untouched.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    pub account_type: String,
    pub parent_id: Option<Uuid>,
    pub is_gst: bool,
    pub is_tds: bool,
    pub is_system: bool,
    pub active: bool,
    pub total_debit: BigDecimal,
    pub total_credit: BigDecimal,
    pub balance: BigDecimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn new(name: String, account_type: AccountType) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            account_type: account_type.as_str().to_string(),
            parent_id: None,
            is_gst: false,
            is_tds: false,
            is_system: false,
            active: true,
            total_debit: BigDecimal::from(0),
            total_credit: BigDecimal::from(0),
            balance: BigDecimal::from(0),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn account_type(&self) -> Option<AccountType> {
        self.account_type.parse().ok()
    }
}

/// One posted business event together with denormalized display figures.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub kind: String,
    pub status: String,
    pub txn_date: NaiveDate,
    pub description: Option<String>,
    pub reference: Option<String>,
    pub subtotal: BigDecimal,
    pub tax_amount: BigDecimal,
    pub total_amount: BigDecimal,
    pub related_transaction_id: Option<Uuid>,
    pub reverses_transaction_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn status(&self) -> Option<TransactionStatus> {
        self.status.parse().ok()
    }

    pub fn kind(&self) -> Option<TransactionKind> {
        self.kind.parse().ok()
    }
}

/// One debit-or-credit line within a transaction. Never edited in place;
/// the full set is regenerated when the parent changes.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub account_id: Uuid,
    pub line_no: i32,
    pub direction: String,
    pub amount: BigDecimal,
    pub memo: Option<String>,
}

impl LedgerEntry {
    pub fn direction(&self) -> Result<EntryDirection, String> {
        self.direction.parse()
    }

    /// Fails on an unparseable direction rather than guessing a side; the
    /// DB CHECK makes that unreachable, but a corrupt row must not flip a
    /// balance silently.
    pub fn to_line(&self) -> Result<EntryLine, String> {
        Ok(EntryLine {
            account_id: self.account_id,
            direction: self.direction()?,
            amount: self.amount.clone(),
            memo: self.memo.clone(),
        })
    }
}

/// A transaction together with its entry list, as delivered to the balance
/// aggregator in (old, new) event pairs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionSnapshot {
    pub transaction: Transaction,
    pub entries: Vec<LedgerEntry>,
}

impl TransactionSnapshot {
    /// Entry lines that count toward account totals. Drafts contribute
    /// nothing.
    pub fn contributing_lines(&self) -> Result<Vec<EntryLine>, String> {
        match self.transaction.status() {
            Some(status) if status.contributes() => {
                self.entries.iter().map(LedgerEntry::to_line).collect()
            }
            _ => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn snapshot(status: TransactionStatus) -> TransactionSnapshot {
        let txn = Transaction {
            id: Uuid::new_v4(),
            kind: TransactionKind::Journal.as_str().to_string(),
            status: status.as_str().to_string(),
            txn_date: NaiveDate::from_ymd_opt(2026, 4, 1).unwrap(),
            description: None,
            reference: None,
            subtotal: BigDecimal::from(100),
            tax_amount: BigDecimal::from(0),
            total_amount: BigDecimal::from(100),
            related_transaction_id: None,
            reverses_transaction_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let entry = LedgerEntry {
            id: Uuid::new_v4(),
            transaction_id: txn.id,
            account_id: Uuid::new_v4(),
            line_no: 1,
            direction: "debit".to_string(),
            amount: BigDecimal::from_str("100").unwrap(),
            memo: None,
        };
        TransactionSnapshot {
            transaction: txn,
            entries: vec![entry],
        }
    }

    #[test]
    fn posted_snapshot_contributes_lines() {
        let snap = snapshot(TransactionStatus::Posted);
        assert_eq!(snap.contributing_lines().unwrap().len(), 1);
    }

    #[test]
    fn draft_snapshot_contributes_nothing() {
        let snap = snapshot(TransactionStatus::Draft);
        assert!(snap.contributing_lines().unwrap().is_empty());
    }

    #[test]
    fn entry_round_trips_direction() {
        let snap = snapshot(TransactionStatus::Posted);
        assert_eq!(snap.entries[0].direction(), Ok(EntryDirection::Debit));
    }

    #[test]
    fn unknown_direction_is_an_error_not_a_default() {
        let mut snap = snapshot(TransactionStatus::Posted);
        snap.entries[0].direction = "sideways".to_string();
        assert!(snap.entries[0].to_line().is_err());
        assert!(snap.contributing_lines().is_err());
    }
}
