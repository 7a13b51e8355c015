//! Posting workflow: resolve system accounts, gate on missing roles,
//! generate entries, validate balance, persist atomically, then hand the
//! write event to the balance aggregator. The save is blocked at the first
//! failed step; a transaction row is never written without its entries.

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, Utc};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::db::models::{Transaction, TransactionSnapshot};
use crate::db::queries;
use crate::domain::posting::{
    bill_entries, inverted_entries, invoice_entries, journal_entries, payment_entries, EntryLine,
    TaxBreakdown,
};
use crate::domain::{validate_balance, TransactionKind, TransactionStatus};
use crate::error::AppError;
use crate::services::accounts::{PostingNeeds, SystemAccountResolver, SystemAccounts};
use crate::services::aggregator::{BalanceAggregator, TransactionEvent};

/// Common fields every posting carries.
#[derive(Debug, Clone)]
pub struct PostingHeader {
    pub txn_date: NaiveDate,
    pub description: Option<String>,
    pub reference: Option<String>,
    pub status: TransactionStatus,
}

#[derive(Debug, Clone)]
pub struct InvoiceInput {
    pub header: PostingHeader,
    pub subtotal: BigDecimal,
    pub tax: TaxBreakdown,
}

#[derive(Debug, Clone)]
pub struct BillInput {
    pub header: PostingHeader,
    pub subtotal: BigDecimal,
    pub tax: TaxBreakdown,
    pub tds_amount: Option<BigDecimal>,
}

#[derive(Debug, Clone)]
pub struct PaymentInput {
    pub header: PostingHeader,
    pub amount: BigDecimal,
    pub incoming: bool,
    pub related_transaction_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct JournalInput {
    pub header: PostingHeader,
    pub lines: Vec<EntryLine>,
}

#[derive(Debug, Clone)]
pub enum PostingInput {
    CustomerInvoice(InvoiceInput),
    VendorBill(BillInput),
    Payment(PaymentInput),
    Journal(JournalInput),
}

impl PostingInput {
    fn header(&self) -> &PostingHeader {
        match self {
            PostingInput::CustomerInvoice(input) => &input.header,
            PostingInput::VendorBill(input) => &input.header,
            PostingInput::Payment(input) => &input.header,
            PostingInput::Journal(input) => &input.header,
        }
    }

    fn kind(&self) -> TransactionKind {
        match self {
            PostingInput::CustomerInvoice(_) => TransactionKind::CustomerInvoice,
            PostingInput::VendorBill(_) => TransactionKind::VendorBill,
            PostingInput::Payment(input) => {
                if input.incoming {
                    TransactionKind::CustomerPayment
                } else {
                    TransactionKind::VendorPayment
                }
            }
            PostingInput::Journal(_) => TransactionKind::Journal,
        }
    }

    fn needs(&self) -> PostingNeeds {
        match self {
            PostingInput::CustomerInvoice(input) => {
                PostingNeeds::for_request(self.kind(), &input.tax, false)
            }
            PostingInput::VendorBill(input) => PostingNeeds::for_request(
                self.kind(),
                &input.tax,
                input.tds_amount.as_ref().is_some_and(|t| t > &BigDecimal::from(0)),
            ),
            PostingInput::Payment(_) | PostingInput::Journal(_) => {
                PostingNeeds::untaxed(self.kind())
            }
        }
    }

    /// Denormalized display figures: (subtotal, tax, total).
    fn figures(&self) -> (BigDecimal, BigDecimal, BigDecimal) {
        match self {
            PostingInput::CustomerInvoice(input) => {
                let tax = input.tax.total();
                let total = &input.subtotal + &tax;
                (input.subtotal.clone(), tax, total)
            }
            PostingInput::VendorBill(input) => {
                let tax = input.tax.total();
                let total = &input.subtotal + &tax;
                (input.subtotal.clone(), tax, total)
            }
            PostingInput::Payment(input) => (
                input.amount.clone(),
                BigDecimal::from(0),
                input.amount.clone(),
            ),
            PostingInput::Journal(input) => {
                let total: BigDecimal = input
                    .lines
                    .iter()
                    .filter(|line| line.direction == crate::domain::EntryDirection::Debit)
                    .map(|line| line.amount.clone())
                    .fold(BigDecimal::from(0), |acc, x| acc + x);
                (total.clone(), BigDecimal::from(0), total)
            }
        }
    }

    fn related_transaction_id(&self) -> Option<Uuid> {
        match self {
            PostingInput::Payment(input) => input.related_transaction_id,
            _ => None,
        }
    }

    fn generate(&self, resolved: &SystemAccounts) -> Result<Vec<EntryLine>, AppError> {
        match self {
            PostingInput::CustomerInvoice(input) => {
                let accounts = resolved
                    .invoice_accounts()
                    .ok_or_else(|| AppError::MissingAccounts(resolved.missing_for(&self.needs())))?;
                Ok(invoice_entries(&input.subtotal, &input.tax, &accounts))
            }
            PostingInput::VendorBill(input) => {
                let accounts = resolved
                    .bill_accounts()
                    .ok_or_else(|| AppError::MissingAccounts(resolved.missing_for(&self.needs())))?;
                Ok(bill_entries(
                    &input.subtotal,
                    &input.tax,
                    input.tds_amount.as_ref(),
                    &accounts,
                ))
            }
            PostingInput::Payment(input) => {
                let accounts = resolved
                    .payment_accounts(input.incoming)
                    .ok_or_else(|| AppError::MissingAccounts(resolved.missing_for(&self.needs())))?;
                Ok(payment_entries(&input.amount, input.incoming, &accounts))
            }
            PostingInput::Journal(input) => Ok(journal_entries(&input.lines)),
        }
    }
}

pub struct PostingService {
    pool: PgPool,
    resolver: SystemAccountResolver,
    aggregator: BalanceAggregator,
}

impl PostingService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            resolver: SystemAccountResolver::new(pool.clone()),
            aggregator: BalanceAggregator::new(pool.clone()),
            pool,
        }
    }

    /// Create a transaction from a posting input. Resolve, gate, generate,
    /// validate, persist, aggregate, in that order.
    pub async fn post(&self, input: PostingInput) -> Result<TransactionSnapshot, AppError> {
        let lines = self.prepare(&input).await?;
        let txn = new_transaction_row(&input);

        let mut tx = self.pool.begin().await?;
        let snapshot = queries::insert_transaction_with_entries(&mut tx, &txn, &lines).await?;
        tx.commit().await?;

        info!(
            transaction_id = %snapshot.transaction.id,
            kind = %snapshot.transaction.kind,
            status = %snapshot.transaction.status,
            "transaction posted"
        );

        self.aggregator
            .handle_event(&TransactionEvent::created(snapshot.clone()))
            .await?;

        Ok(snapshot)
    }

    /// Regenerate a transaction from new figures. Entries are replaced as a
    /// full set and the aggregator sees the old-vs-new pair.
    pub async fn update(
        &self,
        id: Uuid,
        input: PostingInput,
    ) -> Result<TransactionSnapshot, AppError> {
        let old = queries::get_snapshot(&self.pool, id)
            .await
            .map_err(not_found(id))?;

        match old.transaction.status() {
            Some(TransactionStatus::Reversed) => {
                return Err(AppError::Conflict(format!(
                    "Transaction {id} is reversed and cannot be edited"
                )));
            }
            Some(_) => {}
            None => {
                return Err(AppError::Internal(format!(
                    "Transaction {id} has an unknown status"
                )));
            }
        }

        let lines = self.prepare(&input).await?;
        let (subtotal, tax_amount, total_amount) = input.figures();
        let header = input.header();

        let updated = Transaction {
            kind: input.kind().as_str().to_string(),
            status: header.status.as_str().to_string(),
            txn_date: header.txn_date,
            description: header.description.clone(),
            reference: header.reference.clone(),
            subtotal,
            tax_amount,
            total_amount,
            related_transaction_id: input.related_transaction_id(),
            updated_at: Utc::now(),
            ..old.transaction.clone()
        };

        let mut tx = self.pool.begin().await?;
        let snapshot = queries::update_transaction_with_entries(&mut tx, &updated, &lines).await?;
        tx.commit().await?;

        info!(transaction_id = %id, "transaction updated");

        self.aggregator
            .handle_event(&TransactionEvent::updated(old, snapshot.clone()))
            .await?;

        Ok(snapshot)
    }

    /// Transition a draft to posted. The entries were validated at draft
    /// time; the status flip is what makes them contribute.
    pub async fn post_draft(&self, id: Uuid) -> Result<TransactionSnapshot, AppError> {
        let old = queries::get_snapshot(&self.pool, id)
            .await
            .map_err(not_found(id))?;

        if old.transaction.status() != Some(TransactionStatus::Draft) {
            return Err(AppError::Conflict(format!(
                "Transaction {id} is not a draft"
            )));
        }

        let mut tx = self.pool.begin().await?;
        let transaction =
            queries::set_transaction_status(&mut tx, id, TransactionStatus::Posted.as_str())
                .await?;
        tx.commit().await?;

        let snapshot = TransactionSnapshot {
            transaction,
            entries: old.entries.clone(),
        };

        info!(transaction_id = %id, "draft posted");

        self.aggregator
            .handle_event(&TransactionEvent::updated(old, snapshot.clone()))
            .await?;

        Ok(snapshot)
    }

    /// Reverse a posted transaction with a compensating transaction whose
    /// entries are sign-inverted. The original is marked reversed but its
    /// history stays intact.
    pub async fn reverse(&self, id: Uuid) -> Result<TransactionSnapshot, AppError> {
        let original = queries::get_snapshot(&self.pool, id)
            .await
            .map_err(not_found(id))?;

        if original.transaction.status() != Some(TransactionStatus::Posted) {
            return Err(AppError::Conflict(format!(
                "Only posted transactions can be reversed; {id} is {}",
                original.transaction.status
            )));
        }

        let lines: Vec<EntryLine> = original
            .entries
            .iter()
            .map(|entry| entry.to_line())
            .collect::<Result<_, _>>()
            .map_err(AppError::Internal)?;
        let reversal_lines = inverted_entries(&lines);

        let now = Utc::now();
        let reversal = Transaction {
            id: Uuid::new_v4(),
            kind: original.transaction.kind.clone(),
            status: TransactionStatus::Posted.as_str().to_string(),
            txn_date: now.date_naive(),
            description: Some(format!("Reversal of {}", id)),
            reference: original.transaction.reference.clone(),
            subtotal: original.transaction.subtotal.clone(),
            tax_amount: original.transaction.tax_amount.clone(),
            total_amount: original.transaction.total_amount.clone(),
            related_transaction_id: None,
            reverses_transaction_id: Some(id),
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.pool.begin().await?;
        let snapshot =
            queries::insert_transaction_with_entries(&mut tx, &reversal, &reversal_lines).await?;
        queries::set_transaction_status(&mut tx, id, TransactionStatus::Reversed.as_str()).await?;
        tx.commit().await?;

        info!(
            transaction_id = %id,
            reversal_id = %snapshot.transaction.id,
            "transaction reversed"
        );

        // The original keeps contributing in status 'reversed'; only the
        // compensating transaction changes account totals.
        self.aggregator
            .handle_event(&TransactionEvent::created(snapshot.clone()))
            .await?;

        Ok(snapshot)
    }

    /// Hard delete, drafts only. Posted transactions go through `reverse`
    /// so the audit trail survives.
    pub async fn delete_draft(&self, id: Uuid) -> Result<(), AppError> {
        let old = queries::get_snapshot(&self.pool, id)
            .await
            .map_err(not_found(id))?;

        if old.transaction.status() != Some(TransactionStatus::Draft) {
            return Err(AppError::Conflict(format!(
                "Only draft transactions can be deleted; reverse {id} instead"
            )));
        }

        let mut tx = self.pool.begin().await?;
        queries::delete_transaction(&mut tx, id).await?;
        tx.commit().await?;

        info!(transaction_id = %id, "draft deleted");

        self.aggregator
            .handle_event(&TransactionEvent::deleted(old))
            .await?;

        Ok(())
    }

    /// Shared front half of every save: resolve, gate, generate, validate.
    async fn prepare(&self, input: &PostingInput) -> Result<Vec<EntryLine>, AppError> {
        let resolved = self.resolver.resolve().await?;
        resolved.require(&input.needs())?;

        let lines = input.generate(&resolved)?;
        // Balance alone does not catch a figure combination that drives one
        // line negative (a TDS withholding above the gross, say): both sides
        // shrink together and the sums still agree.
        if lines
            .iter()
            .any(|line| line.amount <= BigDecimal::from(0))
        {
            return Err(AppError::Validation(
                "entry amounts must be greater than zero".to_string(),
            ));
        }
        let check = validate_balance(&lines);
        if !check.balanced {
            return Err(AppError::Unbalanced {
                total_debit: check.total_debit,
                total_credit: check.total_credit,
            });
        }
        Ok(lines)
    }
}

fn new_transaction_row(input: &PostingInput) -> Transaction {
    let (subtotal, tax_amount, total_amount) = input.figures();
    let header = input.header();
    let now = Utc::now();
    Transaction {
        id: Uuid::new_v4(),
        kind: input.kind().as_str().to_string(),
        status: header.status.as_str().to_string(),
        txn_date: header.txn_date,
        description: header.description.clone(),
        reference: header.reference.clone(),
        subtotal,
        tax_amount,
        total_amount,
        related_transaction_id: input.related_transaction_id(),
        reverses_transaction_id: None,
        created_at: now,
        updated_at: now,
    }
}

fn not_found(id: Uuid) -> impl FnOnce(sqlx::Error) -> AppError {
    move |err| match err {
        sqlx::Error::RowNotFound => AppError::NotFound(format!("Transaction {id} not found")),
        other => AppError::Database(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EntryDirection;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn header() -> PostingHeader {
        PostingHeader {
            txn_date: NaiveDate::from_ymd_opt(2026, 4, 1).unwrap(),
            description: None,
            reference: None,
            status: TransactionStatus::Posted,
        }
    }

    #[test]
    fn invoice_figures_include_tax() {
        let input = PostingInput::CustomerInvoice(InvoiceInput {
            header: header(),
            subtotal: dec("10000"),
            tax: TaxBreakdown::IntraState {
                cgst: dec("900"),
                sgst: dec("900"),
            },
        });
        let (subtotal, tax, total) = input.figures();
        assert_eq!(subtotal, dec("10000"));
        assert_eq!(tax, dec("1800"));
        assert_eq!(total, dec("11800"));
        assert_eq!(input.kind(), TransactionKind::CustomerInvoice);
    }

    #[test]
    fn payment_kind_follows_direction() {
        let incoming = PostingInput::Payment(PaymentInput {
            header: header(),
            amount: dec("100"),
            incoming: true,
            related_transaction_id: None,
        });
        assert_eq!(incoming.kind(), TransactionKind::CustomerPayment);

        let outgoing = PostingInput::Payment(PaymentInput {
            header: header(),
            amount: dec("100"),
            incoming: false,
            related_transaction_id: None,
        });
        assert_eq!(outgoing.kind(), TransactionKind::VendorPayment);
    }

    #[test]
    fn journal_figures_sum_debit_side() {
        let input = PostingInput::Journal(JournalInput {
            header: header(),
            lines: vec![
                EntryLine::debit(Uuid::new_v4(), dec("60")),
                EntryLine::debit(Uuid::new_v4(), dec("40")),
                EntryLine::credit(Uuid::new_v4(), dec("100")),
            ],
        });
        let (subtotal, tax, total) = input.figures();
        assert_eq!(subtotal, dec("100"));
        assert_eq!(tax, dec("0"));
        assert_eq!(total, dec("100"));
    }

    #[test]
    fn bill_needs_reflect_tds_and_tax_kind() {
        let input = PostingInput::VendorBill(BillInput {
            header: header(),
            subtotal: dec("10000"),
            tax: TaxBreakdown::InterState { igst: dec("1800") },
            tds_amount: Some(dec("1000")),
        });
        let needs = input.needs();
        assert!(needs.inter_state_tax);
        assert!(!needs.intra_state_tax);
        assert!(needs.withholds_tds);
    }

    #[test]
    fn zero_tds_does_not_require_tds_account() {
        let input = PostingInput::VendorBill(BillInput {
            header: header(),
            subtotal: dec("10000"),
            tax: TaxBreakdown::None,
            tds_amount: Some(dec("0")),
        });
        assert!(!input.needs().withholds_tds);
    }

    #[test]
    fn journal_generation_passes_lines_through() {
        let lines = vec![
            EntryLine::debit(Uuid::new_v4(), dec("75")),
            EntryLine::credit(Uuid::new_v4(), dec("75")),
        ];
        let input = PostingInput::Journal(JournalInput {
            header: header(),
            lines: lines.clone(),
        });
        let generated = input.generate(&SystemAccounts::default()).unwrap();
        assert_eq!(generated, lines);
        assert_eq!(generated[0].direction, EntryDirection::Debit);
    }
}
