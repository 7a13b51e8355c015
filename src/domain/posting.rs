//! Pure entry generation: business figures plus resolved system accounts
//! in, balanced debit/credit lines out. No validation happens here beyond
//! what balance-by-construction gives us; callers run the missing-role
//! check first and the balance validator afterward.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::account::EntryDirection;
use crate::domain::money::round2;

/// One generated debit-or-credit line, not yet persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryLine {
    pub account_id: Uuid,
    pub direction: EntryDirection,
    pub amount: BigDecimal,
    pub memo: Option<String>,
}

impl EntryLine {
    pub fn debit(account_id: Uuid, amount: BigDecimal) -> Self {
        Self {
            account_id,
            direction: EntryDirection::Debit,
            amount,
            memo: None,
        }
    }

    pub fn credit(account_id: Uuid, amount: BigDecimal) -> Self {
        Self {
            account_id,
            direction: EntryDirection::Credit,
            amount,
            memo: None,
        }
    }

    /// Signed contribution: debits positive, credits negative.
    pub fn signed_amount(&self) -> BigDecimal {
        match self.direction {
            EntryDirection::Debit => self.amount.clone(),
            EntryDirection::Credit => -&self.amount,
        }
    }
}

/// GST split for one transaction. Intra-state and inter-state are mutually
/// exclusive; the choice comes from an explicit field on the transaction,
/// never inferred from account data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tax_type", rename_all = "snake_case")]
pub enum TaxBreakdown {
    None,
    IntraState { cgst: BigDecimal, sgst: BigDecimal },
    InterState { igst: BigDecimal },
}

impl TaxBreakdown {
    /// Compute components from a percentage rate. The total tax is rounded
    /// first; for intra-state, CGST takes the rounded half and SGST takes
    /// the remainder, so the pair always sums to the rounded total.
    pub fn from_rate(subtotal: &BigDecimal, rate_percent: &BigDecimal, intra_state: bool) -> Self {
        let total = round2(&(subtotal * rate_percent / BigDecimal::from(100)));
        if !intra_state {
            return TaxBreakdown::InterState { igst: total };
        }
        let cgst = round2(&(&total / BigDecimal::from(2)));
        let sgst = &total - &cgst;
        TaxBreakdown::IntraState { cgst, sgst }
    }

    pub fn total(&self) -> BigDecimal {
        match self {
            TaxBreakdown::None => BigDecimal::from(0),
            TaxBreakdown::IntraState { cgst, sgst } => cgst + sgst,
            TaxBreakdown::InterState { igst } => igst.clone(),
        }
    }

    pub fn is_intra_state(&self) -> bool {
        matches!(self, TaxBreakdown::IntraState { .. })
    }

    pub fn is_inter_state(&self) -> bool {
        matches!(self, TaxBreakdown::InterState { .. })
    }
}

/// Accounts an invoice posting writes to. Tax accounts are optional; the
/// resolver's missing-role check guarantees the ones the breakdown needs
/// are present before generation runs.
#[derive(Debug, Clone)]
pub struct InvoiceAccounts {
    pub receivable: Uuid,
    pub revenue: Uuid,
    pub cgst_payable: Option<Uuid>,
    pub sgst_payable: Option<Uuid>,
    pub igst_payable: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct BillAccounts {
    pub payable: Uuid,
    pub expense: Uuid,
    pub cgst_input: Option<Uuid>,
    pub sgst_input: Option<Uuid>,
    pub igst_input: Option<Uuid>,
    pub tds_payable: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct PaymentAccounts {
    /// Receivable for customer payments, payable for vendor payments.
    pub party: Uuid,
    pub bank: Uuid,
}

/// A zero-amount line is never generated; entry amounts are strictly
/// positive and a nil tax component simply produces no line.
fn push_positive(lines: &mut Vec<EntryLine>, account: Option<Uuid>, line: impl Fn(Uuid) -> EntryLine) {
    let zero = BigDecimal::from(0);
    if let Some(acct) = account {
        let candidate = line(acct);
        if candidate.amount > zero {
            lines.push(candidate);
        }
    }
}

/// Customer invoice: Dr Accounts Receivable for the gross total, Cr Revenue
/// for the subtotal, Cr each applicable tax-payable account.
pub fn invoice_entries(
    subtotal: &BigDecimal,
    tax: &TaxBreakdown,
    accounts: &InvoiceAccounts,
) -> Vec<EntryLine> {
    let gross = subtotal + tax.total();
    let mut lines = vec![
        EntryLine::debit(accounts.receivable, gross),
        EntryLine::credit(accounts.revenue, subtotal.clone()),
    ];
    match tax {
        TaxBreakdown::None => {}
        TaxBreakdown::IntraState { cgst, sgst } => {
            push_positive(&mut lines, accounts.cgst_payable, |acct| {
                EntryLine::credit(acct, cgst.clone())
            });
            push_positive(&mut lines, accounts.sgst_payable, |acct| {
                EntryLine::credit(acct, sgst.clone())
            });
        }
        TaxBreakdown::InterState { igst } => {
            push_positive(&mut lines, accounts.igst_payable, |acct| {
                EntryLine::credit(acct, igst.clone())
            });
        }
    }
    lines
}

/// Vendor bill: Dr Expense for the subtotal, Dr each applicable tax-input
/// account, Cr Accounts Payable for the gross total minus withheld tax,
/// Cr TDS Payable for the withheld amount when present.
pub fn bill_entries(
    subtotal: &BigDecimal,
    tax: &TaxBreakdown,
    tds_amount: Option<&BigDecimal>,
    accounts: &BillAccounts,
) -> Vec<EntryLine> {
    let gross = subtotal + tax.total();
    let mut lines = vec![EntryLine::debit(accounts.expense, subtotal.clone())];
    match tax {
        TaxBreakdown::None => {}
        TaxBreakdown::IntraState { cgst, sgst } => {
            push_positive(&mut lines, accounts.cgst_input, |acct| {
                EntryLine::debit(acct, cgst.clone())
            });
            push_positive(&mut lines, accounts.sgst_input, |acct| {
                EntryLine::debit(acct, sgst.clone())
            });
        }
        TaxBreakdown::InterState { igst } => {
            push_positive(&mut lines, accounts.igst_input, |acct| {
                EntryLine::debit(acct, igst.clone())
            });
        }
    }
    match tds_amount {
        Some(tds) if tds > &BigDecimal::from(0) => {
            lines.push(EntryLine::credit(accounts.payable, &gross - tds));
            if let Some(acct) = accounts.tds_payable {
                lines.push(EntryLine::credit(acct, tds.clone()));
            }
        }
        _ => lines.push(EntryLine::credit(accounts.payable, gross)),
    }
    lines
}

/// Payment against a receivable (incoming) or payable (outgoing). Incoming:
/// Dr Bank, Cr Accounts Receivable. Outgoing: Dr Accounts Payable, Cr Bank.
pub fn payment_entries(
    amount: &BigDecimal,
    incoming: bool,
    accounts: &PaymentAccounts,
) -> Vec<EntryLine> {
    if incoming {
        vec![
            EntryLine::debit(accounts.bank, amount.clone()),
            EntryLine::credit(accounts.party, amount.clone()),
        ]
    } else {
        vec![
            EntryLine::debit(accounts.party, amount.clone()),
            EntryLine::credit(accounts.bank, amount.clone()),
        ]
    }
}

/// Manual journal entry: the caller supplies the lines as-is. Balance is
/// still enforced by the validator before persistence.
pub fn journal_entries(lines: &[EntryLine]) -> Vec<EntryLine> {
    lines.to_vec()
}

/// Sign-inverted copy of an entry list, used to build a compensating
/// reversal transaction.
pub fn inverted_entries(lines: &[EntryLine]) -> Vec<EntryLine> {
    lines
        .iter()
        .map(|line| EntryLine {
            account_id: line.account_id,
            direction: line.direction.inverted(),
            amount: line.amount.clone(),
            memo: line.memo.clone(),
        })
        .collect()
}
