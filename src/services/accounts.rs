//! System account resolution: maps the semantic roles posting needs onto
//! concrete chart-of-accounts rows. Resolution itself never fails; absence
//! is represented as `None` and reported by the missing-role check, which
//! callers must run before generating entries.

use sqlx::PgPool;
use uuid::Uuid;

use crate::db::models::Account;
use crate::db::queries;
use crate::domain::{AccountType, TransactionKind};
use crate::domain::posting::{BillAccounts, InvoiceAccounts, PaymentAccounts, TaxBreakdown};
use crate::error::AppError;

pub const ROLE_ACCOUNTS_RECEIVABLE: &str = "Accounts Receivable";
pub const ROLE_ACCOUNTS_PAYABLE: &str = "Accounts Payable";
pub const ROLE_REVENUE: &str = "Revenue";
pub const ROLE_EXPENSE: &str = "Expense";
pub const ROLE_BANK: &str = "Bank";
pub const ROLE_CGST_PAYABLE: &str = "CGST Payable";
pub const ROLE_SGST_PAYABLE: &str = "SGST Payable";
pub const ROLE_IGST_PAYABLE: &str = "IGST Payable";
pub const ROLE_CGST_INPUT: &str = "CGST Input";
pub const ROLE_SGST_INPUT: &str = "SGST Input";
pub const ROLE_IGST_INPUT: &str = "IGST Input";
pub const ROLE_TDS_PAYABLE: &str = "TDS Payable";

const PREFERRED_REVENUE_NAME: &str = "Sales";
const PREFERRED_EXPENSE_NAME: &str = "Purchases";

/// Resolved role-to-account mapping for one posting operation. Built on
/// demand, never persisted.
#[derive(Debug, Clone, Default)]
pub struct SystemAccounts {
    pub accounts_receivable: Option<Uuid>,
    pub accounts_payable: Option<Uuid>,
    pub revenue: Option<Uuid>,
    pub expense: Option<Uuid>,
    pub bank: Option<Uuid>,
    pub cgst_payable: Option<Uuid>,
    pub sgst_payable: Option<Uuid>,
    pub igst_payable: Option<Uuid>,
    pub cgst_input: Option<Uuid>,
    pub sgst_input: Option<Uuid>,
    pub igst_input: Option<Uuid>,
    pub tds_payable: Option<Uuid>,
}

/// What a particular posting needs resolved, derived from the request
/// before any entry is generated.
#[derive(Debug, Clone, Copy)]
pub struct PostingNeeds {
    pub kind: TransactionKind,
    pub intra_state_tax: bool,
    pub inter_state_tax: bool,
    pub withholds_tds: bool,
}

impl PostingNeeds {
    pub fn for_request(kind: TransactionKind, tax: &TaxBreakdown, withholds_tds: bool) -> Self {
        Self {
            kind,
            intra_state_tax: tax.is_intra_state(),
            inter_state_tax: tax.is_inter_state(),
            withholds_tds,
        }
    }

    pub fn untaxed(kind: TransactionKind) -> Self {
        Self {
            kind,
            intra_state_tax: false,
            inter_state_tax: false,
            withholds_tds: false,
        }
    }
}

impl SystemAccounts {
    /// Names of the roles this posting needs that did not resolve. Empty
    /// means the caller may proceed to entry generation.
    pub fn missing_for(&self, needs: &PostingNeeds) -> Vec<String> {
        let mut required: Vec<(&str, Option<Uuid>)> = Vec::new();
        match needs.kind {
            TransactionKind::CustomerInvoice => {
                required.push((ROLE_ACCOUNTS_RECEIVABLE, self.accounts_receivable));
                required.push((ROLE_REVENUE, self.revenue));
                if needs.intra_state_tax {
                    required.push((ROLE_CGST_PAYABLE, self.cgst_payable));
                    required.push((ROLE_SGST_PAYABLE, self.sgst_payable));
                }
                if needs.inter_state_tax {
                    required.push((ROLE_IGST_PAYABLE, self.igst_payable));
                }
            }
            TransactionKind::VendorBill => {
                required.push((ROLE_ACCOUNTS_PAYABLE, self.accounts_payable));
                required.push((ROLE_EXPENSE, self.expense));
                if needs.intra_state_tax {
                    required.push((ROLE_CGST_INPUT, self.cgst_input));
                    required.push((ROLE_SGST_INPUT, self.sgst_input));
                }
                if needs.inter_state_tax {
                    required.push((ROLE_IGST_INPUT, self.igst_input));
                }
                if needs.withholds_tds {
                    required.push((ROLE_TDS_PAYABLE, self.tds_payable));
                }
            }
            TransactionKind::CustomerPayment => {
                required.push((ROLE_ACCOUNTS_RECEIVABLE, self.accounts_receivable));
                required.push((ROLE_BANK, self.bank));
            }
            TransactionKind::VendorPayment => {
                required.push((ROLE_ACCOUNTS_PAYABLE, self.accounts_payable));
                required.push((ROLE_BANK, self.bank));
            }
            TransactionKind::Journal => {}
        }

        required
            .into_iter()
            .filter(|(_, resolved)| resolved.is_none())
            .map(|(role, _)| role.to_string())
            .collect()
    }

    /// Gate used by the posting workflow: error with the missing role list
    /// instead of attempting a partially-resolved post.
    pub fn require(&self, needs: &PostingNeeds) -> Result<(), AppError> {
        let missing = self.missing_for(needs);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AppError::MissingAccounts(missing))
        }
    }

    pub fn invoice_accounts(&self) -> Option<InvoiceAccounts> {
        Some(InvoiceAccounts {
            receivable: self.accounts_receivable?,
            revenue: self.revenue?,
            cgst_payable: self.cgst_payable,
            sgst_payable: self.sgst_payable,
            igst_payable: self.igst_payable,
        })
    }

    pub fn bill_accounts(&self) -> Option<BillAccounts> {
        Some(BillAccounts {
            payable: self.accounts_payable?,
            expense: self.expense?,
            cgst_input: self.cgst_input,
            sgst_input: self.sgst_input,
            igst_input: self.igst_input,
            tds_payable: self.tds_payable,
        })
    }

    pub fn payment_accounts(&self, incoming: bool) -> Option<PaymentAccounts> {
        let party = if incoming {
            self.accounts_receivable?
        } else {
            self.accounts_payable?
        };
        Some(PaymentAccounts {
            party,
            bank: self.bank?,
        })
    }
}

pub struct SystemAccountResolver {
    pool: PgPool,
}

impl SystemAccountResolver {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Query the registry and build the role mapping. Read-only; missing
    /// accounts surface later through `missing_for`, never here.
    pub async fn resolve(&self) -> Result<SystemAccounts, AppError> {
        let mut resolved = SystemAccounts::default();

        resolved.accounts_receivable =
            queries::find_account_by_name(&self.pool, ROLE_ACCOUNTS_RECEIVABLE)
                .await?
                .map(|a| a.id);
        resolved.accounts_payable =
            queries::find_account_by_name(&self.pool, ROLE_ACCOUNTS_PAYABLE)
                .await?
                .map(|a| a.id);
        resolved.bank = match queries::find_account_by_name(&self.pool, ROLE_BANK).await? {
            Some(account) => Some(account.id),
            None => queries::find_account_by_name(&self.pool, "Cash")
                .await?
                .map(|a| a.id),
        };

        resolved.revenue = pick_by_type(
            &queries::find_accounts_by_type(&self.pool, AccountType::Revenue.as_str()).await?,
            PREFERRED_REVENUE_NAME,
        );
        resolved.expense = pick_by_type(
            &queries::find_accounts_by_type(&self.pool, AccountType::Expense.as_str()).await?,
            PREFERRED_EXPENSE_NAME,
        );

        for account in queries::find_gst_accounts(&self.pool).await? {
            classify_gst_account(&account, &mut resolved);
        }

        resolved.tds_payable = queries::find_tds_accounts(&self.pool)
            .await?
            .iter()
            .find(|a| a.account_type() == Some(AccountType::Liability))
            .map(|a| a.id);

        Ok(resolved)
    }
}

/// Type match with a preferred-name hint, falling back to the first active
/// account of that type.
fn pick_by_type(candidates: &[Account], preferred_name: &str) -> Option<Uuid> {
    candidates
        .iter()
        .find(|a| a.name == preferred_name)
        .or_else(|| candidates.first())
        .map(|a| a.id)
}

/// GST accounts are classified by tax component in the name and side by
/// account type: liabilities are payables, assets are input credits.
fn classify_gst_account(account: &Account, resolved: &mut SystemAccounts) {
    let name = account.name.to_uppercase();
    let is_liability = account.account_type() == Some(AccountType::Liability);
    let is_asset = account.account_type() == Some(AccountType::Asset);

    let slot = if name.contains("CGST") {
        if is_liability {
            &mut resolved.cgst_payable
        } else if is_asset {
            &mut resolved.cgst_input
        } else {
            return;
        }
    } else if name.contains("SGST") {
        if is_liability {
            &mut resolved.sgst_payable
        } else if is_asset {
            &mut resolved.sgst_input
        } else {
            return;
        }
    } else if name.contains("IGST") {
        if is_liability {
            &mut resolved.igst_payable
        } else if is_asset {
            &mut resolved.igst_input
        } else {
            return;
        }
    } else {
        return;
    };

    if slot.is_none() {
        *slot = Some(account.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AccountType;

    fn resolved_all() -> SystemAccounts {
        SystemAccounts {
            accounts_receivable: Some(Uuid::new_v4()),
            accounts_payable: Some(Uuid::new_v4()),
            revenue: Some(Uuid::new_v4()),
            expense: Some(Uuid::new_v4()),
            bank: Some(Uuid::new_v4()),
            cgst_payable: Some(Uuid::new_v4()),
            sgst_payable: Some(Uuid::new_v4()),
            igst_payable: Some(Uuid::new_v4()),
            cgst_input: Some(Uuid::new_v4()),
            sgst_input: Some(Uuid::new_v4()),
            igst_input: Some(Uuid::new_v4()),
            tds_payable: Some(Uuid::new_v4()),
        }
    }

    #[test]
    fn fully_resolved_has_no_missing_roles() {
        let resolved = resolved_all();
        let needs = PostingNeeds {
            kind: TransactionKind::CustomerInvoice,
            intra_state_tax: true,
            inter_state_tax: false,
            withholds_tds: false,
        };
        assert!(resolved.missing_for(&needs).is_empty());
        assert!(resolved.require(&needs).is_ok());
    }

    #[test]
    fn missing_receivable_blocks_invoice() {
        let mut resolved = resolved_all();
        resolved.accounts_receivable = None;
        let needs = PostingNeeds::untaxed(TransactionKind::CustomerInvoice);

        let missing = resolved.missing_for(&needs);
        assert_eq!(missing, vec![ROLE_ACCOUNTS_RECEIVABLE.to_string()]);
        assert!(matches!(
            resolved.require(&needs),
            Err(AppError::MissingAccounts(_))
        ));
    }

    #[test]
    fn untaxed_invoice_skips_gst_roles() {
        let mut resolved = resolved_all();
        resolved.cgst_payable = None;
        resolved.sgst_payable = None;
        resolved.igst_payable = None;
        let needs = PostingNeeds::untaxed(TransactionKind::CustomerInvoice);
        assert!(resolved.missing_for(&needs).is_empty());
    }

    #[test]
    fn tds_bill_requires_tds_payable() {
        let mut resolved = resolved_all();
        resolved.tds_payable = None;
        let needs = PostingNeeds {
            kind: TransactionKind::VendorBill,
            intra_state_tax: true,
            inter_state_tax: false,
            withholds_tds: true,
        };
        assert_eq!(
            resolved.missing_for(&needs),
            vec![ROLE_TDS_PAYABLE.to_string()]
        );
    }

    #[test]
    fn journal_needs_no_system_accounts() {
        let resolved = SystemAccounts::default();
        let needs = PostingNeeds::untaxed(TransactionKind::Journal);
        assert!(resolved.missing_for(&needs).is_empty());
    }

    #[test]
    fn gst_classification_splits_payable_and_input() {
        let mut resolved = SystemAccounts::default();

        let mut payable = Account::new("CGST Payable".to_string(), AccountType::Liability);
        payable.is_gst = true;
        let mut input = Account::new("CGST Input".to_string(), AccountType::Asset);
        input.is_gst = true;

        classify_gst_account(&payable, &mut resolved);
        classify_gst_account(&input, &mut resolved);

        assert_eq!(resolved.cgst_payable, Some(payable.id));
        assert_eq!(resolved.cgst_input, Some(input.id));
        assert_eq!(resolved.sgst_payable, None);
    }

    #[test]
    fn preferred_name_wins_for_revenue() {
        let other = Account::new("Scrap Income".to_string(), AccountType::Revenue);
        let sales = Account::new("Sales".to_string(), AccountType::Revenue);
        let picked = pick_by_type(&[other.clone(), sales.clone()], "Sales");
        assert_eq!(picked, Some(sales.id));

        let fallback = pick_by_type(&[other.clone()], "Sales");
        assert_eq!(fallback, Some(other.id));
    }
}
