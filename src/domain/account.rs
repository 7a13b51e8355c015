use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// High-level account classification. Determines which side of the trial
/// balance an account's normal balance falls on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Asset,
    Liability,
    Equity,
    Revenue,
    Expense,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Asset => "asset",
            AccountType::Liability => "liability",
            AccountType::Equity => "equity",
            AccountType::Revenue => "revenue",
            AccountType::Expense => "expense",
        }
    }

    pub const ALL: &'static [&'static str] = &["asset", "liability", "equity", "revenue", "expense"];
}

impl FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asset" => Ok(AccountType::Asset),
            "liability" => Ok(AccountType::Liability),
            "equity" => Ok(AccountType::Equity),
            "revenue" => Ok(AccountType::Revenue),
            "expense" => Ok(AccountType::Expense),
            other => Err(format!("unknown account type: {other}")),
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Side of a ledger entry. Amounts are always positive; the direction
/// carries the sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryDirection {
    Debit,
    Credit,
}

impl EntryDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryDirection::Debit => "debit",
            EntryDirection::Credit => "credit",
        }
    }

    pub fn inverted(&self) -> EntryDirection {
        match self {
            EntryDirection::Debit => EntryDirection::Credit,
            EntryDirection::Credit => EntryDirection::Debit,
        }
    }
}

impl FromStr for EntryDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debit" => Ok(EntryDirection::Debit),
            "credit" => Ok(EntryDirection::Credit),
            other => Err(format!("unknown entry direction: {other}")),
        }
    }
}

/// Business event a transaction records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    CustomerInvoice,
    VendorBill,
    CustomerPayment,
    VendorPayment,
    Journal,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::CustomerInvoice => "customer_invoice",
            TransactionKind::VendorBill => "vendor_bill",
            TransactionKind::CustomerPayment => "customer_payment",
            TransactionKind::VendorPayment => "vendor_payment",
            TransactionKind::Journal => "journal",
        }
    }
}

impl FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer_invoice" => Ok(TransactionKind::CustomerInvoice),
            "vendor_bill" => Ok(TransactionKind::VendorBill),
            "customer_payment" => Ok(TransactionKind::CustomerPayment),
            "vendor_payment" => Ok(TransactionKind::VendorPayment),
            "journal" => Ok(TransactionKind::Journal),
            other => Err(format!("unknown transaction kind: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Draft,
    Posted,
    Reversed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Draft => "draft",
            TransactionStatus::Posted => "posted",
            TransactionStatus::Reversed => "reversed",
        }
    }

    /// Whether entries of a transaction in this status count toward account
    /// totals. A reversed transaction still contributes; its compensating
    /// transaction cancels it, preserving the audit trail.
    pub fn contributes(&self) -> bool {
        !matches!(self, TransactionStatus::Draft)
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(TransactionStatus::Draft),
            "posted" => Ok(TransactionStatus::Posted),
            "reversed" => Ok(TransactionStatus::Reversed),
            other => Err(format!("unknown transaction status: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_type_round_trips() {
        for name in AccountType::ALL {
            let parsed: AccountType = name.parse().unwrap();
            assert_eq!(parsed.as_str(), *name);
        }
        assert!("fund".parse::<AccountType>().is_err());
    }

    #[test]
    fn direction_inverts() {
        assert_eq!(EntryDirection::Debit.inverted(), EntryDirection::Credit);
        assert_eq!(EntryDirection::Credit.inverted(), EntryDirection::Debit);
    }

    #[test]
    fn draft_does_not_contribute() {
        assert!(!TransactionStatus::Draft.contributes());
        assert!(TransactionStatus::Posted.contributes());
        assert!(TransactionStatus::Reversed.contributes());
    }
}
