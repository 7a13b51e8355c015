//! Framework-agnostic ledger domain: account and transaction vocabulary,
//! money rounding, entry generation, and the balance check. Nothing in this
//! module touches the database.

pub mod account;
pub mod balance;
pub mod money;
pub mod posting;

pub use account::{AccountType, EntryDirection, TransactionKind, TransactionStatus};
pub use balance::{validate_balance, BalanceCheck};
pub use posting::{EntryLine, TaxBreakdown};
