pub mod accounts;
pub mod aggregator;
pub mod posting;
pub mod reports;

pub use accounts::{SystemAccountResolver, SystemAccounts};
pub use aggregator::BalanceAggregator;
pub use posting::PostingService;
