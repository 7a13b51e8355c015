use bigdecimal::BigDecimal;
use serde::Serialize;

use crate::domain::account::EntryDirection;
use crate::domain::posting::EntryLine;

/// Result of the write-time balance gate. Never an error: callers inspect
/// `balanced` and surface the totals when it is false.
#[derive(Debug, Clone, Serialize)]
pub struct BalanceCheck {
    pub balanced: bool,
    pub total_debit: BigDecimal,
    pub total_credit: BigDecimal,
}

impl BalanceCheck {
    pub fn difference(&self) -> BigDecimal {
        &self.total_debit - &self.total_credit
    }
}

/// Tolerance absorbing component-level rounding: one hundredth of a
/// currency unit.
fn tolerance() -> BigDecimal {
    BigDecimal::from(1) / BigDecimal::from(100)
}

/// Sum amounts by direction; balanced iff the totals agree within the
/// tolerance. An empty list balances trivially (zero on both sides).
pub fn validate_balance(lines: &[EntryLine]) -> BalanceCheck {
    let mut total_debit = BigDecimal::from(0);
    let mut total_credit = BigDecimal::from(0);
    for line in lines {
        match line.direction {
            EntryDirection::Debit => total_debit += &line.amount,
            EntryDirection::Credit => total_credit += &line.amount,
        }
    }
    let balanced = (&total_debit - &total_credit).abs() < tolerance();
    BalanceCheck {
        balanced,
        total_debit,
        total_credit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use uuid::Uuid;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn balanced_pair_passes() {
        let lines = vec![
            EntryLine::debit(Uuid::new_v4(), dec("100.00")),
            EntryLine::credit(Uuid::new_v4(), dec("100.00")),
        ];
        let check = validate_balance(&lines);
        assert!(check.balanced);
        assert_eq!(check.total_debit, dec("100.00"));
        assert_eq!(check.total_credit, dec("100.00"));
        assert_eq!(check.difference(), dec("0"));
    }

    #[test]
    fn unbalanced_list_reports_totals() {
        let lines = vec![
            EntryLine::debit(Uuid::new_v4(), dec("100.00")),
            EntryLine::credit(Uuid::new_v4(), dec("90.00")),
        ];
        let check = validate_balance(&lines);
        assert!(!check.balanced);
        assert_eq!(check.difference(), dec("10.00"));
    }

    #[test]
    fn sub_tolerance_drift_is_accepted() {
        let lines = vec![
            EntryLine::debit(Uuid::new_v4(), dec("100.005")),
            EntryLine::credit(Uuid::new_v4(), dec("100.00")),
        ];
        assert!(validate_balance(&lines).balanced);
    }

    #[test]
    fn one_paisa_gap_is_rejected() {
        let lines = vec![
            EntryLine::debit(Uuid::new_v4(), dec("100.01")),
            EntryLine::credit(Uuid::new_v4(), dec("100.00")),
        ];
        assert!(!validate_balance(&lines).balanced);
    }

    #[test]
    fn empty_list_balances() {
        assert!(validate_balance(&[]).balanced);
    }
}
