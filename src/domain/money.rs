use bigdecimal::BigDecimal;

/// Smallest representable currency step (one paisa).
pub fn step() -> BigDecimal {
    BigDecimal::from(1) / BigDecimal::from(100)
}

/// Round to 2 decimal places, half away from zero.
///
/// `with_scale` truncates toward zero, so the rounding decision is made on
/// the truncated remainder. Applied to every tax component individually;
/// using any other rule somewhere else would break the balance invariant.
pub fn round2(value: &BigDecimal) -> BigDecimal {
    let truncated = value.with_scale(2);
    let remainder = value - &truncated;
    let half = BigDecimal::from(5) / BigDecimal::from(1000);
    if remainder >= half {
        truncated + step()
    } else if remainder <= -&half {
        truncated - step()
    } else {
        truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(round2(&dec("1.005")), dec("1.01"));
        assert_eq!(round2(&dec("1.004")), dec("1.00"));
        assert_eq!(round2(&dec("-1.005")), dec("-1.01"));
        assert_eq!(round2(&dec("-1.004")), dec("-1.00"));
    }

    #[test]
    fn leaves_two_decimal_values_alone() {
        assert_eq!(round2(&dec("900.00")), dec("900.00"));
        assert_eq!(round2(&dec("0")), dec("0.00"));
    }

    #[test]
    fn rounds_long_fractions() {
        assert_eq!(round2(&dec("33.333333")), dec("33.33"));
        assert_eq!(round2(&dec("66.666666")), dec("66.67"));
    }
}
