use rust_decimal::Decimal;

/// `max(round(amount * commission_rate, 2), min_commission)`.
pub fn commission(amount: Decimal, commission_rate: Decimal, min_commission: Decimal) -> Decimal {
    (amount * commission_rate)
        .round_dp(2)
        .max(min_commission)
}

/// `round(amount * stamp_tax_rate, 2)`, charged on sells only.
pub fn stamp_tax(amount: Decimal, stamp_tax_rate: Decimal) -> Decimal {
    (amount * stamp_tax_rate).round_dp(2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn commission_floors_at_minimum() {
        let c = commission(dec!(1000), dec!(0.0003), dec!(5));
        assert_eq!(c, dec!(5));
    }

    #[test]
    fn commission_scales_above_minimum() {
        let c = commission(dec!(100000), dec!(0.0003), dec!(5));
        assert_eq!(c, dec!(30.00));
    }
}
