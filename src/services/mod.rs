pub mod allocation;
pub mod receipts;
pub mod reporting;
pub mod sales;

use rust_decimal::Decimal;
use validator::ValidationError;

/// Shared DTO validator: quantities and costs must be strictly positive.
pub(crate) fn validate_positive(value: &Decimal) -> Result<(), ValidationError> {
    if *value <= Decimal::ZERO {
        return Err(ValidationError::new("must_be_positive"));
    }
    Ok(())
}

/// Shared DTO validator: prices and discounts may be zero but not negative.
pub(crate) fn validate_non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO {
        return Err(ValidationError::new("must_not_be_negative"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn positive_validator_rejects_zero_and_negative() {
        assert!(validate_positive(&dec!(0.01)).is_ok());
        assert!(validate_positive(&Decimal::ZERO).is_err());
        assert!(validate_positive(&dec!(-1)).is_err());
    }

    #[test]
    fn non_negative_validator_allows_zero() {
        assert!(validate_non_negative(&Decimal::ZERO).is_ok());
        assert!(validate_non_negative(&dec!(-0.01)).is_err());
    }
}
