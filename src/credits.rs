//! Credit ledger collaborator and refund arithmetic.
//!
//! Credits are the platform's internal spendable currency. The ledger itself
//! lives outside this crate; the pipeline only reads the balance, debits on
//! confirmation and refunds on cancellation.

use async_trait::async_trait;
use decimal_percentage::Percentage;
use mockall::automock;
use rust_decimal::{
    Decimal, RoundingStrategy,
    prelude::{FromPrimitive, ToPrimitive},
};
use thiserror::Error;

use crate::bookings::BookingUuid;

/// Errors surfaced by the credit ledger collaborator.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The ledger rejected a debit for lack of balance.
    #[error("insufficient credit balance")]
    InsufficientBalance,

    /// The ledger could not be reached or failed internally.
    #[error("credit ledger unavailable: {0}")]
    Unavailable(String),
}

/// The user's credit balance, as seen by the booking pipeline.
///
/// The ledger is authoritative: it re-validates every debit regardless of
/// what the pipeline checked beforehand, and `refund` is idempotent per
/// booking, so an already-refunded booking is never refunded twice.
#[automock]
#[async_trait]
pub trait CreditLedger: Send + Sync {
    /// The credits currently available to spend.
    async fn available_credits(&self) -> Result<u64, LedgerError>;

    /// Spend `amount` credits.
    async fn debit(&self, amount: u64) -> Result<(), LedgerError>;

    /// Return `amount` credits for a cancelled booking.
    async fn refund(&self, booking: BookingUuid, amount: u64) -> Result<(), LedgerError>;
}

/// Errors specific to credit percentage arithmetic.
#[derive(Debug, Error)]
pub enum CreditsError {
    /// Percentage calculation could not be safely converted.
    #[error("percentage conversion overflowed or was not finite")]
    PercentConversion,
}

/// Calculate a percentage of a credit amount, rounding half away from zero.
///
/// # Errors
///
/// Returns [`CreditsError::PercentConversion`] if the multiplication
/// overflows the decimal range or the result does not fit in a `u64`.
pub fn percent_of_credits(percent: &Percentage, credits: u64) -> Result<u64, CreditsError> {
    let credits = Decimal::from_u64(credits).ok_or(CreditsError::PercentConversion)?;

    ((*percent) * Decimal::ONE)
        .checked_mul(credits)
        .ok_or(CreditsError::PercentConversion)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_u64()
        .ok_or(CreditsError::PercentConversion)
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    #[test]
    fn percent_of_credits_rounds_midpoint_away_from_zero() -> TestResult {
        let percent = Percentage::from(0.5);

        assert_eq!(percent_of_credits(&percent, 10)?, 5);
        assert_eq!(percent_of_credits(&percent, 5)?, 3);

        Ok(())
    }

    #[test]
    fn percent_of_credits_full_and_zero() -> TestResult {
        assert_eq!(percent_of_credits(&Percentage::from(1.0), 37)?, 37);
        assert_eq!(percent_of_credits(&Percentage::from(0.0), 37)?, 0);

        Ok(())
    }

    #[test]
    fn percent_of_credits_tier_values() -> TestResult {
        let cost = 10;

        assert_eq!(percent_of_credits(&Percentage::from(0.9), cost)?, 9);
        assert_eq!(percent_of_credits(&Percentage::from(0.7), cost)?, 7);

        Ok(())
    }

    #[test]
    fn percent_of_credits_overflow_returns_error() -> TestResult {
        let percent = Percentage::try_from("100000000000000000000")?;
        let result = percent_of_credits(&percent, u64::MAX);

        assert!(matches!(result, Err(CreditsError::PercentConversion)));

        Ok(())
    }
}
