//! Cancellation policy engine.
//!
//! The refund a cancellation earns is a pure step function of how long
//! remains until the lesson starts. The policy is recomputed every time it
//! is shown and again when the cancellation executes; nothing locks a tier
//! in ahead of execution, so a cancellation near a boundary may resolve to
//! a different tier than the one last displayed. That is accepted
//! behavior, not a bug.

use std::time::Duration;

use decimal_percentage::Percentage;
use humanize_duration::{Truncate, prelude::DurationExt};
use jiff::{SignedDuration, Timestamp};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    bookings::{BookingStatus, BookingUuid, BookingsRepository},
    credits::{CreditLedger, percent_of_credits},
    failures::{DEFAULT_CALL_TIMEOUT, UnexpectedFailure, with_deadline},
};

/// How close to the lesson a cancellation lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeverityTier {
    /// More than 24 hours out.
    Safe,
    /// Between 4 and 24 hours out.
    Low,
    /// Between 2 and 4 hours out.
    Medium,
    /// Between 1 and 2 hours out.
    High,
    /// An hour or less out.
    Critical,
}

/// The refund terms for cancelling at a given moment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancellationPolicy {
    /// Share of the lesson's credit cost returned, 0..=100.
    pub refund_percent: u8,
    /// Share kept as a fee. Always `100 - refund_percent`.
    pub fee_percent: u8,
    /// The named bucket the cancellation falls into.
    pub tier: SeverityTier,
    /// Short label for the terms, e.g. "70% refund, 30% fee".
    pub message: String,
    /// One-sentence explanation including the time remaining.
    pub description: String,
}

/// Compute the refund terms for a lesson starting at `starts_at`, as of
/// `now`.
///
/// Tier boundaries are exclusive on their lower bound: exactly 24 hours out
/// refunds 90% (the full-refund tier requires strictly more than 24), and
/// exactly 1 hour out refunds nothing.
pub fn compute_policy(starts_at: Timestamp, now: Timestamp) -> CancellationPolicy {
    let until_start = starts_at.duration_since(now);

    let (refund_percent, tier) = if until_start > SignedDuration::from_hours(24) {
        (100, SeverityTier::Safe)
    } else if until_start > SignedDuration::from_hours(4) {
        (90, SeverityTier::Low)
    } else if until_start > SignedDuration::from_hours(2) {
        (70, SeverityTier::Medium)
    } else if until_start > SignedDuration::from_hours(1) {
        (50, SeverityTier::High)
    } else {
        (0, SeverityTier::Critical)
    };

    let fee_percent = 100 - refund_percent;

    let message = match tier {
        SeverityTier::Safe => "Free cancellation".to_string(),
        SeverityTier::Critical => "No refund".to_string(),
        SeverityTier::Low | SeverityTier::Medium | SeverityTier::High => {
            format!("{refund_percent}% refund, {fee_percent}% fee")
        }
    };

    let description = if until_start.is_positive() {
        let remaining = Duration::from_secs(u64::try_from(until_start.as_secs()).unwrap_or(0));

        format!(
            "The lesson starts in {}. Cancelling now returns {refund_percent}% of its credits; {fee_percent}% is kept as a fee.",
            remaining.human(Truncate::Second)
        )
    } else {
        "The lesson has already started. No credits are returned.".to_string()
    };

    CancellationPolicy {
        refund_percent,
        fee_percent,
        tier,
        message,
        description,
    }
}

/// The result of an executed cancellation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancellationReceipt {
    /// The cancelled booking.
    pub booking_uuid: BookingUuid,
    /// The policy that was applied, computed at execution time.
    pub policy: CancellationPolicy,
    /// Credits returned to the user's balance.
    pub refunded_credits: u64,
}

/// The typed outcomes of a failed cancellation.
#[derive(Debug, Error)]
pub enum CancellationError {
    /// No booking with the given id.
    #[error("booking not found")]
    NotFound,

    /// The booking was already cancelled; nothing is refunded twice.
    #[error("booking is already cancelled")]
    AlreadyCancelled,

    /// The booking is not in a cancellable state.
    #[error("booking cannot be cancelled while {0:?}")]
    NotCancellable(BookingStatus),

    /// A collaborator failed or timed out; the booking reverts to
    /// confirmed and no refund was issued.
    #[error(transparent)]
    Failure(#[from] UnexpectedFailure),
}

/// Previews and executes cancellations of confirmed bookings.
#[derive(Debug)]
pub struct CancellationService<R, L> {
    bookings: R,
    ledger: L,
    call_timeout: Duration,
}

impl<R, L> CancellationService<R, L>
where
    R: BookingsRepository,
    L: CreditLedger,
{
    /// Create a service with the default collaborator deadline.
    #[must_use]
    pub fn new(bookings: R, ledger: L) -> Self {
        Self {
            bookings,
            ledger,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Override the collaborator deadline.
    #[must_use]
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Compute the refund terms the given booking would get right now.
    ///
    /// Read-only: the booking's state is untouched.
    ///
    /// # Errors
    ///
    /// Returns [`CancellationError::NotFound`] for an unknown booking, or
    /// [`CancellationError::Failure`] if the repository fails.
    pub async fn preview(
        &self,
        booking: BookingUuid,
        now: Timestamp,
    ) -> Result<CancellationPolicy, CancellationError> {
        let booking = self.load(booking).await?;

        Ok(compute_policy(booking.starts_at, now))
    }

    /// Cancel a confirmed booking, refunding per the policy computed at
    /// execution time.
    ///
    /// The booking passes through the transient `Cancelling` state while
    /// the refund is in flight; if the refund fails, it reverts to
    /// `Confirmed` and the failure is surfaced with no refund issued.
    ///
    /// # Errors
    ///
    /// Returns [`CancellationError::AlreadyCancelled`] for a booking that
    /// was cancelled before, [`CancellationError::NotCancellable`] for one
    /// that is completing or already in flight, [`CancellationError::NotFound`]
    /// for an unknown id, or [`CancellationError::Failure`] for
    /// collaborator failures.
    #[tracing::instrument(
        name = "booking.cancel",
        skip(self),
        fields(tier = tracing::field::Empty, refund = tracing::field::Empty),
        err
    )]
    pub async fn cancel(
        &self,
        booking: BookingUuid,
        now: Timestamp,
    ) -> Result<CancellationReceipt, CancellationError> {
        let record = self.load(booking).await?;

        match record.status {
            BookingStatus::Confirmed => {}
            BookingStatus::Cancelled => return Err(CancellationError::AlreadyCancelled),
            status @ (BookingStatus::Cancelling | BookingStatus::Completed) => {
                return Err(CancellationError::NotCancellable(status));
            }
        }

        with_deadline(
            self.call_timeout,
            self.bookings.set_status(booking, BookingStatus::Cancelling),
        )
        .await?
        .map_err(UnexpectedFailure::Bookings)?;

        // The policy is recomputed here rather than trusted from the
        // preview; the clock has moved since the user last saw it.
        let policy = compute_policy(record.starts_at, now);

        let span = tracing::Span::current();
        span.record("tier", tracing::field::debug(policy.tier));
        span.record("refund", tracing::field::display(policy.refund_percent));

        let fraction = Percentage::from(f64::from(policy.refund_percent) / 100.0);

        let refunded_credits = match percent_of_credits(&fraction, record.credits_cost) {
            Ok(amount) => amount,
            Err(error) => {
                self.revert_to_confirmed(booking).await;
                return Err(UnexpectedFailure::Arithmetic(error).into());
            }
        };

        let refund_result = with_deadline(
            self.call_timeout,
            self.ledger.refund(booking, refunded_credits),
        )
        .await
        .and_then(|result| result.map_err(UnexpectedFailure::Ledger));

        if let Err(error) = refund_result {
            self.revert_to_confirmed(booking).await;
            return Err(error.into());
        }

        with_deadline(
            self.call_timeout,
            self.bookings.set_status(booking, BookingStatus::Cancelled),
        )
        .await?
        .map_err(UnexpectedFailure::Bookings)?;

        info!(
            booking_uuid = %booking,
            refunded = refunded_credits,
            tier = ?policy.tier,
            "cancelled booking"
        );

        Ok(CancellationReceipt {
            booking_uuid: booking,
            policy,
            refunded_credits,
        })
    }

    async fn load(
        &self,
        booking: BookingUuid,
    ) -> Result<crate::bookings::Booking, CancellationError> {
        match with_deadline(self.call_timeout, self.bookings.get(booking)).await? {
            Ok(record) => Ok(record),
            Err(crate::bookings::RepositoryError::NotFound) => Err(CancellationError::NotFound),
            Err(error) => Err(UnexpectedFailure::Bookings(error).into()),
        }
    }

    async fn revert_to_confirmed(&self, booking: BookingUuid) {
        let reverted = with_deadline(
            self.call_timeout,
            self.bookings.set_status(booking, BookingStatus::Confirmed),
        )
        .await
        .and_then(|result| result.map_err(UnexpectedFailure::Bookings));

        if let Err(error) = reverted {
            warn!(booking_uuid = %booking, %error, "failed to revert booking to confirmed");
        }
    }
}
