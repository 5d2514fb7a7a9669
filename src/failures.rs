//! Failures outside the typed booking outcomes.
//!
//! The confirmation and cancellation workflows each expose a small set of
//! typed, expected failures that callers branch on. Everything else — a
//! collaborator erroring, timing out, or a slot time that cannot be
//! resolved — lands here, is surfaced to the user as a generic "please
//! retry" error, and never mutates draft or booking state.

use std::time::Duration;

use thiserror::Error;

use crate::{
    availability::AvailabilityError,
    bookings::RepositoryError,
    credits::{CreditsError, LedgerError},
    drafts::DraftStoreError,
};

/// Default deadline for a single collaborator call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// A failure outside the typed confirmation and cancellation outcomes.
///
/// Retryable from the caller's point of view; none of these leave partial
/// pipeline state behind.
#[derive(Debug, Error)]
pub enum UnexpectedFailure {
    /// A collaborator call exceeded its deadline.
    #[error("collaborator call exceeded {0:?}")]
    Timeout(Duration),

    /// The availability source failed.
    #[error("availability check failed")]
    Availability(#[source] AvailabilityError),

    /// The credit ledger failed.
    #[error("credit ledger call failed")]
    Ledger(#[source] LedgerError),

    /// The bookings repository failed.
    #[error("bookings repository call failed")]
    Bookings(#[source] RepositoryError),

    /// A slot's civil time could not be resolved to an instant.
    #[error("slot time could not be resolved to an instant")]
    SlotTime(#[source] jiff::Error),

    /// Refund arithmetic failed.
    #[error("refund arithmetic failed")]
    Arithmetic(#[source] CreditsError),

    /// The draft store could not be cleared after a commit.
    #[error("draft store write failed")]
    Draft(#[source] DraftStoreError),
}

/// Await `fut` under `limit`, mapping a timeout to [`UnexpectedFailure::Timeout`].
pub(crate) async fn with_deadline<F>(
    limit: Duration,
    fut: F,
) -> Result<F::Output, UnexpectedFailure>
where
    F: Future,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_elapsed| UnexpectedFailure::Timeout(limit))
}
