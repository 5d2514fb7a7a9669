//! Confirmation workflow.
//!
//! Turns the current draft into committed bookings: validates the session,
//! the credit balance and slot availability in that order, debits the
//! ledger, then books each slot as an independent reservation. The first
//! failing check wins, and every failure path leaves the draft, its slots
//! and the persisted state untouched.

use std::time::Duration;

use jiff::{Timestamp, tz::TimeZone};
use thiserror::Error;
use tracing::{Span, info};

use crate::{
    availability::AvailabilitySource,
    bookings::{Booking, BookingStatus, BookingUuid, BookingsRepository},
    credits::CreditLedger,
    drafts::{DraftPersistence, DraftStore},
    failures::{DEFAULT_CALL_TIMEOUT, UnexpectedFailure, with_deadline},
    quotes::unavailable_slots,
    sessions::AuthSession,
    slots::Slot,
};

/// The result of a successful confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    /// One identifier per booked slot, in the draft's slot order.
    pub booking_uuids: Vec<BookingUuid>,
}

/// The typed outcomes of a failed confirmation.
///
/// `AuthRequired`, `InsufficientCredits` and `SlotsUnavailable` are the
/// three expected failures callers branch on; `Failure` is everything else,
/// surfaced as a generic retryable error. `EmptyDraft` marks a violated
/// caller contract — confirmation is never invoked without a draft.
#[derive(Debug, Error)]
pub enum ConfirmationError {
    /// There is no draft to confirm.
    #[error("no draft to confirm")]
    EmptyDraft,

    /// The user is not signed in. The caller preserves the draft, marks
    /// the resume flag and redirects to authentication.
    #[error("authentication required before confirming")]
    AuthRequired,

    /// The balance does not cover the quote. The caller presents a top-up
    /// flow and refreshes the quote before retrying.
    #[error("{missing} more credits are required")]
    InsufficientCredits {
        /// How many credits short the balance is. Always positive.
        missing: u64,
    },

    /// One or more slots were taken since the quote. The draft is kept;
    /// the user may still want the remaining slots.
    #[error("{} slot(s) are no longer available", .0.len())]
    SlotsUnavailable(Vec<Slot>),

    /// A collaborator failed or timed out; retryable, nothing committed.
    #[error(transparent)]
    Failure(#[from] UnexpectedFailure),
}

/// Commits drafts into bookings.
#[derive(Debug)]
pub struct ConfirmationService<S, L, A, R> {
    sessions: S,
    ledger: L,
    availability: A,
    bookings: R,
    tz: TimeZone,
    call_timeout: Duration,
}

impl<S, L, A, R> ConfirmationService<S, L, A, R>
where
    S: AuthSession,
    L: CreditLedger,
    A: AvailabilitySource,
    R: BookingsRepository,
{
    /// Create a service booking in UTC with the default collaborator
    /// deadline.
    #[must_use]
    pub fn new(sessions: S, ledger: L, availability: A, bookings: R) -> Self {
        Self {
            sessions,
            ledger,
            availability,
            bookings,
            tz: TimeZone::UTC,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Set the time zone that anchors slot times to instants.
    #[must_use]
    pub fn with_timezone(mut self, tz: TimeZone) -> Self {
        self.tz = tz;
        self
    }

    /// Override the collaborator deadline.
    #[must_use]
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Confirm the store's current draft against `required_credits` from
    /// the latest quote.
    ///
    /// Validation order, first failing check wins: authentication, then
    /// credit balance, then a fresh availability check. On success the
    /// ledger is debited once for the total, one booking is committed per
    /// slot, the draft is cleared and the review panel closed.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfirmationError`]; only the success path mutates the
    /// store or the ledger, except that a repository failure after the
    /// debit surfaces as [`ConfirmationError::Failure`] with the debit
    /// already taken (the ledger's idempotent refund is the recovery path).
    #[tracing::instrument(
        name = "booking.confirm",
        skip(self, store),
        fields(draft_uuid = tracing::field::Empty, slot_count = tracing::field::Empty),
        err
    )]
    pub async fn confirm<P: DraftPersistence>(
        &self,
        store: &mut DraftStore<P>,
        required_credits: u64,
        now: Timestamp,
    ) -> Result<Confirmation, ConfirmationError> {
        let (draft_uuid, instructor_uuid, per_lesson, slots) = {
            let Some(draft) = store.draft() else {
                return Err(ConfirmationError::EmptyDraft);
            };

            if draft.slots.is_empty() {
                return Err(ConfirmationError::EmptyDraft);
            }

            (
                draft.uuid,
                draft.instructor.uuid,
                draft.instructor.credits_per_lesson,
                draft.slots.clone(),
            )
        };

        let span = Span::current();
        span.record("draft_uuid", tracing::field::display(draft_uuid));
        span.record("slot_count", tracing::field::display(slots.len()));

        let authenticated = with_deadline(self.call_timeout, self.sessions.is_authenticated()).await?;

        if !authenticated {
            return Err(ConfirmationError::AuthRequired);
        }

        let available_credits = with_deadline(self.call_timeout, self.ledger.available_credits())
            .await?
            .map_err(UnexpectedFailure::Ledger)?;

        if available_credits < required_credits {
            return Err(ConfirmationError::InsufficientCredits {
                missing: required_credits - available_credits,
            });
        }

        let verdicts = with_deadline(self.call_timeout, self.availability.check(slots.clone()))
            .await?
            .map_err(UnexpectedFailure::Availability)?;

        let gone = unavailable_slots(&verdicts);

        if !gone.is_empty() {
            return Err(ConfirmationError::SlotsUnavailable(gone));
        }

        // Resolve every instant before touching the ledger, so a bad slot
        // time cannot strand a debit.
        let mut pending = Vec::with_capacity(slots.len());

        for slot in slots {
            let starts_at = slot
                .start_in(&self.tz)
                .map_err(UnexpectedFailure::SlotTime)?;

            pending.push(Booking {
                uuid: BookingUuid::generate(),
                instructor_uuid,
                slot,
                credits_cost: per_lesson,
                starts_at,
                status: BookingStatus::Confirmed,
                booked_at: now,
            });
        }

        with_deadline(self.call_timeout, self.ledger.debit(required_credits))
            .await?
            .map_err(UnexpectedFailure::Ledger)?;

        let mut booking_uuids = Vec::with_capacity(pending.len());

        for booking in pending {
            let uuid = booking.uuid;

            with_deadline(self.call_timeout, self.bookings.create(booking))
                .await?
                .map_err(UnexpectedFailure::Bookings)?;

            booking_uuids.push(uuid);
        }

        store.clear().map_err(UnexpectedFailure::Draft)?;
        store.close_summary();

        info!(
            %draft_uuid,
            bookings = booking_uuids.len(),
            credits = required_credits,
            "confirmed booking draft"
        );

        Ok(Confirmation { booking_uuids })
    }
}

#[cfg(test)]
mod tests {
    use jiff::civil::{date, time};
    use testresult::TestResult;

    use crate::{
        availability::{MockAvailabilitySource, SlotAvailability},
        bookings::MockBookingsRepository,
        credits::MockCreditLedger,
        drafts::InMemoryPersistence,
        instructors::{InstructorSnapshot, InstructorUuid},
        sessions::MockAuthSession,
    };

    use super::*;

    fn instructor(credits_per_lesson: u64) -> InstructorSnapshot {
        InstructorSnapshot {
            uuid: InstructorUuid::generate(),
            name: "Sam Pryce".to_string(),
            avatar_url: None,
            credits_per_lesson,
        }
    }

    fn slot(day: i8, hour: i8) -> Result<Slot, crate::slots::SlotError> {
        Slot::new(
            date(2026, 3, day),
            time(hour, 0, 0, 0),
            time(hour + 1, 0, 0, 0),
        )
    }

    fn now() -> Timestamp {
        Timestamp::UNIX_EPOCH
    }

    fn store_with_slots(
        slots: Vec<Slot>,
    ) -> Result<DraftStore<InMemoryPersistence>, crate::drafts::DraftStoreError> {
        let mut store = DraftStore::new(InMemoryPersistence::default());
        store.set_slots(instructor(10), slots, now())?;

        Ok(store)
    }

    fn signed_in(value: bool) -> MockAuthSession {
        let mut sessions = MockAuthSession::new();
        sessions.expect_is_authenticated().returning(move || value);

        sessions
    }

    fn ledger_with(balance: u64) -> MockCreditLedger {
        let mut ledger = MockCreditLedger::new();
        ledger
            .expect_available_credits()
            .returning(move || Ok(balance));
        ledger.expect_debit().returning(|_| Ok(()));

        ledger
    }

    fn all_available() -> MockAvailabilitySource {
        let mut source = MockAvailabilitySource::new();

        source.expect_check().returning(|slots| {
            Ok(slots
                .into_iter()
                .map(|slot| SlotAvailability {
                    slot,
                    available: true,
                })
                .collect())
        });

        source
    }

    fn accepting_repository() -> MockBookingsRepository {
        let mut bookings = MockBookingsRepository::new();
        bookings.expect_create().returning(|_| Ok(()));

        bookings
    }

    #[tokio::test]
    async fn unauthenticated_wins_over_every_other_failure() -> TestResult {
        // Zero balance and no availability expectations: neither check may run.
        let service = ConfirmationService::new(
            signed_in(false),
            MockCreditLedger::new(),
            MockAvailabilitySource::new(),
            MockBookingsRepository::new(),
        );

        let mut store = store_with_slots(vec![slot(2, 9)?, slot(2, 11)?])?;

        let result = service.confirm(&mut store, 20, now()).await;

        assert!(
            matches!(result, Err(ConfirmationError::AuthRequired)),
            "expected AuthRequired, got {result:?}"
        );
        assert!(store.draft().is_some(), "draft must be preserved");

        Ok(())
    }

    #[tokio::test]
    async fn short_balance_reports_the_missing_credits() -> TestResult {
        let mut ledger = MockCreditLedger::new();
        ledger.expect_available_credits().returning(|| Ok(15));

        let service = ConfirmationService::new(
            signed_in(true),
            ledger,
            MockAvailabilitySource::new(),
            MockBookingsRepository::new(),
        );

        let mut store = store_with_slots(vec![slot(2, 9)?, slot(2, 11)?])?;

        let result = service.confirm(&mut store, 20, now()).await;

        assert!(
            matches!(
                result,
                Err(ConfirmationError::InsufficientCredits { missing: 5 })
            ),
            "expected InsufficientCredits missing 5, got {result:?}"
        );
        assert!(store.draft().is_some(), "draft must be preserved");

        Ok(())
    }

    #[tokio::test]
    async fn taken_slots_are_reported_and_the_draft_kept() -> TestResult {
        let gone = slot(2, 9)?;
        let mut source = MockAvailabilitySource::new();

        source.expect_check().returning(move |slots| {
            Ok(slots
                .into_iter()
                .map(|slot| SlotAvailability {
                    slot,
                    available: slot != gone,
                })
                .collect())
        });

        let service = ConfirmationService::new(
            signed_in(true),
            ledger_with(100),
            source,
            MockBookingsRepository::new(),
        );

        let mut store = store_with_slots(vec![slot(2, 9)?, slot(2, 11)?])?;

        let result = service.confirm(&mut store, 20, now()).await;

        match result {
            Err(ConfirmationError::SlotsUnavailable(slots)) => {
                assert_eq!(slots, vec![gone]);
            }
            other => panic!("expected SlotsUnavailable, got {other:?}"),
        }

        assert!(store.draft().is_some(), "draft must be preserved");
        assert_eq!(
            store.draft().map(|d| d.slots.len()),
            Some(2),
            "no slot may be dropped from the draft"
        );

        Ok(())
    }

    #[tokio::test]
    async fn success_books_each_slot_and_clears_the_draft() -> TestResult {
        let service = ConfirmationService::new(
            signed_in(true),
            ledger_with(25),
            all_available(),
            accepting_repository(),
        );

        let mut store = store_with_slots(vec![slot(2, 9)?, slot(2, 11)?])?;
        store.open_summary();

        let confirmation = service.confirm(&mut store, 20, now()).await?;

        assert_eq!(confirmation.booking_uuids.len(), 2);
        assert!(store.draft().is_none(), "draft must be cleared");
        assert!(!store.summary_open(), "summary must be closed");

        Ok(())
    }

    #[tokio::test]
    async fn debit_happens_before_any_booking_is_written() -> TestResult {
        let mut ledger = MockCreditLedger::new();
        ledger.expect_available_credits().returning(|| Ok(25));
        ledger
            .expect_debit()
            .returning(|_| Err(crate::credits::LedgerError::Unavailable("down".into())));

        let mut bookings = MockBookingsRepository::new();
        bookings.expect_create().times(0);

        let service =
            ConfirmationService::new(signed_in(true), ledger, all_available(), bookings);

        let mut store = store_with_slots(vec![slot(2, 9)?, slot(2, 11)?])?;

        let result = service.confirm(&mut store, 20, now()).await;

        assert!(
            matches!(
                result,
                Err(ConfirmationError::Failure(UnexpectedFailure::Ledger(_)))
            ),
            "expected generic ledger failure, got {result:?}"
        );
        assert!(store.draft().is_some(), "draft must be preserved");

        Ok(())
    }

    #[tokio::test]
    async fn empty_store_is_rejected() {
        let service = ConfirmationService::new(
            MockAuthSession::new(),
            MockCreditLedger::new(),
            MockAvailabilitySource::new(),
            MockBookingsRepository::new(),
        );

        let mut store = DraftStore::new(InMemoryPersistence::default());

        let result = service.confirm(&mut store, 0, now()).await;

        assert!(
            matches!(result, Err(ConfirmationError::EmptyDraft)),
            "expected EmptyDraft, got {result:?}"
        );
    }
}
