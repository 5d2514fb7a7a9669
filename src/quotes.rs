//! Credit quotes.
//!
//! A quote is a derived view of a draft: the credits required to confirm
//! it, a flat per-slot breakdown, and a live availability verdict. It is
//! recomputed from the draft's current slot set on every change — any
//! caching is an optimization keyed on the slot-set signature, never the
//! source of truth.

use std::time::Duration;

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::{
    availability::{AvailabilitySource, SlotAvailability},
    drafts::BookingDraft,
    failures::{DEFAULT_CALL_TIMEOUT, UnexpectedFailure, with_deadline},
    slots::{Slot, slot_signature},
};

/// Whether a whole draft can currently be booked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    /// Every slot in the draft is still bookable.
    Available,
    /// At least one slot is no longer bookable.
    Unavailable,
}

/// The price of a single slot within a quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuoteLine {
    /// The quoted slot.
    pub slot: Slot,
    /// Credits charged for this slot.
    pub credits: u64,
}

/// A derived credit cost and availability preview for a draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    /// Total credits needed to confirm the draft.
    pub required_credits: u64,
    /// Live verdict for the draft's current slots.
    pub availability: Availability,
    /// Flat per-lesson pricing, one line per slot.
    pub lines: Vec<QuoteLine>,
}

/// Errors raised while computing a quote.
#[derive(Debug, Error)]
pub enum QuoteError {
    /// The draft has no slots; callers do not quote an empty draft.
    #[error("cannot quote a draft with no slots")]
    EmptyDraft,

    /// `credits_per_lesson × slot count` overflowed.
    #[error("required credits overflowed")]
    CreditsOverflow,

    /// The availability collaborator failed or timed out.
    #[error(transparent)]
    Failure(#[from] UnexpectedFailure),
}

/// Computes quotes against a live availability source.
#[derive(Debug)]
pub struct QuoteService<A> {
    availability: A,
    call_timeout: Duration,
}

impl<A: AvailabilitySource> QuoteService<A> {
    /// Create a service with the default collaborator deadline.
    #[must_use]
    pub fn new(availability: A) -> Self {
        Self {
            availability,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Override the collaborator deadline.
    #[must_use]
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Compute a fresh quote for `draft`.
    ///
    /// `required_credits` is the instructor's per-lesson rate times the
    /// slot count; every line carries the same flat rate.
    ///
    /// # Errors
    ///
    /// Returns [`QuoteError::EmptyDraft`] for a draft with no slots,
    /// [`QuoteError::CreditsOverflow`] if the total does not fit in a
    /// `u64`, or [`QuoteError::Failure`] if the availability check fails
    /// or times out.
    pub async fn quote(&self, draft: &BookingDraft) -> Result<Quote, QuoteError> {
        if draft.slots.is_empty() {
            return Err(QuoteError::EmptyDraft);
        }

        let per_lesson = draft.instructor.credits_per_lesson;

        let required_credits = per_lesson
            .checked_mul(draft.slots.len() as u64)
            .ok_or(QuoteError::CreditsOverflow)?;

        let lines = draft
            .slots
            .iter()
            .map(|slot| QuoteLine {
                slot: *slot,
                credits: per_lesson,
            })
            .collect();

        let verdicts = with_deadline(self.call_timeout, self.availability.check(draft.slots.clone()))
            .await?
            .map_err(UnexpectedFailure::Availability)?;

        let availability = if verdicts.iter().all(|v| v.available) {
            Availability::Available
        } else {
            Availability::Unavailable
        };

        Ok(Quote {
            required_credits,
            availability,
            lines,
        })
    }
}

/// Collect the slots an availability response marked unbookable.
pub fn unavailable_slots(verdicts: &[SlotAvailability]) -> Vec<Slot> {
    verdicts
        .iter()
        .filter(|v| !v.available)
        .map(|v| v.slot)
        .collect()
}

/// A signature-keyed cache wrapped around [`QuoteService`].
///
/// The key is the insertion-ordered slot-set signature, so the same slots
/// selected in a different order miss the cache and trigger a fresh (pure,
/// side-effect-free) fetch. Credits may change outside the draft — call
/// [`invalidate`](Self::invalidate) after a top-up so availability and
/// pricing are re-read before a retry.
#[derive(Debug)]
pub struct CachedQuotes<A> {
    service: QuoteService<A>,
    entries: FxHashMap<String, Quote>,
}

impl<A: AvailabilitySource> CachedQuotes<A> {
    /// Wrap a quote service in a signature-keyed cache.
    #[must_use]
    pub fn new(service: QuoteService<A>) -> Self {
        Self {
            service,
            entries: FxHashMap::default(),
        }
    }

    /// Return the cached quote for the draft's signature, or compute and
    /// cache a fresh one.
    ///
    /// # Errors
    ///
    /// Propagates any [`QuoteError`] from the underlying service.
    pub async fn quote(&mut self, draft: &BookingDraft) -> Result<Quote, QuoteError> {
        let signature = slot_signature(&draft.slots);

        if let Some(quote) = self.entries.get(&signature) {
            return Ok(quote.clone());
        }

        let quote = self.service.quote(draft).await?;
        self.entries.insert(signature, quote.clone());

        Ok(quote)
    }

    /// Drop every cached quote.
    pub fn invalidate(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use jiff::{
        Timestamp,
        civil::{date, time},
    };
    use testresult::TestResult;

    use crate::{
        availability::MockAvailabilitySource,
        drafts::DraftUuid,
        instructors::{InstructorSnapshot, InstructorUuid},
    };

    use super::*;

    fn draft_with(credits_per_lesson: u64, slots: Vec<Slot>) -> BookingDraft {
        BookingDraft {
            uuid: DraftUuid::generate(),
            instructor: InstructorSnapshot {
                uuid: InstructorUuid::generate(),
                name: "Sam Pryce".to_string(),
                avatar_url: None,
                credits_per_lesson,
            },
            slots,
            created_at: Timestamp::UNIX_EPOCH,
            updated_at: Timestamp::UNIX_EPOCH,
        }
    }

    fn slot(day: i8, hour: i8) -> Result<Slot, crate::slots::SlotError> {
        Slot::new(
            date(2026, 3, day),
            time(hour, 0, 0, 0),
            time(hour + 1, 0, 0, 0),
        )
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

    #[tokio::test]
    async fn required_credits_is_rate_times_slot_count() -> TestResult {
        let service = QuoteService::new(all_available());
        let draft = draft_with(10, vec![slot(2, 9)?, slot(2, 11)?]);

        let quote = service.quote(&draft).await?;

        assert_eq!(quote.required_credits, 20);
        assert_eq!(quote.availability, Availability::Available);
        assert_eq!(quote.lines.len(), 2);
        assert!(quote.lines.iter().all(|line| line.credits == 10));

        Ok(())
    }

    #[tokio::test]
    async fn one_unbookable_slot_makes_the_quote_unavailable() -> TestResult {
        let mut source = MockAvailabilitySource::new();
        let gone = slot(2, 9)?;

        source.expect_check().returning(move |slots| {
            Ok(slots
                .into_iter()
                .map(|slot| SlotAvailability {
                    slot,
                    available: slot != gone,
                })
                .collect())
        });

        let service = QuoteService::new(source);
        let draft = draft_with(10, vec![slot(2, 9)?, slot(2, 11)?]);

        let quote = service.quote(&draft).await?;

        assert_eq!(quote.availability, Availability::Unavailable);
        assert_eq!(quote.required_credits, 20);

        Ok(())
    }

    #[tokio::test]
    async fn empty_draft_is_rejected() -> TestResult {
        let service = QuoteService::new(all_available());
        let draft = draft_with(10, vec![]);

        let result = service.quote(&draft).await;

        assert!(
            matches!(result, Err(QuoteError::EmptyDraft)),
            "expected EmptyDraft, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn overflowing_total_is_rejected() -> TestResult {
        let service = QuoteService::new(all_available());
        let draft = draft_with(u64::MAX, vec![slot(2, 9)?, slot(2, 11)?]);

        let result = service.quote(&draft).await;

        assert!(
            matches!(result, Err(QuoteError::CreditsOverflow)),
            "expected CreditsOverflow, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn cache_serves_repeat_signatures_without_refetching() -> TestResult {
        let mut source = MockAvailabilitySource::new();

        source.expect_check().times(1).returning(|slots| {
            Ok(slots
                .into_iter()
                .map(|slot| SlotAvailability {
                    slot,
                    available: true,
                })
                .collect())
        });

        let mut cached = CachedQuotes::new(QuoteService::new(source));
        let draft = draft_with(10, vec![slot(2, 9)?, slot(2, 11)?]);

        let first = cached.quote(&draft).await?;
        let second = cached.quote(&draft).await?;

        assert_eq!(first, second);

        Ok(())
    }

    #[tokio::test]
    async fn reordered_slots_are_a_different_signature() -> TestResult {
        let mut source = MockAvailabilitySource::new();

        source.expect_check().times(2).returning(|slots| {
            Ok(slots
                .into_iter()
                .map(|slot| SlotAvailability {
                    slot,
                    available: true,
                })
                .collect())
        });

        let mut cached = CachedQuotes::new(QuoteService::new(source));

        let forward = draft_with(10, vec![slot(2, 9)?, slot(2, 11)?]);
        let reversed = draft_with(10, vec![slot(2, 11)?, slot(2, 9)?]);

        cached.quote(&forward).await?;
        cached.quote(&reversed).await?;

        Ok(())
    }

    #[tokio::test]
    async fn invalidate_forces_a_refetch() -> TestResult {
        let mut source = MockAvailabilitySource::new();

        source.expect_check().times(2).returning(|slots| {
            Ok(slots
                .into_iter()
                .map(|slot| SlotAvailability {
                    slot,
                    available: true,
                })
                .collect())
        });

        let mut cached = CachedQuotes::new(QuoteService::new(source));
        let draft = draft_with(10, vec![slot(2, 9)?]);

        cached.quote(&draft).await?;
        cached.invalidate();
        cached.quote(&draft).await?;

        Ok(())
    }

    #[tokio::test]
    async fn hung_availability_check_times_out() -> TestResult {
        struct HangingSource;

        #[async_trait::async_trait]
        impl AvailabilitySource for HangingSource {
            async fn check(
                &self,
                _slots: Vec<Slot>,
            ) -> Result<Vec<SlotAvailability>, crate::availability::AvailabilityError>
            {
                std::future::pending().await
            }
        }

        let service = QuoteService::new(HangingSource)
            .with_call_timeout(Duration::from_millis(5));
        let draft = draft_with(10, vec![slot(2, 9)?]);

        let result = service.quote(&draft).await;

        assert!(
            matches!(result, Err(QuoteError::Failure(UnexpectedFailure::Timeout(_)))),
            "expected Timeout, got {result:?}"
        );

        Ok(())
    }
}
