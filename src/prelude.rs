//! Clutch prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    availability::{AvailabilityError, AvailabilitySource, SlotAvailability},
    bookings::{
        Booking, BookingStatus, BookingUuid, BookingsRepository, InMemoryBookingsRepository,
        RepositoryError,
    },
    cancellation::{
        CancellationError, CancellationPolicy, CancellationReceipt, CancellationService,
        SeverityTier, compute_policy,
    },
    confirmation::{Confirmation, ConfirmationError, ConfirmationService},
    credits::{CreditLedger, CreditsError, LedgerError, percent_of_credits},
    drafts::{
        BookingDraft, DraftPersistence, DraftStore, DraftStoreError, DraftUuid,
        InMemoryPersistence, JsonFilePersistence, PersistenceError,
    },
    failures::{DEFAULT_CALL_TIMEOUT, UnexpectedFailure},
    instructors::{InstructorSnapshot, InstructorUuid},
    quotes::{
        Availability, CachedQuotes, Quote, QuoteError, QuoteLine, QuoteService, unavailable_slots,
    },
    sessions::AuthSession,
    slots::{Slot, SlotError, slot_signature},
    uuids::TypedUuid,
};
