//! Confirmed bookings.
//!
//! A successful confirmation books each slot as an independent lesson
//! reservation. The booking record is what the cancellation engine reads:
//! the start instant drives the refund tier, the credit cost drives the
//! refund amount, and the status carries the lesson's state machine.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use jiff::Timestamp;
use mockall::automock;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{instructors::InstructorUuid, slots::Slot, uuids::TypedUuid};

/// Booking UUID
pub type BookingUuid = TypedUuid<Booking>;

/// A confirmed lesson reservation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub uuid: BookingUuid,
    pub instructor_uuid: InstructorUuid,
    pub slot: Slot,
    pub credits_cost: u64,
    pub starts_at: Timestamp,
    pub status: BookingStatus,
    pub booked_at: Timestamp,
}

/// The state machine of a booked lesson.
///
/// `Cancelling` is transient: it is only held while a cancellation call is
/// in flight, and reverts to `Confirmed` if that call fails. `Completed` is
/// terminal and time-driven, outside the cancellation engine's scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingStatus {
    /// Booked and upcoming.
    Confirmed,
    /// A cancellation call is in flight.
    Cancelling,
    /// Cancelled; any refund has been issued.
    Cancelled,
    /// The lesson took place.
    Completed,
}

impl BookingStatus {
    /// Whether the state machine permits moving from `self` to `next`.
    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        matches!(
            (self, next),
            (BookingStatus::Confirmed, BookingStatus::Cancelling)
                | (BookingStatus::Cancelling, BookingStatus::Cancelled)
                | (BookingStatus::Cancelling, BookingStatus::Confirmed)
                | (BookingStatus::Confirmed, BookingStatus::Completed)
        )
    }
}

/// Errors surfaced by a bookings repository.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// No booking with the given id.
    #[error("booking not found")]
    NotFound,

    /// A booking with the given id already exists.
    #[error("booking already exists")]
    AlreadyExists,

    /// The requested status change is not a legal state-machine transition.
    #[error("cannot move booking from {from:?} to {to:?}")]
    InvalidTransition {
        /// The booking's current status.
        from: BookingStatus,
        /// The rejected target status.
        to: BookingStatus,
    },

    /// The backing store failed.
    #[error("bookings storage failed: {0}")]
    Storage(String),
}

/// Storage for committed bookings.
#[automock]
#[async_trait]
pub trait BookingsRepository: Send + Sync {
    /// Persist a new booking.
    async fn create(&self, booking: Booking) -> Result<(), RepositoryError>;

    /// Fetch a booking by id.
    async fn get(&self, uuid: BookingUuid) -> Result<Booking, RepositoryError>;

    /// Move a booking to `status`, enforcing the state machine.
    async fn set_status(
        &self,
        uuid: BookingUuid,
        status: BookingStatus,
    ) -> Result<Booking, RepositoryError>;
}

#[async_trait]
impl<T: BookingsRepository + ?Sized> BookingsRepository for std::sync::Arc<T> {
    async fn create(&self, booking: Booking) -> Result<(), RepositoryError> {
        (**self).create(booking).await
    }

    async fn get(&self, uuid: BookingUuid) -> Result<Booking, RepositoryError> {
        (**self).get(uuid).await
    }

    async fn set_status(
        &self,
        uuid: BookingUuid,
        status: BookingStatus,
    ) -> Result<Booking, RepositoryError> {
        (**self).set_status(uuid, status).await
    }
}

/// An in-process bookings store for tests and demos.
#[derive(Debug, Default)]
pub struct InMemoryBookingsRepository {
    bookings: Mutex<FxHashMap<BookingUuid, Booking>>,
}

impl InMemoryBookingsRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BookingsRepository for InMemoryBookingsRepository {
    async fn create(&self, booking: Booking) -> Result<(), RepositoryError> {
        let mut bookings = self.bookings.lock().unwrap_or_else(PoisonError::into_inner);

        if bookings.contains_key(&booking.uuid) {
            return Err(RepositoryError::AlreadyExists);
        }

        bookings.insert(booking.uuid, booking);

        Ok(())
    }

    async fn get(&self, uuid: BookingUuid) -> Result<Booking, RepositoryError> {
        let bookings = self.bookings.lock().unwrap_or_else(PoisonError::into_inner);

        bookings.get(&uuid).cloned().ok_or(RepositoryError::NotFound)
    }

    async fn set_status(
        &self,
        uuid: BookingUuid,
        status: BookingStatus,
    ) -> Result<Booking, RepositoryError> {
        let mut bookings = self.bookings.lock().unwrap_or_else(PoisonError::into_inner);

        let booking = bookings.get_mut(&uuid).ok_or(RepositoryError::NotFound)?;

        if !booking.status.can_transition_to(status) {
            return Err(RepositoryError::InvalidTransition {
                from: booking.status,
                to: status,
            });
        }

        booking.status = status;

        Ok(booking.clone())
    }
}
