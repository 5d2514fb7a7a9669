//! Slot availability collaborator.
//!
//! Availability is owned by the scheduling side of the platform; this crate
//! only consumes a per-slot verdict, both when quoting and when re-checking
//! at confirmation time.

use async_trait::async_trait;
use mockall::automock;
use thiserror::Error;

use crate::slots::Slot;

/// Errors surfaced by the availability source.
#[derive(Debug, Error)]
pub enum AvailabilityError {
    /// The availability source could not be reached or failed internally.
    #[error("availability source unavailable: {0}")]
    Unavailable(String),
}

/// A verdict for a single slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotAvailability {
    /// The slot the verdict applies to.
    pub slot: Slot,
    /// Whether the slot can still be booked.
    pub available: bool,
}

/// The external check for whether slots can still be booked.
#[automock]
#[async_trait]
pub trait AvailabilitySource: Send + Sync {
    /// Check each slot against the instructor's live calendar.
    async fn check(&self, slots: Vec<Slot>) -> Result<Vec<SlotAvailability>, AvailabilityError>;
}
