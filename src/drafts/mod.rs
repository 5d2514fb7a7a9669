//! Booking drafts.
//!
//! A draft is the user's uncommitted slot selection for one instructor. It
//! lives on the acting user's device, survives page reloads through a
//! [`DraftPersistence`] adapter, and collapses to absence the moment it has
//! no slots left. At most one draft exists at a time; selecting slots for a
//! different instructor replaces it wholesale.

pub mod persistence;

use jiff::Timestamp;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::{instructors::InstructorSnapshot, slots::Slot, uuids::TypedUuid};

pub use persistence::{DraftPersistence, InMemoryPersistence, JsonFilePersistence, PersistenceError};

/// Draft UUID
pub type DraftUuid = TypedUuid<BookingDraft>;

/// One uncommitted multi-slot booking request for a single instructor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingDraft {
    pub uuid: DraftUuid,
    pub instructor: InstructorSnapshot,
    pub slots: Vec<Slot>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Errors surfaced by the draft store.
#[derive(Debug, Error)]
pub enum DraftStoreError {
    /// The persistence adapter failed to write or clear.
    #[error("draft persistence failed")]
    Persistence(#[from] PersistenceError),
}

/// The state container for the in-progress draft and its review panel.
///
/// All operations are idempotent with respect to repeated identical calls,
/// and absence of a draft is a valid state rather than an error. Every
/// mutation is written through to the persistence adapter before it
/// returns.
#[derive(Debug)]
pub struct DraftStore<P> {
    persistence: P,
    draft: Option<BookingDraft>,
    summary_open: bool,
}

impl<P: DraftPersistence> DraftStore<P> {
    /// Create a store, loading any previously persisted draft.
    ///
    /// A corrupt or unreadable persisted draft degrades to absence rather
    /// than failing construction; the user loses a stale selection, not the
    /// ability to book.
    pub fn new(persistence: P) -> Self {
        let draft = match persistence.load() {
            Ok(draft) => draft,
            Err(error) => {
                warn!(%error, "failed to load persisted draft, starting empty");
                None
            }
        };

        Self {
            persistence,
            draft,
            summary_open: false,
        }
    }

    /// The current draft, if any.
    pub fn draft(&self) -> Option<&BookingDraft> {
        self.draft.as_ref()
    }

    /// Whether the review panel is currently visible.
    pub fn summary_open(&self) -> bool {
        self.summary_open
    }

    /// Show the review panel.
    pub fn open_summary(&mut self) {
        self.summary_open = true;
    }

    /// Hide the review panel.
    pub fn close_summary(&mut self) {
        self.summary_open = false;
    }

    /// Replace the draft's slot selection for `instructor`.
    ///
    /// Starts a new draft when none exists or when `instructor` differs
    /// from the current draft's instructor (the old draft is discarded,
    /// never merged). Duplicate slot keys are dropped. An empty resulting
    /// selection clears the draft entirely.
    ///
    /// # Errors
    ///
    /// Returns [`DraftStoreError::Persistence`] if the new state cannot be
    /// written through; the in-memory state is already updated when that
    /// happens.
    pub fn set_slots(
        &mut self,
        instructor: InstructorSnapshot,
        slots: Vec<Slot>,
        now: Timestamp,
    ) -> Result<(), DraftStoreError> {
        let slots = dedupe_slots(slots);

        if slots.is_empty() {
            return self.clear();
        }

        match &mut self.draft {
            Some(draft) if draft.instructor.uuid == instructor.uuid => {
                draft.slots = slots;
                draft.updated_at = now;
            }
            _ => {
                self.draft = Some(BookingDraft {
                    uuid: DraftUuid::generate(),
                    instructor,
                    slots,
                    created_at: now,
                    updated_at: now,
                });
            }
        }

        self.persist()
    }

    /// Remove one slot by key.
    ///
    /// No-op when there is no draft or the key is not present. Removing the
    /// last slot clears the draft.
    ///
    /// # Errors
    ///
    /// Returns [`DraftStoreError::Persistence`] if the new state cannot be
    /// written through.
    pub fn remove_slot(&mut self, slot: &Slot, now: Timestamp) -> Result<(), DraftStoreError> {
        let Some(draft) = &mut self.draft else {
            return Ok(());
        };

        let before = draft.slots.len();
        draft.slots.retain(|s| s != slot);

        if draft.slots.len() == before {
            return Ok(());
        }

        if draft.slots.is_empty() {
            return self.clear();
        }

        draft.updated_at = now;

        self.persist()
    }

    /// Discard the draft and its persisted copy.
    ///
    /// # Errors
    ///
    /// Returns [`DraftStoreError::Persistence`] if the persisted copy
    /// cannot be cleared.
    pub fn clear(&mut self) -> Result<(), DraftStoreError> {
        self.draft = None;
        self.persistence.clear()?;

        Ok(())
    }

    /// Set the one-shot resume flag.
    ///
    /// Called before redirecting away to authenticate, so the review panel
    /// reopens exactly once when the user returns.
    ///
    /// # Errors
    ///
    /// Returns [`DraftStoreError::Persistence`] if the flag cannot be
    /// written.
    pub fn mark_resume(&mut self) -> Result<(), DraftStoreError> {
        self.persistence.set_resume()?;

        Ok(())
    }

    /// Consume the resume flag, reopening the review panel if it was set.
    ///
    /// Returns whether the flag was set. Once consumed, subsequent calls
    /// return `false` until [`mark_resume`](Self::mark_resume) runs again.
    ///
    /// # Errors
    ///
    /// Returns [`DraftStoreError::Persistence`] if the flag cannot be read
    /// or cleared.
    pub fn resume_summary(&mut self) -> Result<bool, DraftStoreError> {
        let resume = self.persistence.take_resume()?;

        if resume {
            self.summary_open = true;
        }

        Ok(resume)
    }

    fn persist(&mut self) -> Result<(), DraftStoreError> {
        if let Some(draft) = &self.draft {
            self.persistence.save(draft)?;
        }

        Ok(())
    }
}

/// Drop duplicate slot keys, keeping first-seen order.
fn dedupe_slots(slots: Vec<Slot>) -> Vec<Slot> {
    let mut seen = FxHashSet::default();

    slots.into_iter().filter(|slot| seen.insert(*slot)).collect()
}
