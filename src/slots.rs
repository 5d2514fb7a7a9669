//! Lesson slots.
//!
//! A [`Slot`] is a candidate lesson time on an instructor's calendar: a
//! calendar date plus a start and end time of day. Slots carry no identity
//! beyond the (date, start, end) triple, which is also their key for
//! uniqueness within a draft.

use std::fmt;

use jiff::{
    Timestamp,
    civil::{Date, Time},
    tz::TimeZone,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when constructing a slot.
#[derive(Debug, Error)]
pub enum SlotError {
    /// The end time is not strictly after the start time.
    #[error("slot on {date} ends at {end} which is not after its start at {start}")]
    EndNotAfterStart {
        /// The slot's calendar date.
        date: Date,
        /// The offending start time.
        start: Time,
        /// The offending end time.
        end: Time,
    },
}

/// A candidate lesson time.
///
/// Equality, ordering and hashing all derive from the (date, start, end)
/// triple; two slots with the same triple are the same slot.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Slot {
    date: Date,
    start_time: Time,
    end_time: Time,
}

impl Slot {
    /// Create a new slot.
    ///
    /// # Errors
    ///
    /// Returns [`SlotError::EndNotAfterStart`] if `end_time` is not strictly
    /// after `start_time`.
    pub fn new(date: Date, start_time: Time, end_time: Time) -> Result<Self, SlotError> {
        if end_time <= start_time {
            return Err(SlotError::EndNotAfterStart {
                date,
                start: start_time,
                end: end_time,
            });
        }

        Ok(Self {
            date,
            start_time,
            end_time,
        })
    }

    /// The slot's calendar date.
    pub fn date(&self) -> Date {
        self.date
    }

    /// The time of day the lesson starts.
    pub fn start_time(&self) -> Time {
        self.start_time
    }

    /// The time of day the lesson ends.
    pub fn end_time(&self) -> Time {
        self.end_time
    }

    /// Resolve the slot's civil start to an instant in the given time zone.
    ///
    /// # Errors
    ///
    /// Returns a [`jiff::Error`] if the civil datetime cannot be resolved in
    /// `tz` (out-of-range datetimes).
    pub fn start_in(&self, tz: &TimeZone) -> Result<Timestamp, jiff::Error> {
        let start = self.date.to_datetime(self.start_time);

        Ok(start.to_zoned(tz.clone())?.timestamp())
    }
}

/// The slot key, `YYYY-MM-DD/HH:MM:SS-HH:MM:SS`.
impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}-{}", self.date, self.start_time, self.end_time)
    }
}

/// Concatenate the slot keys of a slot set, in insertion order.
///
/// Used as the identity of a slot set for quote caching. The signature is
/// deliberately order-sensitive: the same slots added in a different order
/// produce a different signature and a fresh (pure, side-effect-free) quote.
pub fn slot_signature(slots: &[Slot]) -> String {
    let keys: Vec<String> = slots.iter().map(ToString::to_string).collect();

    keys.join("|")
}
