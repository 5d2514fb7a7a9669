//! Instructor snapshot metadata.

use serde::{Deserialize, Serialize};

use crate::uuids::TypedUuid;

/// Instructor UUID
pub type InstructorUuid = TypedUuid<InstructorSnapshot>;

/// The instructor details a draft carries.
///
/// Snapshotted when the draft is created and never re-fetched: the draft
/// keeps quoting against the rate the user saw when they started selecting
/// slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructorSnapshot {
    pub uuid: InstructorUuid,
    pub name: String,
    pub avatar_url: Option<String>,
    pub credits_per_lesson: u64,
}
