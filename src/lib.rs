//! Clutch
//!
//! Clutch is the lesson-booking pipeline for a driving-instructor
//! marketplace: slot selection accumulates into a persisted draft, the
//! draft is quoted in credits against a live availability check, a typed
//! confirmation workflow commits it into independent lesson bookings, and
//! a time-tiered policy engine governs cancellation refunds.
//!
//! The crate is an in-process module consumed by a UI layer. The credit
//! ledger, authentication session, availability source and local
//! persistence are collaborators injected behind small traits.

pub mod availability;
pub mod bookings;
pub mod cancellation;
pub mod confirmation;
pub mod credits;
pub mod drafts;
pub mod failures;
pub mod instructors;
pub mod prelude;
pub mod quotes;
pub mod sessions;
pub mod slots;
pub mod uuids;
