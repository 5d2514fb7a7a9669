//! Authentication session collaborator.
//!
//! The pipeline never manages sessions itself; it asks this collaborator
//! whether the acting user is signed in. The redirect-with-return-path
//! convention around an `AuthRequired` failure is handled by the caller
//! together with [`DraftStore::mark_resume`](crate::drafts::DraftStore::mark_resume).

use async_trait::async_trait;
use mockall::automock;

/// The acting user's authentication state.
#[automock]
#[async_trait]
pub trait AuthSession: Send + Sync {
    /// Whether the acting user is currently authenticated.
    async fn is_authenticated(&self) -> bool;
}
