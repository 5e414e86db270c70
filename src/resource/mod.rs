//! # Resources
//!
//! Desired-state specs authored by the host and the reconciled records the
//! host persists between passes.

pub mod application;
pub mod attachment;
pub mod credentials;
pub mod schema;

pub use application::{ApplicationRecord, ApplicationSpec};
pub use attachment::{AttachmentKey, AttachmentRecord, AttachmentSpec};
pub use credentials::ProvisioningCredentials;

/// A persisted record that can be located remotely and refreshed in place
pub trait ReconciledRecord: Clone + Send + Sync {
    /// Remote identity used by read, update and delete
    type Key: Send + Sync + std::fmt::Display;

    /// Remote identity, `None` when the record has never been created or was cleared
    fn key(&self) -> Option<Self::Key>;

    /// Fold freshly observed remote state into this record
    fn absorb(&mut self, observed: Self);
}
