//! # Prelude
//!
//! Re-exports commonly used types and traits for convenience.
//!
//! ## Usage
//!
//! ```rust
//! use federated_app_controller::prelude::*;
//! ```
//!
//! This brings into scope:
//! - Resource specs and records
//! - Provider traits (IdentityDirectory, Provisioning) and `RemoteError`
//! - Controllers, the `ResourceController` trait and `refresh`
//! - `ControllerConfig`

// Resource types - what the host authors and persists
pub use crate::resource::{
    ApplicationRecord, ApplicationSpec, AttachmentKey, AttachmentRecord, AttachmentSpec,
    ProvisioningCredentials, ReconciledRecord,
};

// Provider traits - needed for implementing clients
pub use crate::provider::{IdentityDirectory, Provisioning, RemoteError, RevocationState};

// Controllers - core reconciliation functionality
pub use crate::controller::{
    refresh, ApplicationController, AttachmentController, ReconcileError, ResourceController,
};

// Config types - for configuration management
pub use crate::config::ControllerConfig;

pub use tokio_util::sync::CancellationToken;
