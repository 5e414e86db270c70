//! # Controller
//!
//! Resource controllers for the federated application integration.
//!
//! - `application`: application integration and its provisioning credentials
//! - `attachment`: a user's membership in an application
//! - `backoff`: Fibonacci backoff for the consistency waits
//! - `error`: errors surfaced to the host
//! - `validation`: spec checks run before any remote call
//! - `wait`: cancellable remote-call guard, revocation barrier and metadata poll
//!
//! The host drives each resource through one call per reconciliation pass.
//! Nothing here retries failed calls or schedules follow-up work.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::observability::metrics;
use crate::resource::ReconciledRecord;

pub mod application;
pub mod attachment;
pub mod backoff;
pub mod error;
pub mod validation;
mod wait;

pub use application::ApplicationController;
pub use attachment::AttachmentController;
pub use error::{Operation, ReconcileError, ResourceKind, Stage};

/// Create, read, update and delete for one kind of remote resource
///
/// Read returns `Ok(None)` when the remote object no longer exists; that is
/// drift for the host to act on, not an error.
#[async_trait]
pub trait ResourceController: Send + Sync {
    const KIND: ResourceKind;

    /// Desired state authored by the host
    type Spec: Send + Sync;
    /// Reconciled state persisted by the host
    type Record: ReconciledRecord;

    async fn create(
        &self,
        spec: &Self::Spec,
        cancel: &CancellationToken,
    ) -> Result<Self::Record, ReconcileError>;

    async fn read(
        &self,
        key: &<Self::Record as ReconciledRecord>::Key,
        cancel: &CancellationToken,
    ) -> Result<Option<Self::Record>, ReconcileError>;

    async fn update(
        &self,
        key: &<Self::Record as ReconciledRecord>::Key,
        spec: &Self::Spec,
        cancel: &CancellationToken,
    ) -> Result<Self::Record, ReconcileError>;

    async fn delete(
        &self,
        key: &<Self::Record as ReconciledRecord>::Key,
        cancel: &CancellationToken,
    ) -> Result<(), ReconcileError>;
}

/// Refresh a persisted record from the remote side
///
/// A record whose remote object is gone is cleared (set to `None`) and the
/// drift is logged and counted. Returns whether the record still exists.
///
/// # Errors
///
/// Any read failure other than the remote object being absent. The record is
/// left untouched in that case.
pub async fn refresh<C>(
    controller: &C,
    record: &mut Option<C::Record>,
    cancel: &CancellationToken,
) -> Result<bool, ReconcileError>
where
    C: ResourceController,
{
    let Some(key) = record.as_ref().and_then(|current| current.key()) else {
        *record = None;
        return Ok(false);
    };

    match controller.read(&key, cancel).await? {
        Some(observed) => {
            if let Some(current) = record.as_mut() {
                current.absorb(observed);
            }
            Ok(true)
        }
        None => {
            warn!(
                resource = C::KIND.as_str(),
                remote_id = %key,
                "{} {} was removed outside of reconciliation, clearing local record",
                C::KIND,
                key
            );
            metrics::increment_drift_detected(C::KIND.as_str());
            *record = None;
            Ok(false)
        }
    }
}
