//! # Remote Call Guard and Consistency Waits
//!
//! `OperationScope` wraps every remote call and sleep of one controller
//! operation. Each await is raced against the operation's cancellation token
//! and, for remote calls, an optional per-call timeout. Metrics and logs for
//! the call are recorded through `provider::common`.
//!
//! The two consistency waits live here as well:
//! - `await_revocation` polls revocation state with Fibonacci backoff until
//!   the provisioning service reports the revoke complete, falling back to a
//!   fixed settle delay when the service cannot report state
//! - `fetch_metadata` re-fetches an empty signed metadata document a bounded
//!   number of times

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ControllerConfig;
use crate::controller::backoff::FibonacciBackoff;
use crate::controller::error::{Operation, ReconcileError, ResourceKind, Stage};
use crate::observability::metrics;
use crate::provider::common::{self, CallOutcome};
use crate::provider::{IdentityDirectory, Provisioning, RemoteError, RevocationState};

/// Cancellation, timeout and reporting context of one controller operation
#[derive(Debug)]
pub(crate) struct OperationScope<'a> {
    resource: ResourceKind,
    operation: Operation,
    cancel: &'a CancellationToken,
    call_timeout: Option<Duration>,
    remote_id: Option<String>,
    started: std::time::Instant,
}

impl<'a> OperationScope<'a> {
    pub(crate) fn new(
        resource: ResourceKind,
        operation: Operation,
        cancel: &'a CancellationToken,
        call_timeout: Option<Duration>,
    ) -> Self {
        Self {
            resource,
            operation,
            cancel,
            call_timeout,
            remote_id: None,
            started: std::time::Instant::now(),
        }
    }

    pub(crate) fn operation(&self) -> Operation {
        self.operation
    }

    /// Attach the remote id to every error raised from here on
    pub(crate) fn set_remote_id(&mut self, remote_id: impl Into<String>) {
        self.remote_id = Some(remote_id.into());
    }

    /// Run one remote call
    ///
    /// The outer error is cancellation; the inner result is the call's own
    /// outcome, with an elapsed per-call timeout reported as `RemoteError::Timeout`.
    pub(crate) async fn call<T, F>(
        &self,
        stage: Stage,
        target: &str,
        call: F,
    ) -> Result<Result<T, RemoteError>, ReconcileError>
    where
        F: Future<Output = Result<T, RemoteError>>,
    {
        let service = stage.service();
        let start = std::time::Instant::now();
        let bounded = async {
            match self.call_timeout {
                Some(limit) => tokio::time::timeout(limit, call)
                    .await
                    .unwrap_or(Err(RemoteError::Timeout {
                        service,
                        elapsed: limit,
                    })),
                None => call.await,
            }
        };

        let result = tokio::select! {
            biased;
            () = self.cancel.cancelled() => {
                info!(
                    "{} {} cancelled before {}.{} for {} completed",
                    self.resource,
                    self.operation,
                    service,
                    stage.call(),
                    target
                );
                return Err(self.cancelled(stage));
            }
            result = bounded => result,
        };

        common::record_call_metrics(service, stage.call(), CallOutcome::of(&result), start);
        common::log_call_outcome(service, stage.call(), target, result.as_ref().err());
        Ok(result)
    }

    /// Run one remote call, treating every remote failure as fatal for the operation
    pub(crate) async fn run<T, F>(&self, stage: Stage, target: &str, call: F) -> Result<T, ReconcileError>
    where
        F: Future<Output = Result<T, RemoteError>>,
    {
        self.call(stage, target, call)
            .await?
            .map_err(|source| self.fail(stage, source))
    }

    /// Sleep unless the operation is cancelled first
    pub(crate) async fn sleep(&self, stage: Stage, duration: Duration) -> Result<(), ReconcileError> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(self.cancelled(stage)),
            () = tokio::time::sleep(duration) => Ok(()),
        }
    }

    /// Operation-specific error for a failed remote call
    pub(crate) fn fail(&self, stage: Stage, source: RemoteError) -> ReconcileError {
        let resource = self.resource;
        let remote_id = self.remote_id.clone();
        match self.operation {
            Operation::Create => ReconcileError::RemoteCreate {
                resource,
                remote_id,
                stage,
                rolled_back: false,
                source,
            },
            Operation::Read => ReconcileError::RemoteRead {
                resource,
                remote_id,
                stage,
                source,
            },
            Operation::Update => ReconcileError::RemoteUpdate {
                resource,
                remote_id,
                stage,
                source,
            },
            Operation::Delete => ReconcileError::RemoteDelete {
                resource,
                remote_id,
                stage,
                source,
            },
        }
    }

    pub(crate) fn cancelled(&self, stage: Stage) -> ReconcileError {
        ReconcileError::Cancelled {
            resource: self.resource,
            operation: self.operation,
            remote_id: self.remote_id.clone(),
            stage,
        }
    }

    pub(crate) fn invalid(&self, error: &anyhow::Error) -> ReconcileError {
        ReconcileError::Validation {
            resource: self.resource,
            message: error.to_string(),
        }
    }

    /// Record metrics and the final log line for the operation
    pub(crate) fn finish<T>(&self, result: &Result<T, ReconcileError>) {
        let resource = self.resource.as_str();
        let operation = self.operation.as_str();
        metrics::record_reconciliation(resource, operation, self.started.elapsed().as_secs_f64());

        let Err(e) = result else {
            return;
        };
        metrics::increment_reconciliation_errors(resource, operation, e.kind());
        if e.is_partially_applied() {
            metrics::increment_partial_failures(resource, operation);
            error!(
                resource = resource,
                operation = operation,
                error.kind = e.kind(),
                remote_id = e.remote_id().unwrap_or_default(),
                "{} {} left remote state partially applied: {}",
                resource,
                operation,
                e
            );
        } else {
            warn!(
                resource = resource,
                operation = operation,
                error.kind = e.kind(),
                "{} {} failed: {}",
                resource,
                operation,
                e
            );
        }
    }
}

/// Wait until a revoke issued for `app_id` has completed
///
/// Polls `revocation_state` with Fibonacci backoff, bounded by
/// `revocation_timeout`. A service that reports `Unsupported` gets the fixed
/// `revocation_settle_delay` instead.
pub(crate) async fn await_revocation(
    scope: &OperationScope<'_>,
    provisioning: &dyn Provisioning,
    app_id: &str,
    config: &ControllerConfig,
) -> Result<(), ReconcileError> {
    let started = Instant::now();
    let deadline = started + config.revocation_timeout();
    let mut backoff =
        FibonacciBackoff::new(config.revocation_poll_min(), config.revocation_poll_max());

    loop {
        let state = scope
            .run(
                Stage::AwaitRevocation,
                app_id,
                provisioning.revocation_state(app_id),
            )
            .await?;

        match state {
            RevocationState::Revoked => break,
            RevocationState::Unsupported => {
                debug!(
                    "Provisioning cannot report revocation state for {}, waiting {:?}",
                    app_id,
                    config.revocation_settle_delay()
                );
                scope
                    .sleep(Stage::AwaitRevocation, config.revocation_settle_delay())
                    .await?;
                break;
            }
            RevocationState::Active | RevocationState::Revoking => {
                let now = Instant::now();
                if now >= deadline {
                    return Err(ReconcileError::RevocationTimeout {
                        app_id: app_id.to_string(),
                        waited: now - started,
                    });
                }
                let delay = backoff.next_backoff().min(deadline - now);
                debug!(
                    "Revocation for {} still {:?}, polling again in {:?}",
                    app_id, state, delay
                );
                scope.sleep(Stage::AwaitRevocation, delay).await?;
            }
        }
    }

    let waited = started.elapsed();
    metrics::observe_revocation_wait(waited.as_secs_f64());
    debug!("Credentials of {} revoked after {:?}", app_id, waited);
    Ok(())
}

/// Fetch signed metadata, re-fetching an empty document up to
/// `metadata_poll_attempts` times
///
/// Call errors are not retried.
pub(crate) async fn fetch_metadata(
    scope: &OperationScope<'_>,
    directory: &dyn IdentityDirectory,
    app_id: &str,
    signing_key_id: &str,
    config: &ControllerConfig,
) -> Result<String, ReconcileError> {
    let fetches = config.metadata_poll_attempts.saturating_add(1);
    let mut backoff =
        FibonacciBackoff::new(config.metadata_poll_min(), config.metadata_poll_max());

    for fetch in 1..=fetches {
        let document = scope
            .run(
                Stage::FetchMetadata,
                app_id,
                directory.get_signed_metadata(app_id, signing_key_id),
            )
            .await?;
        if !document.is_empty() {
            return Ok(document);
        }
        if fetch < fetches {
            let delay = backoff.next_backoff();
            debug!(
                "Signed metadata for {} not ready ({}/{}), fetching again in {:?}",
                app_id, fetch, fetches, delay
            );
            scope.sleep(Stage::FetchMetadata, delay).await?;
        }
    }

    Err(ReconcileError::EmptyMetadata {
        app_id: app_id.to_string(),
        operation: scope.operation(),
        attempts: fetches,
        rolled_back: false,
    })
}
