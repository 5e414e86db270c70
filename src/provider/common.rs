//! # Common Provider Utilities
//!
//! Shared metric and log helpers for remote calls, used by the controllers'
//! call guard so every directory and provisioning call is reported the same way.

use crate::observability::metrics;
use crate::provider::{RemoteError, Service};
use std::time::Instant;
use tracing::{debug, warn};

/// Outcome of a single remote call, as far as reporting is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    /// The call succeeded
    Ok,
    /// The remote object does not exist
    NotFound,
    /// The call failed for any other reason
    Failed,
}

impl CallOutcome {
    pub fn of<T>(result: &Result<T, RemoteError>) -> Self {
        match result {
            Ok(_) => CallOutcome::Ok,
            Err(e) if e.is_not_found() => CallOutcome::NotFound,
            Err(_) => CallOutcome::Failed,
        }
    }
}

/// Record metrics for a remote call
///
/// Not-found is counted as a call but not as an error: callers decide
/// whether it means drift or success.
pub fn record_call_metrics(service: Service, call: &str, outcome: CallOutcome, start_time: Instant) {
    metrics::record_remote_call(service.as_str(), call, start_time.elapsed().as_secs_f64());
    if outcome == CallOutcome::Failed {
        metrics::increment_remote_call_errors(service.as_str(), call);
    }
}

/// Log a remote call result
pub fn log_call_outcome(service: Service, call: &str, target: &str, error: Option<&RemoteError>) {
    match error {
        None => {
            debug!(service = %service, call = call, target = target, "Remote call succeeded");
        }
        Some(e) if e.is_not_found() => {
            debug!(service = %service, call = call, target = target, "Remote object not found");
        }
        Some(e) => {
            warn!(
                service = %service,
                call = call,
                target = target,
                error = %e,
                "Remote call {}.{} failed for {}: {}",
                service,
                call,
                target,
                e
            );
        }
    }
}
