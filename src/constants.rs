//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Sign-on mode applied when an application spec does not name one
pub const DEFAULT_SIGN_ON_MODE: &str = "SAML_2_0";

/// Federated session duration applied when an application spec does not set one (seconds)
pub const DEFAULT_SESSION_DURATION_SECS: u32 = 3600;

/// Shortest federated session the cloud provider accepts (seconds)
pub const MIN_SESSION_DURATION_SECS: u32 = 900;

/// Longest federated session the cloud provider accepts (seconds)
pub const MAX_SESSION_DURATION_SECS: u32 = 43_200;

/// Upper bound on waiting for the provisioning service to confirm a revoke (seconds)
pub const DEFAULT_REVOCATION_TIMEOUT_SECS: u64 = 120;

/// Fixed wait between revoke and set when revocation state cannot be observed (seconds)
///
/// Matches the settle time observed on the provisioning service.
pub const DEFAULT_REVOCATION_SETTLE_DELAY_SECS: u64 = 15;

/// First revocation poll interval (milliseconds)
pub const DEFAULT_REVOCATION_POLL_MIN_MS: u64 = 500;

/// Largest revocation poll interval (milliseconds)
pub const DEFAULT_REVOCATION_POLL_MAX_MS: u64 = 8_000;

/// Number of times an empty signed metadata document is fetched again before it is a failure
pub const DEFAULT_METADATA_POLL_ATTEMPTS: u32 = 3;

/// First metadata re-fetch interval (milliseconds)
pub const DEFAULT_METADATA_POLL_MIN_MS: u64 = 500;

/// Largest metadata re-fetch interval (milliseconds)
pub const DEFAULT_METADATA_POLL_MAX_MS: u64 = 4_000;

/// Per remote call timeout (seconds), 0 disables it
pub const DEFAULT_REMOTE_CALL_TIMEOUT_SECS: u64 = 30;
