//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use std::time::Duration;

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
/// Unparseable values fall back to the default rather than failing startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Upper bound on the revoke-to-set barrier in application updates (seconds)
    pub revocation_timeout_secs: u64,
    /// Fixed barrier used when the provisioning service cannot report revocation state (seconds)
    pub revocation_settle_delay_secs: u64,
    /// First revocation poll interval (milliseconds)
    pub revocation_poll_min_ms: u64,
    /// Largest revocation poll interval (milliseconds)
    pub revocation_poll_max_ms: u64,
    /// Re-fetches of an empty signed metadata document before it fails the operation
    pub metadata_poll_attempts: u32,
    /// First metadata re-fetch interval (milliseconds)
    pub metadata_poll_min_ms: u64,
    /// Largest metadata re-fetch interval (milliseconds)
    pub metadata_poll_max_ms: u64,
    /// Timeout applied to each remote call (seconds), 0 disables it
    pub remote_call_timeout_secs: u64,
    /// Revoke provisioning credentials before deleting an application
    ///
    /// Off by default: deleting the application invalidates its credentials on the remote side.
    pub revoke_credentials_on_delete: bool,
    /// Delete a freshly created application when a later create step fails
    pub rollback_failed_create: bool,
    /// Global log level (ERROR, WARN, INFO, DEBUG, TRACE)
    pub log_level: String,
    /// Log format (json, text)
    pub log_format: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            revocation_timeout_secs: DEFAULT_REVOCATION_TIMEOUT_SECS,
            revocation_settle_delay_secs: DEFAULT_REVOCATION_SETTLE_DELAY_SECS,
            revocation_poll_min_ms: DEFAULT_REVOCATION_POLL_MIN_MS,
            revocation_poll_max_ms: DEFAULT_REVOCATION_POLL_MAX_MS,
            metadata_poll_attempts: DEFAULT_METADATA_POLL_ATTEMPTS,
            metadata_poll_min_ms: DEFAULT_METADATA_POLL_MIN_MS,
            metadata_poll_max_ms: DEFAULT_METADATA_POLL_MAX_MS,
            remote_call_timeout_secs: DEFAULT_REMOTE_CALL_TIMEOUT_SECS,
            revoke_credentials_on_delete: false,
            rollback_failed_create: false,
            log_level: "INFO".to_string(),
            log_format: "text".to_string(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        use crate::constants::*;
        Self {
            revocation_timeout_secs: env_var_or_default(
                "REVOCATION_TIMEOUT_SECS",
                DEFAULT_REVOCATION_TIMEOUT_SECS,
            ),
            revocation_settle_delay_secs: env_var_or_default(
                "REVOCATION_SETTLE_DELAY_SECS",
                DEFAULT_REVOCATION_SETTLE_DELAY_SECS,
            ),
            revocation_poll_min_ms: env_var_or_default(
                "REVOCATION_POLL_MIN_MS",
                DEFAULT_REVOCATION_POLL_MIN_MS,
            ),
            revocation_poll_max_ms: env_var_or_default(
                "REVOCATION_POLL_MAX_MS",
                DEFAULT_REVOCATION_POLL_MAX_MS,
            ),
            metadata_poll_attempts: env_var_or_default(
                "METADATA_POLL_ATTEMPTS",
                DEFAULT_METADATA_POLL_ATTEMPTS,
            ),
            metadata_poll_min_ms: env_var_or_default(
                "METADATA_POLL_MIN_MS",
                DEFAULT_METADATA_POLL_MIN_MS,
            ),
            metadata_poll_max_ms: env_var_or_default(
                "METADATA_POLL_MAX_MS",
                DEFAULT_METADATA_POLL_MAX_MS,
            ),
            remote_call_timeout_secs: env_var_or_default(
                "REMOTE_CALL_TIMEOUT_SECS",
                DEFAULT_REMOTE_CALL_TIMEOUT_SECS,
            ),
            revoke_credentials_on_delete: env_var_or_default_bool(
                "REVOKE_CREDENTIALS_ON_DELETE",
                false,
            ),
            rollback_failed_create: env_var_or_default_bool("ROLLBACK_FAILED_CREATE", false),
            log_level: env_var_or_default_str("LOG_LEVEL", "INFO"),
            log_format: env_var_or_default_str("LOG_FORMAT", "text"),
        }
    }

    /// Get revocation barrier timeout
    pub fn revocation_timeout(&self) -> Duration {
        Duration::from_secs(self.revocation_timeout_secs)
    }

    /// Get fixed revocation settle delay
    pub fn revocation_settle_delay(&self) -> Duration {
        Duration::from_secs(self.revocation_settle_delay_secs)
    }

    /// Get first revocation poll interval
    pub fn revocation_poll_min(&self) -> Duration {
        Duration::from_millis(self.revocation_poll_min_ms)
    }

    /// Get largest revocation poll interval
    pub fn revocation_poll_max(&self) -> Duration {
        Duration::from_millis(self.revocation_poll_max_ms)
    }

    /// Get first metadata re-fetch interval
    pub fn metadata_poll_min(&self) -> Duration {
        Duration::from_millis(self.metadata_poll_min_ms)
    }

    /// Get largest metadata re-fetch interval
    pub fn metadata_poll_max(&self) -> Duration {
        Duration::from_millis(self.metadata_poll_max_ms)
    }

    /// Get per-call timeout, `None` when disabled
    pub fn remote_call_timeout(&self) -> Option<Duration> {
        (self.remote_call_timeout_secs > 0)
            .then(|| Duration::from_secs(self.remote_call_timeout_secs))
    }
}

/// Read environment variable or return default value
fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T
where
    <T as std::str::FromStr>::Err: std::fmt::Debug,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as boolean or return default
fn env_var_or_default_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| {
            let v_lower = v.to_lowercase();
            v_lower == "true" || v_lower == "1" || v_lower == "yes" || v_lower == "on"
        })
        .unwrap_or(default)
}

/// Read environment variable as string or return default
fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_constants() {
        let config = ControllerConfig::default();
        assert_eq!(config.revocation_timeout(), Duration::from_secs(120));
        assert_eq!(config.revocation_settle_delay(), Duration::from_secs(15));
        assert_eq!(config.metadata_poll_attempts, 3);
        assert_eq!(config.remote_call_timeout(), Some(Duration::from_secs(30)));
        assert!(!config.revoke_credentials_on_delete);
        assert!(!config.rollback_failed_create);
    }

    #[test]
    fn test_zero_call_timeout_disables_it() {
        let config = ControllerConfig {
            remote_call_timeout_secs: 0,
            ..ControllerConfig::default()
        };
        assert_eq!(config.remote_call_timeout(), None);
    }

    #[test]
    fn test_env_helpers_fall_back_on_missing_or_invalid() {
        // Keys are unique to this test so parallel tests do not interfere
        assert_eq!(env_var_or_default("FAC_TEST_UNSET_NUMBER", 7_u64), 7);

        std::env::set_var("FAC_TEST_BAD_NUMBER", "not-a-number");
        assert_eq!(env_var_or_default("FAC_TEST_BAD_NUMBER", 9_u64), 9);

        std::env::set_var("FAC_TEST_BOOL_YES", "Yes");
        assert!(env_var_or_default_bool("FAC_TEST_BOOL_YES", false));

        std::env::set_var("FAC_TEST_BOOL_OFF", "off");
        assert!(!env_var_or_default_bool("FAC_TEST_BOOL_OFF", true));

        assert_eq!(env_var_or_default_str("FAC_TEST_UNSET_STR", "json"), "json");
    }
}
