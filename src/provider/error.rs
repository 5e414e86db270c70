use std::time::Duration;

use thiserror::Error;

/// Remote service a call went to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    Directory,
    Provisioning,
}

impl Service {
    pub fn as_str(self) -> &'static str {
        match self {
            Service::Directory => "directory",
            Service::Provisioning => "provisioning",
        }
    }
}

impl std::fmt::Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by a remote service client
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("{service} has no {object}")]
    NotFound { service: Service, object: String },

    #[error("{service} rejected the request{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Rejected {
        service: Service,
        status: Option<u16>,
        message: String,
    },

    #[error("{service} is unavailable: {message}")]
    Unavailable { service: Service, message: String },

    #[error("{service} call timed out after {elapsed:?}")]
    Timeout { service: Service, elapsed: Duration },
}

impl RemoteError {
    pub fn not_found(service: Service, object: impl Into<String>) -> Self {
        Self::NotFound {
            service,
            object: object.into(),
        }
    }

    pub fn rejected(service: Service, status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Rejected {
            service,
            status,
            message: message.into(),
        }
    }

    pub fn unavailable(service: Service, message: impl Into<String>) -> Self {
        Self::Unavailable {
            service,
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn service(&self) -> Service {
        match self {
            Self::NotFound { service, .. }
            | Self::Rejected { service, .. }
            | Self::Unavailable { service, .. }
            | Self::Timeout { service, .. } => *service,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_service_and_status() {
        let err = RemoteError::rejected(Service::Directory, Some(400), "label too long");
        assert_eq!(
            err.to_string(),
            "directory rejected the request (400): label too long"
        );

        let err = RemoteError::rejected(Service::Provisioning, None, "bad key");
        assert_eq!(err.to_string(), "provisioning rejected the request: bad key");
    }

    #[test]
    fn test_not_found_is_distinguishable() {
        assert!(RemoteError::not_found(Service::Directory, "application 0oa1").is_not_found());
        assert!(!RemoteError::unavailable(Service::Directory, "503").is_not_found());
        assert!(!RemoteError::Timeout {
            service: Service::Provisioning,
            elapsed: Duration::from_secs(1),
        }
        .is_not_found());
    }
}
