//! # Reconcile Errors
//!
//! Every failure a controller operation can surface to the host. Remote call
//! failures carry the stage they happened at and, when known, the remote id,
//! so a host can tell whether anything was left behind on the remote side.

use std::time::Duration;

use thiserror::Error;

use crate::provider::{RemoteError, Service};

/// Resource a controller manages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Application,
    Attachment,
}

impl ResourceKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Application => "application",
            ResourceKind::Attachment => "attachment",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host-driven controller operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl Operation {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Step of an operation, one per remote call or wait
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    CreateApplication,
    FetchMetadata,
    SetCredentials,
    GetApplication,
    UpdateApplication,
    RevokeCredentials,
    /// Waiting for an issued revoke to complete
    AwaitRevocation,
    DeleteApplication,
    ResolveUser,
    AddMembership,
    /// Reading a membership back after writing it
    ReadBack,
    GetMembership,
    RemoveMembership,
}

impl Stage {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::CreateApplication => "create_application",
            Stage::FetchMetadata => "fetch_metadata",
            Stage::SetCredentials => "set_credentials",
            Stage::GetApplication => "get_application",
            Stage::UpdateApplication => "update_application",
            Stage::RevokeCredentials => "revoke_credentials",
            Stage::AwaitRevocation => "await_revocation",
            Stage::DeleteApplication => "delete_application",
            Stage::ResolveUser => "resolve_user",
            Stage::AddMembership => "add_membership",
            Stage::ReadBack => "read_back",
            Stage::GetMembership => "get_membership",
            Stage::RemoveMembership => "remove_membership",
        }
    }

    /// Client method called at this stage
    #[must_use]
    pub fn call(self) -> &'static str {
        match self {
            Stage::FetchMetadata => "get_signed_metadata",
            Stage::AwaitRevocation => "revocation_state",
            Stage::ResolveUser => "resolve_user_id",
            Stage::ReadBack => "get_membership",
            other => other.as_str(),
        }
    }

    /// Remote service called at this stage
    #[must_use]
    pub fn service(self) -> Service {
        match self {
            Stage::SetCredentials | Stage::RevokeCredentials | Stage::AwaitRevocation => {
                Service::Provisioning
            }
            _ => Service::Directory,
        }
    }

    /// Whether an earlier stage of the same create or update has already written remotely
    fn follows_first_write(self) -> bool {
        matches!(
            self,
            Stage::FetchMetadata
                | Stage::SetCredentials
                | Stage::RevokeCredentials
                | Stage::AwaitRevocation
                | Stage::ReadBack
        )
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn describe_id(remote_id: &Option<String>) -> String {
    remote_id
        .as_deref()
        .map(|id| format!(" {id}"))
        .unwrap_or_default()
}

fn rollback_note(rolled_back: &bool) -> &'static str {
    if *rolled_back {
        " (rolled back)"
    } else {
        ""
    }
}

fn domain_note(domain: &str) -> String {
    if domain.is_empty() {
        String::new()
    } else {
        format!(" in domain '{domain}'")
    }
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Failed to create {resource}{} at {stage}{}: {source}",
        describe_id(.remote_id),
        rollback_note(.rolled_back))]
    RemoteCreate {
        resource: ResourceKind,
        remote_id: Option<String>,
        stage: Stage,
        /// The partially created object was deleted again
        rolled_back: bool,
        #[source]
        source: RemoteError,
    },

    #[error("Failed to read {resource}{} at {stage}: {source}", describe_id(.remote_id))]
    RemoteRead {
        resource: ResourceKind,
        remote_id: Option<String>,
        stage: Stage,
        #[source]
        source: RemoteError,
    },

    #[error("Failed to update {resource}{} at {stage}: {source}", describe_id(.remote_id))]
    RemoteUpdate {
        resource: ResourceKind,
        remote_id: Option<String>,
        stage: Stage,
        #[source]
        source: RemoteError,
    },

    #[error("Failed to delete {resource}{} at {stage}: {source}", describe_id(.remote_id))]
    RemoteDelete {
        resource: ResourceKind,
        remote_id: Option<String>,
        stage: Stage,
        #[source]
        source: RemoteError,
    },

    #[error("Signed metadata for application {app_id} was still empty after {attempts} fetches during {operation}{}",
        rollback_note(.rolled_back))]
    EmptyMetadata {
        app_id: String,
        operation: Operation,
        attempts: u32,
        rolled_back: bool,
    },

    #[error("No directory user matches '{email}'{}",
        domain_note(.domain))]
    UserResolution { email: String, domain: String },

    #[error("Credentials of application {app_id} were not revoked within {waited:?}")]
    RevocationTimeout { app_id: String, waited: Duration },

    #[error("{resource} {operation}{} cancelled at {stage}", describe_id(.remote_id))]
    Cancelled {
        resource: ResourceKind,
        operation: Operation,
        remote_id: Option<String>,
        stage: Stage,
    },

    #[error("Invalid {resource}: {message}")]
    Validation {
        resource: ResourceKind,
        message: String,
    },
}

impl ReconcileError {
    /// Remote id of the object the operation was working on, if one was known
    ///
    /// An application id for applications, the resolved user id for attachments.
    #[must_use]
    pub fn remote_id(&self) -> Option<&str> {
        match self {
            Self::RemoteCreate { remote_id, .. }
            | Self::RemoteRead { remote_id, .. }
            | Self::RemoteUpdate { remote_id, .. }
            | Self::RemoteDelete { remote_id, .. }
            | Self::Cancelled { remote_id, .. } => remote_id.as_deref(),
            Self::EmptyMetadata { app_id, .. } | Self::RevocationTimeout { app_id, .. } => {
                Some(app_id)
            }
            Self::UserResolution { .. } | Self::Validation { .. } => None,
        }
    }

    /// Stable short name, used as a metric label
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RemoteCreate { .. } => "remote_create",
            Self::RemoteRead { .. } => "remote_read",
            Self::RemoteUpdate { .. } => "remote_update",
            Self::RemoteDelete { .. } => "remote_delete",
            Self::EmptyMetadata { .. } => "empty_metadata",
            Self::UserResolution { .. } => "user_resolution",
            Self::RevocationTimeout { .. } => "revocation_timeout",
            Self::Cancelled { .. } => "cancelled",
            Self::Validation { .. } => "validation",
        }
    }

    /// Stage the operation stopped at, for remote failures and cancellation
    #[must_use]
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::RemoteCreate { stage, .. }
            | Self::RemoteRead { stage, .. }
            | Self::RemoteUpdate { stage, .. }
            | Self::RemoteDelete { stage, .. }
            | Self::Cancelled { stage, .. } => Some(*stage),
            Self::RevocationTimeout { .. } => Some(Stage::AwaitRevocation),
            Self::EmptyMetadata { .. } => Some(Stage::FetchMetadata),
            Self::UserResolution { .. } => Some(Stage::ResolveUser),
            Self::Validation { .. } => None,
        }
    }

    /// Whether the failed operation left remote state changed
    ///
    /// True when a create or update failed after its first remote write and
    /// nothing was rolled back. Deletes and reads never report partial state.
    #[must_use]
    pub fn is_partially_applied(&self) -> bool {
        match self {
            Self::RemoteCreate {
                remote_id,
                rolled_back,
                ..
            } => remote_id.is_some() && !rolled_back,
            Self::RemoteUpdate { stage, .. } => stage.follows_first_write(),
            Self::EmptyMetadata {
                operation,
                rolled_back,
                ..
            } => match operation {
                Operation::Create => !rolled_back,
                Operation::Update => true,
                Operation::Read | Operation::Delete => false,
            },
            Self::RevocationTimeout { .. } => true,
            Self::Cancelled {
                operation, stage, ..
            } => {
                matches!(operation, Operation::Create | Operation::Update)
                    && stage.follows_first_write()
            }
            Self::RemoteRead { .. }
            | Self::RemoteDelete { .. }
            | Self::UserResolution { .. }
            | Self::Validation { .. } => false,
        }
    }

    /// Mark a create failure as compensated (or not) by deleting what it created
    pub(crate) fn with_rollback(mut self, outcome: bool) -> Self {
        match &mut self {
            Self::RemoteCreate { rolled_back, .. } | Self::EmptyMetadata { rolled_back, .. } => {
                *rolled_back = outcome;
            }
            _ => {}
        }
        self
    }

    /// Underlying remote failure, if any
    #[must_use]
    pub fn remote_source(&self) -> Option<&RemoteError> {
        match self {
            Self::RemoteCreate { source, .. }
            | Self::RemoteRead { source, .. }
            | Self::RemoteUpdate { source, .. }
            | Self::RemoteDelete { source, .. } => Some(source),
            _ => None,
        }
    }
}
