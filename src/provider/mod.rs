//! # Provider Interfaces
//!
//! The two remote services the controllers reconcile against, accessed only
//! through narrow traits:
//! - `IdentityDirectory` owns applications, users and memberships
//! - `Provisioning` holds the federated credentials of an application
//!
//! Transport and authentication live in the implementations. Every call
//! returns `RemoteError` on failure, with `RemoteError::NotFound` kept
//! distinct so callers can tell drift apart from transient failure.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::resource::ProvisioningCredentials;

// Common utilities shared across providers
pub mod common;
mod error;
pub mod memory;

pub use error::{RemoteError, Service};

/// Federation settings of a cloud application integration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FederationSettings {
    pub aws_environment_type: String,
    pub group_filter: String,
    pub login_url: String,
    pub join_all_roles: bool,
    pub identity_provider_arn: String,
    pub session_duration: u32,
    pub role_value_pattern: String,
}

/// Everything the directory needs to create an application integration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationDefinition {
    pub name: String,
    pub label: String,
    pub sign_on_mode: String,
    pub settings: FederationSettings,
}

/// Application integration as reported by the directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteApplication {
    pub id: String,
    pub name: String,
    pub label: String,
    pub sign_on_mode: String,
    pub status: String,
    /// Id of the key the SAML metadata is signed with
    pub signing_key_id: String,
    pub settings: FederationSettings,
}

/// Profile attached to a membership
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipProfile {
    pub email: String,
    pub display_name: String,
    pub role: String,
    pub saml_roles: Vec<String>,
}

/// A user's membership in an application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub app_id: String,
    pub user_id: String,
    pub status: String,
    pub profile: MembershipProfile,
}

/// Credential revocation progress reported by the provisioning service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevocationState {
    /// Credentials are in place and no revoke is in flight
    Active,
    /// A revoke was accepted but has not completed
    Revoking,
    /// No credentials are held for the application
    Revoked,
    /// The service cannot report revocation progress
    Unsupported,
}

/// Provider trait for the identity directory
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    /// Create an application integration
    async fn create_application(
        &self,
        definition: &ApplicationDefinition,
    ) -> Result<RemoteApplication, RemoteError>;

    /// Get an application, `RemoteError::NotFound` if it does not exist
    async fn get_application(&self, app_id: &str) -> Result<RemoteApplication, RemoteError>;

    /// Update the label and identity provider ARN of an application
    async fn update_application(
        &self,
        app_id: &str,
        label: &str,
        identity_provider_arn: &str,
    ) -> Result<RemoteApplication, RemoteError>;

    async fn delete_application(&self, app_id: &str) -> Result<(), RemoteError>;

    /// Fetch the signed SAML metadata of an application
    ///
    /// May return an empty document while the signing key is still being generated.
    async fn get_signed_metadata(
        &self,
        app_id: &str,
        signing_key_id: &str,
    ) -> Result<String, RemoteError>;

    /// Resolve an email, optionally scoped to a domain, to a user id
    async fn resolve_user_id(&self, email: &str, domain: Option<&str>)
        -> Result<String, RemoteError>;

    /// Add or overwrite a membership
    async fn add_membership(
        &self,
        app_id: &str,
        user_id: &str,
        role: &str,
        role_mappings: &[String],
    ) -> Result<Membership, RemoteError>;

    async fn get_membership(&self, app_id: &str, user_id: &str) -> Result<Membership, RemoteError>;

    async fn remove_membership(&self, app_id: &str, user_id: &str) -> Result<(), RemoteError>;
}

/// Provider trait for the credential provisioning service
#[async_trait]
pub trait Provisioning: Send + Sync {
    /// Store credentials for an application, replacing any existing ones
    async fn set_credentials(
        &self,
        app_id: &str,
        credentials: &ProvisioningCredentials,
    ) -> Result<(), RemoteError>;

    /// Start revoking the credentials of an application
    ///
    /// Completion is asynchronous on the remote side.
    async fn revoke_credentials(&self, app_id: &str) -> Result<(), RemoteError>;

    /// Report revocation progress for an application
    async fn revocation_state(&self, _app_id: &str) -> Result<RevocationState, RemoteError> {
        Ok(RevocationState::Unsupported)
    }
}
