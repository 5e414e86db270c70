//! # Application Resource
//!
//! Desired state (`ApplicationSpec`) and reconciled state (`ApplicationRecord`)
//! of one federated cloud application integration.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_SESSION_DURATION_SECS, DEFAULT_SIGN_ON_MODE};
use crate::provider::{ApplicationDefinition, FederationSettings, RemoteApplication};
use crate::resource::credentials::ProvisioningCredentials;
use crate::resource::ReconciledRecord;

/// Declarative description of an application integration, as authored by the host
///
/// # Example
///
/// ```yaml
/// name: amazon_aws
/// label: Prod AWS
/// aws_environment_type: aws.amazon
/// group_filter: okta_aws_*
/// login_url: https://console.aws.amazon.com/ec2/home
/// role_value_pattern: arn:aws:iam::${accountid}:saml-provider/OKTA,arn:aws:iam::${accountid}:role/${role}
/// access_key: AKIA...
/// secret: ...
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, JsonSchema)]
pub struct ApplicationSpec {
    /// Catalog name of the integration
    pub name: String,
    /// Display label
    #[serde(default)]
    pub label: String,
    #[serde(default = "default_sign_on_mode")]
    pub sign_on_mode: String,
    /// Cloud environment type (e.g. `aws.amazon`)
    pub aws_environment_type: String,
    /// Directory group filter expression
    pub group_filter: String,
    pub login_url: String,
    /// Grant the union of roles from all matching groups
    #[serde(default)]
    pub join_all_roles: bool,
    /// ARN of the SAML identity provider registered on the cloud side
    #[serde(default)]
    pub identity_provider_arn: String,
    /// Federated session duration in seconds
    #[serde(default = "default_session_duration")]
    pub session_duration: u32,
    /// Pattern that maps group names onto role ARNs
    pub role_value_pattern: String,
    /// Write-only provisioning credentials
    #[serde(flatten)]
    pub credentials: ProvisioningCredentials,
}

fn default_sign_on_mode() -> String {
    DEFAULT_SIGN_ON_MODE.to_string()
}

fn default_session_duration() -> u32 {
    DEFAULT_SESSION_DURATION_SECS
}

impl ApplicationSpec {
    /// Everything the directory needs to create the integration
    pub fn definition(&self) -> ApplicationDefinition {
        ApplicationDefinition {
            name: self.name.clone(),
            label: self.label.clone(),
            sign_on_mode: self.sign_on_mode.clone(),
            settings: self.settings(),
        }
    }

    pub fn settings(&self) -> FederationSettings {
        FederationSettings {
            aws_environment_type: self.aws_environment_type.clone(),
            group_filter: self.group_filter.clone(),
            login_url: self.login_url.clone(),
            join_all_roles: self.join_all_roles,
            identity_provider_arn: self.identity_provider_arn.clone(),
            session_duration: self.session_duration,
            role_value_pattern: self.role_value_pattern.clone(),
        }
    }
}

/// Reconciled state of one application integration, persisted by the host
///
/// Credentials are deliberately absent: the remote side never returns them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    /// Directory-assigned application id, `None` once the record is cleared
    pub id: Option<String>,
    pub name: String,
    pub label: String,
    pub sign_on_mode: String,
    pub aws_environment_type: String,
    pub group_filter: String,
    pub login_url: String,
    pub join_all_roles: bool,
    pub identity_provider_arn: String,
    pub session_duration: u32,
    pub role_value_pattern: String,
    /// Signed SAML metadata published by the directory
    pub saml_metadata_document: String,
    #[serde(default)]
    pub last_reconciled_at: Option<DateTime<Utc>>,
}

impl ApplicationRecord {
    pub(crate) fn from_remote(app: RemoteApplication, saml_metadata_document: String) -> Self {
        let RemoteApplication {
            id,
            name,
            label,
            sign_on_mode,
            settings,
            ..
        } = app;
        Self {
            id: Some(id),
            name,
            label,
            sign_on_mode,
            aws_environment_type: settings.aws_environment_type,
            group_filter: settings.group_filter,
            login_url: settings.login_url,
            join_all_roles: settings.join_all_roles,
            identity_provider_arn: settings.identity_provider_arn,
            session_duration: settings.session_duration,
            role_value_pattern: settings.role_value_pattern,
            saml_metadata_document,
            last_reconciled_at: Some(Utc::now()),
        }
    }

    /// Names of declared fields whose recorded value differs from `spec`
    ///
    /// Credentials are never compared since the record does not hold them.
    pub fn drifted_fields(&self, spec: &ApplicationSpec) -> Vec<&'static str> {
        let mut fields = Vec::new();
        let mut check = |name: &'static str, same: bool| {
            if !same {
                fields.push(name);
            }
        };
        check("name", self.name == spec.name);
        check("label", self.label == spec.label);
        check("sign_on_mode", self.sign_on_mode == spec.sign_on_mode);
        check(
            "aws_environment_type",
            self.aws_environment_type == spec.aws_environment_type,
        );
        check("group_filter", self.group_filter == spec.group_filter);
        check("login_url", self.login_url == spec.login_url);
        check("join_all_roles", self.join_all_roles == spec.join_all_roles);
        check(
            "identity_provider_arn",
            self.identity_provider_arn == spec.identity_provider_arn,
        );
        check("session_duration", self.session_duration == spec.session_duration);
        check(
            "role_value_pattern",
            self.role_value_pattern == spec.role_value_pattern,
        );
        fields
    }
}

impl ReconciledRecord for ApplicationRecord {
    type Key = String;

    fn key(&self) -> Option<String> {
        self.id.clone().filter(|id| !id.is_empty())
    }

    fn absorb(&mut self, observed: Self) {
        *self = observed;
    }
}
