//! # Attachment Resource
//!
//! One user's membership (role + SAML role list) inside an application.
//! The record's remote identifier is the resolved directory user id, not a
//! membership id, so role or role-mapping changes never change its identity.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::provider::Membership;
use crate::resource::ReconciledRecord;

/// Declarative description of a membership, as authored by the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AttachmentSpec {
    /// Application the user is attached to (immutable)
    pub app_id: String,
    /// Membership role (immutable)
    pub role: String,
    /// Email address of the directory user (immutable)
    pub user: String,
    /// Directory domain used to scope the email lookup (immutable)
    #[serde(default)]
    pub domain: String,
    /// Ordered SAML role mappings
    pub saml_roles: Vec<String>,
}

impl AttachmentSpec {
    /// Domain to scope user resolution with, `None` when unscoped
    pub fn domain_scope(&self) -> Option<&str> {
        Some(self.domain.as_str()).filter(|domain| !domain.is_empty())
    }

    /// Whether moving `record` to this spec needs a delete and a fresh create
    ///
    /// App id, role, user and domain are immutable once attached.
    pub fn requires_replacement(&self, record: &AttachmentRecord) -> bool {
        self.app_id != record.app_id
            || self.role != record.role
            || self.user != record.user
            || self.domain != record.domain
    }
}

/// Remote identity of a membership
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttachmentKey {
    pub app_id: String,
    pub user_id: String,
}

impl AttachmentKey {
    pub fn new(app_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            user_id: user_id.into(),
        }
    }
}

impl std::fmt::Display for AttachmentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.app_id, self.user_id)
    }
}

/// Reconciled state of one membership, persisted by the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRecord {
    /// Resolved directory user id, `None` once the record is cleared
    pub id: Option<String>,
    pub app_id: String,
    pub role: String,
    /// Email the user was resolved from
    pub user: String,
    pub domain: String,
    pub saml_roles: Vec<String>,
    /// Membership status reported by the directory
    pub status: String,
    pub display_name: String,
    #[serde(default)]
    pub last_reconciled_at: Option<DateTime<Utc>>,
}

impl AttachmentRecord {
    /// Build a record from an observed membership
    ///
    /// The directory does not echo the lookup domain, so it starts empty and
    /// is carried over from the authored spec or the previous record.
    pub(crate) fn from_membership(membership: Membership) -> Self {
        let Membership {
            app_id,
            user_id,
            status,
            profile,
        } = membership;
        Self {
            id: Some(user_id),
            app_id,
            role: profile.role,
            user: profile.email,
            domain: String::new(),
            saml_roles: profile.saml_roles,
            status,
            display_name: profile.display_name,
            last_reconciled_at: Some(Utc::now()),
        }
    }

    pub(crate) fn with_identity(mut self, user: &str, domain: &str) -> Self {
        user.clone_into(&mut self.user);
        domain.clone_into(&mut self.domain);
        self
    }
}

impl ReconciledRecord for AttachmentRecord {
    type Key = AttachmentKey;

    fn key(&self) -> Option<AttachmentKey> {
        let user_id = self.id.as_deref().filter(|id| !id.is_empty())?;
        Some(AttachmentKey::new(self.app_id.clone(), user_id))
    }

    /// Observed role, mappings, status and display name replace the recorded
    /// ones; the authored email and domain stay.
    fn absorb(&mut self, observed: Self) {
        let Self {
            id,
            role,
            saml_roles,
            status,
            display_name,
            last_reconciled_at,
            ..
        } = observed;
        self.id = id;
        self.role = role;
        self.saml_roles = saml_roles;
        self.status = status;
        self.display_name = display_name;
        self.last_reconciled_at = last_reconciled_at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MembershipProfile;

    fn spec() -> AttachmentSpec {
        AttachmentSpec {
            app_id: "app1".to_string(),
            role: "admin".to_string(),
            user: "alice@example.com".to_string(),
            domain: String::new(),
            saml_roles: vec!["dev".to_string(), "ops".to_string()],
        }
    }

    fn membership() -> Membership {
        Membership {
            app_id: "app1".to_string(),
            user_id: "00u1".to_string(),
            status: "PROVISIONED".to_string(),
            profile: MembershipProfile {
                email: "Alice@Example.com".to_string(),
                display_name: "Alice".to_string(),
                role: "admin".to_string(),
                saml_roles: vec!["dev".to_string(), "ops".to_string()],
            },
        }
    }

    #[test]
    fn test_domain_scope() {
        let mut spec = spec();
        assert_eq!(spec.domain_scope(), None);
        spec.domain = "corp".to_string();
        assert_eq!(spec.domain_scope(), Some("corp"));
    }

    #[test]
    fn test_spec_domain_defaults_to_empty() {
        let spec: AttachmentSpec = serde_yaml::from_str(
            "app_id: app1\nrole: admin\nuser: alice@example.com\nsaml_roles: [dev]\n",
        )
        .unwrap();
        assert_eq!(spec.domain, "");
    }

    #[test]
    fn test_requires_replacement_only_for_immutable_fields() {
        let spec = spec();
        let record =
            AttachmentRecord::from_membership(membership()).with_identity(&spec.user, &spec.domain);
        assert!(!spec.requires_replacement(&record));

        let mut remapped = spec.clone();
        remapped.saml_roles = vec!["readonly".to_string()];
        assert!(!remapped.requires_replacement(&record));

        for change in [
            AttachmentSpec { app_id: "app2".to_string(), ..spec.clone() },
            AttachmentSpec { role: "viewer".to_string(), ..spec.clone() },
            AttachmentSpec { user: "bob@example.com".to_string(), ..spec.clone() },
            AttachmentSpec { domain: "corp".to_string(), ..spec.clone() },
        ] {
            assert!(change.requires_replacement(&record), "{change:?}");
        }
    }

    #[test]
    fn test_key_uses_resolved_user_id() {
        let record = AttachmentRecord::from_membership(membership());
        assert_eq!(record.key(), Some(AttachmentKey::new("app1", "00u1")));
        assert_eq!(record.key().unwrap().to_string(), "app1/00u1");
    }

    #[test]
    fn test_absorb_keeps_authored_identity() {
        let mut record = AttachmentRecord::from_membership(membership())
            .with_identity("alice@example.com", "corp");

        let mut observed = membership();
        observed.status = "INACTIVE".to_string();
        observed.profile.saml_roles = vec!["ops".to_string()];
        record.absorb(AttachmentRecord::from_membership(observed));

        assert_eq!(record.user, "alice@example.com");
        assert_eq!(record.domain, "corp");
        assert_eq!(record.status, "INACTIVE");
        assert_eq!(record.saml_roles, vec!["ops".to_string()]);
    }
}
