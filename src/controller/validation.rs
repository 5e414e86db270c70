//! # Validation
//!
//! Checks authored specs and remote ids before any remote call is made.

use anyhow::Result;
use regex::Regex;

use crate::constants::{MAX_SESSION_DURATION_SECS, MIN_SESSION_DURATION_SECS};
use crate::resource::{ApplicationSpec, AttachmentKey, AttachmentSpec};

/// Validate an application spec
pub fn validate_application_spec(spec: &ApplicationSpec) -> Result<()> {
    validate_required(&spec.name, "name")?;
    validate_required(&spec.aws_environment_type, "aws_environment_type")?;
    validate_required(&spec.group_filter, "group_filter")?;
    validate_required(&spec.role_value_pattern, "role_value_pattern")?;
    validate_required(&spec.credentials.access_key, "access_key")?;
    // Never echo the secret itself
    if spec.credentials.secret.is_empty() {
        return Err(anyhow::anyhow!("secret is required but is empty"));
    }

    validate_login_url(&spec.login_url)?;

    if !(MIN_SESSION_DURATION_SECS..=MAX_SESSION_DURATION_SECS).contains(&spec.session_duration) {
        return Err(anyhow::anyhow!(
            "session_duration must be between {} and {} seconds, got {}",
            MIN_SESSION_DURATION_SECS,
            MAX_SESSION_DURATION_SECS,
            spec.session_duration
        ));
    }

    if !spec.identity_provider_arn.is_empty() {
        validate_arn(&spec.identity_provider_arn)?;
    }

    Ok(())
}

/// Validate an attachment spec
pub fn validate_attachment_spec(spec: &AttachmentSpec) -> Result<()> {
    validate_required(&spec.app_id, "app_id")?;
    validate_required(&spec.role, "role")?;
    validate_email(&spec.user)?;

    for (index, mapping) in spec.saml_roles.iter().enumerate() {
        if mapping.trim().is_empty() {
            return Err(anyhow::anyhow!("saml_roles[{index}] cannot be empty"));
        }
    }

    Ok(())
}

/// Validate an application id passed to read, update or delete
pub fn validate_remote_id(remote_id: &str) -> Result<()> {
    validate_required(remote_id, "remote id")
}

/// Validate a membership key passed to read, update or delete
pub fn validate_attachment_key(key: &AttachmentKey) -> Result<()> {
    validate_required(&key.app_id, "app_id")?;
    validate_required(&key.user_id, "user id")
}

/// The membership being updated must belong to the application the spec names
///
/// `app_id` cannot change in place; moving a membership is a replacement.
pub fn validate_attachment_target(key: &AttachmentKey, spec: &AttachmentSpec) -> Result<()> {
    if spec.app_id.trim() != key.app_id.trim() {
        return Err(anyhow::anyhow!(
            "app_id '{}' does not match membership {}; changing app_id requires replacement",
            spec.app_id,
            key
        ));
    }
    Ok(())
}

fn validate_required(value: &str, field_name: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(anyhow::anyhow!("{field_name} is required but is empty"));
    }
    Ok(())
}

/// Must be an absolute http(s) URL with a host
fn validate_login_url(url: &str) -> Result<()> {
    validate_required(url, "login_url")?;

    let url_regex = Regex::new(r"^https?://[^\s/?#]+[^\s]*$")
        .map_err(|e| anyhow::anyhow!("Failed to compile regex: {e}"))?;

    if !url_regex.is_match(url.trim()) {
        return Err(anyhow::anyhow!(
            "login_url '{url}' must be an http:// or https:// URL"
        ));
    }

    Ok(())
}

/// Format: arn:partition:service:region:account:resource
fn validate_arn(arn: &str) -> Result<()> {
    let arn_regex = Regex::new(r"^arn:[a-z0-9-]+:[a-z0-9-]+:[a-z0-9-]*:[0-9]*:\S+$")
        .map_err(|e| anyhow::anyhow!("Failed to compile regex: {e}"))?;

    if !arn_regex.is_match(arn) {
        return Err(anyhow::anyhow!(
            "identity_provider_arn '{arn}' must be an ARN (arn:partition:service:region:account:resource)"
        ));
    }

    Ok(())
}

fn validate_email(email: &str) -> Result<()> {
    validate_required(email, "user")?;

    let email_regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$")
        .map_err(|e| anyhow::anyhow!("Failed to compile regex: {e}"))?;

    if !email_regex.is_match(email) {
        return Err(anyhow::anyhow!("user '{email}' must be an email address"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ProvisioningCredentials;

    fn application() -> ApplicationSpec {
        ApplicationSpec {
            name: "amazon_aws".to_string(),
            label: "Prod AWS".to_string(),
            sign_on_mode: "SAML_2_0".to_string(),
            aws_environment_type: "aws.amazon".to_string(),
            group_filter: "okta_aws_*".to_string(),
            login_url: "https://example.com/login".to_string(),
            join_all_roles: false,
            identity_provider_arn: String::new(),
            session_duration: 3600,
            role_value_pattern: "arn:aws:iam::*".to_string(),
            credentials: ProvisioningCredentials::new("AKIAEXAMPLE", "s3cr3t"),
        }
    }

    fn attachment() -> AttachmentSpec {
        AttachmentSpec {
            app_id: "0oa1".to_string(),
            role: "admin".to_string(),
            user: "alice@example.com".to_string(),
            domain: String::new(),
            saml_roles: vec!["dev".to_string()],
        }
    }

    #[test]
    fn test_valid_application_spec() {
        assert!(validate_application_spec(&application()).is_ok());

        let mut spec = application();
        spec.identity_provider_arn = "arn:aws:iam::123456789012:saml-provider/OKTA".to_string();
        assert!(validate_application_spec(&spec).is_ok());
    }

    #[test]
    fn test_application_required_fields() {
        let mut spec = application();
        spec.group_filter = "  ".to_string();
        let err = validate_application_spec(&spec).unwrap_err();
        assert_eq!(err.to_string(), "group_filter is required but is empty");
    }

    #[test]
    fn test_empty_secret_is_rejected_without_echo() {
        let mut spec = application();
        spec.credentials = ProvisioningCredentials::new("AKIAEXAMPLE", "");
        let err = validate_application_spec(&spec).unwrap_err();
        assert_eq!(err.to_string(), "secret is required but is empty");
    }

    #[test]
    fn test_login_url_must_be_http() {
        for url in ["ftp://example.com", "example.com/login", "https://", "https:// x"] {
            let mut spec = application();
            spec.login_url = url.to_string();
            assert!(validate_application_spec(&spec).is_err(), "{url}");
        }
        let mut spec = application();
        spec.login_url = "http://localhost:8080/sso".to_string();
        assert!(validate_application_spec(&spec).is_ok());
    }

    #[test]
    fn test_session_duration_bounds() {
        for (duration, valid) in [(899, false), (900, true), (43_200, true), (43_201, false)] {
            let mut spec = application();
            spec.session_duration = duration;
            assert_eq!(validate_application_spec(&spec).is_ok(), valid, "{duration}");
        }
    }

    #[test]
    fn test_identity_provider_arn_format() {
        let mut spec = application();
        spec.identity_provider_arn = "saml-provider/OKTA".to_string();
        let err = validate_application_spec(&spec).unwrap_err();
        assert!(err.to_string().contains("must be an ARN"));
    }

    #[test]
    fn test_attachment_spec() {
        assert!(validate_attachment_spec(&attachment()).is_ok());

        let mut spec = attachment();
        spec.user = "alice".to_string();
        assert!(validate_attachment_spec(&spec).is_err());

        let mut spec = attachment();
        spec.saml_roles = vec!["dev".to_string(), String::new()];
        let err = validate_attachment_spec(&spec).unwrap_err();
        assert_eq!(err.to_string(), "saml_roles[1] cannot be empty");

        let mut spec = attachment();
        spec.saml_roles.clear();
        assert!(validate_attachment_spec(&spec).is_ok());
    }

    #[test]
    fn test_remote_ids() {
        assert!(validate_remote_id("0oa1").is_ok());
        assert!(validate_remote_id("").is_err());
        assert!(validate_attachment_key(&AttachmentKey::new("0oa1", "00u1")).is_ok());
        assert!(validate_attachment_key(&AttachmentKey::new("0oa1", "")).is_err());
    }

    #[test]
    fn test_attachment_target_must_match_key() {
        let key = AttachmentKey::new("0oa1", "00u1");
        assert!(validate_attachment_target(&key, &attachment()).is_ok());

        let mut spec = attachment();
        spec.app_id = "0oa2".to_string();
        let err = validate_attachment_target(&key, &spec).unwrap_err();
        assert_eq!(
            err.to_string(),
            "app_id '0oa2' does not match membership 0oa1/00u1; changing app_id requires replacement"
        );
    }
}
