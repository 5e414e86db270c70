//! Common test utilities for controller integration tests
//!
//! Builds both controllers over shared in-memory providers that record
//! every remote call into one `CallLog`.

#![allow(dead_code, reason = "Each test binary uses a different subset of helpers")]

use std::sync::{Arc, Once};

use federated_app_controller::prelude::*;
use federated_app_controller::provider::memory::{CallLog, InMemoryDirectory, InMemoryProvisioning};

static TRACING_INIT: Once = Once::new();

/// Install a test-writer subscriber once per test binary
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("federated_app_controller=debug")
            .with_test_writer()
            .try_init();
    });
}

pub struct Harness {
    pub calls: CallLog,
    pub directory: Arc<InMemoryDirectory>,
    pub provisioning: Arc<InMemoryProvisioning>,
    pub applications: ApplicationController,
    pub attachments: AttachmentController,
}

pub fn harness(config: ControllerConfig) -> Harness {
    init_tracing();
    let calls = CallLog::new();
    let directory = Arc::new(InMemoryDirectory::new().with_call_log(calls.clone()));
    let provisioning = Arc::new(InMemoryProvisioning::new().with_call_log(calls.clone()));
    directory.add_user("00u1", "alice@example.com", "", "Alice Example");
    directory.add_user("00u2", "alice@example.com", "corp", "Alice Corp");

    let applications = ApplicationController::new(
        Arc::clone(&directory) as Arc<dyn IdentityDirectory>,
        Arc::clone(&provisioning) as Arc<dyn Provisioning>,
        config.clone(),
    );
    let attachments =
        AttachmentController::new(Arc::clone(&directory) as Arc<dyn IdentityDirectory>, config);

    Harness {
        calls,
        directory,
        provisioning,
        applications,
        attachments,
    }
}

pub const APPLICATION_YAML: &str = r"
name: amazon_aws
label: Prod AWS
aws_environment_type: aws
group_filter: okta_aws_*
login_url: https://example.com/login
role_value_pattern: arn:aws:iam::*
access_key: AKIAEXAMPLE
secret: s3cr3t
";

pub fn application_spec() -> ApplicationSpec {
    serde_yaml::from_str(APPLICATION_YAML).expect("fixture spec is valid YAML")
}

pub fn attachment_spec(app_id: &str) -> AttachmentSpec {
    AttachmentSpec {
        app_id: app_id.to_string(),
        role: "admin".to_string(),
        user: "alice@example.com".to_string(),
        domain: String::new(),
        saml_roles: vec!["dev".to_string(), "ops".to_string()],
    }
}

/// Index of every occurrence of `call` in the log
pub fn positions(calls: &CallLog, call: &str) -> Vec<usize> {
    calls
        .entries()
        .iter()
        .enumerate()
        .filter(|(_, entry)| entry.as_str() == call)
        .map(|(index, _)| index)
        .collect()
}
