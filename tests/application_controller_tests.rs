//! # Application Controller Tests
//!
//! End-to-end tests of the application lifecycle against the in-memory
//! directory and provisioning service.
//!
//! These tests verify:
//! - Create publishes metadata and credentials, and Read returns what was declared
//! - An empty metadata document fails the create before any provisioning call
//! - Credential rotation orders revoke, wait and set
//! - Drift is reported as absence and clears the local record
//! - Cancellation and timeouts inside the revocation barrier

mod common;

use std::time::Duration;

use common::{application_spec, harness, positions};
use federated_app_controller::controller::{Operation, Stage};
use federated_app_controller::observability::metrics;
use federated_app_controller::prelude::*;
use federated_app_controller::provider::Service;

#[tokio::test]
async fn test_create_assigns_id_and_metadata() {
    let h = harness(ControllerConfig::default());
    let cancel = CancellationToken::new();

    let record = h
        .applications
        .create(&application_spec(), &cancel)
        .await
        .unwrap();

    let app_id = record.id.clone().expect("remote id assigned");
    assert!(!app_id.is_empty());
    assert!(!record.saml_metadata_document.is_empty());
    assert_eq!(record.label, "Prod AWS");
    assert_eq!(
        h.calls.entries(),
        vec![
            "directory.create_application",
            "directory.get_signed_metadata",
            "provisioning.set_credentials",
        ]
    );
    assert_eq!(
        h.provisioning.credentials(&app_id),
        Some(ProvisioningCredentials::new("AKIAEXAMPLE", "s3cr3t"))
    );
}

#[tokio::test]
async fn test_create_then_read_returns_declared_fields() {
    let h = harness(ControllerConfig::default());
    let cancel = CancellationToken::new();
    let mut spec = application_spec();
    spec.join_all_roles = true;
    spec.session_duration = 7200;
    spec.identity_provider_arn = "arn:aws:iam::123456789012:saml-provider/OKTA".to_string();

    let created = h.applications.create(&spec, &cancel).await.unwrap();
    let app_id = created.id.clone().unwrap();
    let read = h
        .applications
        .read(&app_id, &cancel)
        .await
        .unwrap()
        .expect("application exists");

    assert_eq!(read.id, created.id);
    assert!(read.drifted_fields(&spec).is_empty(), "{:?}", read.drifted_fields(&spec));
    assert_eq!(read.saml_metadata_document, created.saml_metadata_document);
}

#[tokio::test(start_paused = true)]
async fn test_slow_metadata_is_awaited() {
    let h = harness(ControllerConfig::default());
    h.directory.set_metadata_lag(2);
    let cancel = CancellationToken::new();

    let record = h
        .applications
        .create(&application_spec(), &cancel)
        .await
        .unwrap();
    assert!(!record.saml_metadata_document.is_empty());
    assert_eq!(h.calls.count("directory.get_signed_metadata"), 3);
}

#[tokio::test(start_paused = true)]
async fn test_empty_metadata_fails_create_without_provisioning() {
    let h = harness(ControllerConfig::default());
    h.directory.set_metadata_lag(u32::MAX);
    let cancel = CancellationToken::new();

    let err = h
        .applications
        .create(&application_spec(), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ReconcileError::EmptyMetadata {
            operation: Operation::Create,
            rolled_back: false,
            ..
        }
    ));
    assert_eq!(err.kind(), "empty_metadata");
    assert!(err.is_partially_applied());
    assert!(err.remote_id().is_some());
    assert_eq!(h.calls.count("provisioning.set_credentials"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_empty_metadata_rolls_back_when_enabled() {
    let h = harness(ControllerConfig {
        rollback_failed_create: true,
        ..ControllerConfig::default()
    });
    h.directory.set_metadata_lag(u32::MAX);
    let cancel = CancellationToken::new();

    let err = h
        .applications
        .create(&application_spec(), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ReconcileError::EmptyMetadata {
            rolled_back: true,
            ..
        }
    ));
    assert!(!err.is_partially_applied());
    assert_eq!(h.directory.application_count(), 0);
    assert_eq!(h.calls.count("provisioning.set_credentials"), 0);
}

#[tokio::test]
async fn test_invalid_spec_makes_no_remote_calls() {
    let h = harness(ControllerConfig::default());
    let cancel = CancellationToken::new();
    let mut spec = application_spec();
    spec.login_url = "not a url".to_string();

    let err = h.applications.create(&spec, &cancel).await.unwrap_err();
    assert!(matches!(err, ReconcileError::Validation { .. }));
    assert!(err.to_string().contains("login_url"));
    assert!(h.calls.entries().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_update_revokes_waits_then_sets() {
    let h = harness(ControllerConfig::default());
    let cancel = CancellationToken::new();
    let created = h
        .applications
        .create(&application_spec(), &cancel)
        .await
        .unwrap();
    let app_id = created.id.clone().unwrap();
    h.provisioning.set_revocation_lag(3);
    h.calls.clear();

    let mut desired = application_spec();
    desired.label = "Prod AWS (EU)".to_string();
    desired.credentials = ProvisioningCredentials::new("AKIAROTATED", "n3w");
    let updated = h
        .applications
        .update(&app_id, &desired, &cancel)
        .await
        .unwrap();

    let revoke = positions(&h.calls, "provisioning.revoke_credentials");
    let waits = positions(&h.calls, "provisioning.revocation_state");
    let set = positions(&h.calls, "provisioning.set_credentials");
    assert_eq!(revoke.len(), 1);
    assert_eq!(set.len(), 1);
    assert_eq!(waits.len(), 3);
    assert!(revoke[0] < waits[0]);
    assert!(waits.iter().all(|wait| *wait < set[0]));

    assert_eq!(updated.id, created.id);
    assert_eq!(updated.label, "Prod AWS (EU)");
    // The new credentials survive the revoke
    assert_eq!(
        h.provisioning.credentials(&app_id),
        Some(ProvisioningCredentials::new("AKIAROTATED", "n3w"))
    );
}

#[tokio::test(start_paused = true)]
async fn test_update_uses_settle_delay_without_revocation_state() {
    let h = harness(ControllerConfig::default());
    h.provisioning.disable_state_reporting();
    let cancel = CancellationToken::new();
    let created = h
        .applications
        .create(&application_spec(), &cancel)
        .await
        .unwrap();
    let app_id = created.id.unwrap();

    let started = tokio::time::Instant::now();
    h.applications
        .update(&app_id, &application_spec(), &cancel)
        .await
        .unwrap();
    assert!(started.elapsed() >= Duration::from_secs(15));
    assert!(h.provisioning.credentials(&app_id).is_some());
}

#[tokio::test(start_paused = true)]
async fn test_update_with_empty_metadata_leaves_credentials_alone() {
    let h = harness(ControllerConfig::default());
    let cancel = CancellationToken::new();
    let created = h
        .applications
        .create(&application_spec(), &cancel)
        .await
        .unwrap();
    let app_id = created.id.unwrap();
    h.directory.set_metadata_lag(u32::MAX);
    h.calls.clear();

    let mut desired = application_spec();
    desired.credentials = ProvisioningCredentials::new("AKIAROTATED", "n3w");
    let err = h
        .applications
        .update(&app_id, &desired, &cancel)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ReconcileError::EmptyMetadata {
            operation: Operation::Update,
            ..
        }
    ));
    assert_eq!(h.calls.count("provisioning.revoke_credentials"), 0);
    assert_eq!(h.calls.count("provisioning.set_credentials"), 0);
    assert_eq!(
        h.provisioning.credentials(&app_id),
        Some(ProvisioningCredentials::new("AKIAEXAMPLE", "s3cr3t"))
    );
}

#[tokio::test(start_paused = true)]
async fn test_update_makes_no_call_after_set() {
    let h = harness(ControllerConfig::default());
    let cancel = CancellationToken::new();
    let created = h
        .applications
        .create(&application_spec(), &cancel)
        .await
        .unwrap();
    let app_id = created.id.unwrap();
    h.calls.clear();

    let updated = h
        .applications
        .update(&app_id, &application_spec(), &cancel)
        .await
        .unwrap();

    assert!(!updated.saml_metadata_document.is_empty());
    let entries = h.calls.entries();
    assert_eq!(entries.last().map(String::as_str), Some("provisioning.set_credentials"));
    let fetch = positions(&h.calls, "directory.get_signed_metadata");
    let revoke = positions(&h.calls, "provisioning.revoke_credentials");
    assert_eq!(fetch.len(), 1);
    assert!(fetch[0] < revoke[0]);
}

#[tokio::test]
async fn test_update_failing_at_revoke_skips_set() {
    let h = harness(ControllerConfig::default());
    let cancel = CancellationToken::new();
    let created = h
        .applications
        .create(&application_spec(), &cancel)
        .await
        .unwrap();
    let app_id = created.id.clone().unwrap();
    h.calls.clear();
    h.provisioning.fail_on(
        "revoke_credentials",
        RemoteError::unavailable(Service::Provisioning, "503 Service Unavailable"),
    );

    let mut desired = application_spec();
    desired.label = "Renamed".to_string();
    let err = h
        .applications
        .update(&app_id, &desired, &cancel)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ReconcileError::RemoteUpdate {
            stage: Stage::RevokeCredentials,
            ..
        }
    ));
    assert!(err.is_partially_applied());
    assert_eq!(err.remote_id(), Some(app_id.as_str()));
    assert_eq!(h.calls.count("provisioning.set_credentials"), 0);
    // The label change is not rolled back
    assert_eq!(h.directory.application(&app_id).unwrap().label, "Renamed");

    // The persisted record still resolves
    let mut record = Some(created);
    assert!(refresh(&h.applications, &mut record, &cancel).await.unwrap());
    assert_eq!(record.unwrap().id, Some(app_id));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_revocation_barrier() {
    let h = harness(ControllerConfig::default());
    let cancel = CancellationToken::new();
    let created = h
        .applications
        .create(&application_spec(), &cancel)
        .await
        .unwrap();
    let app_id = created.id.unwrap();
    h.provisioning.set_revocation_lag(u32::MAX);

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        trigger.cancel();
    });

    let err = h
        .applications
        .update(&app_id, &application_spec(), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ReconcileError::Cancelled {
            operation: Operation::Update,
            stage: Stage::AwaitRevocation,
            ..
        }
    ));
    assert!(err.is_partially_applied());
    assert_eq!(h.calls.count("provisioning.set_credentials"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unconfirmed_revocation_times_out() {
    let h = harness(ControllerConfig {
        revocation_timeout_secs: 30,
        ..ControllerConfig::default()
    });
    let cancel = CancellationToken::new();
    let created = h
        .applications
        .create(&application_spec(), &cancel)
        .await
        .unwrap();
    let app_id = created.id.unwrap();
    h.provisioning.set_revocation_lag(u32::MAX);

    let err = h
        .applications
        .update(&app_id, &application_spec(), &cancel)
        .await
        .unwrap_err();
    match err {
        ReconcileError::RevocationTimeout { app_id: id, waited } => {
            assert_eq!(id, app_id);
            assert!(waited >= Duration::from_secs(30));
        }
        other => panic!("expected RevocationTimeout, got {other:?}"),
    }
    assert_eq!(h.calls.count("provisioning.set_credentials"), 1);
}

#[tokio::test]
async fn test_read_of_deleted_application_is_absent() {
    let h = harness(ControllerConfig::default());
    let cancel = CancellationToken::new();
    let created = h
        .applications
        .create(&application_spec(), &cancel)
        .await
        .unwrap();
    let app_id = created.id.clone().unwrap();
    h.directory.delete_application_out_of_band(&app_id);

    assert!(h.applications.read(&app_id, &cancel).await.unwrap().is_none());

    let before = metrics::drift_detected("application");
    let mut record = Some(created);
    assert!(!refresh(&h.applications, &mut record, &cancel).await.unwrap());
    assert!(record.is_none());
    assert!(metrics::drift_detected("application") > before);
}

#[tokio::test]
async fn test_read_failure_is_not_drift() {
    let h = harness(ControllerConfig::default());
    let cancel = CancellationToken::new();
    let created = h
        .applications
        .create(&application_spec(), &cancel)
        .await
        .unwrap();
    h.directory.fail_on(
        "get_application",
        RemoteError::unavailable(Service::Directory, "connection reset"),
    );

    let mut record = Some(created.clone());
    let err = refresh(&h.applications, &mut record, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, ReconcileError::RemoteRead { .. }));
    assert_eq!(record, Some(created));
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let h = harness(ControllerConfig::default());
    let cancel = CancellationToken::new();
    let created = h
        .applications
        .create(&application_spec(), &cancel)
        .await
        .unwrap();
    let app_id = created.id.unwrap();

    h.applications.delete(&app_id, &cancel).await.unwrap();
    h.applications.delete(&app_id, &cancel).await.unwrap();
    assert_eq!(h.directory.application_count(), 0);
    assert_eq!(h.calls.count("provisioning.revoke_credentials"), 0);
}
