//! # Application Controller
//!
//! Reconciles an application integration in the identity directory together
//! with the federated credentials the provisioning service holds for it.
//!
//! ## Create
//!
//! 1. Create the application in the directory
//! 2. Fetch its signed metadata, re-fetching while the document is still empty
//! 3. Set the provisioning credentials
//!
//! A failure after step 1 leaves the application behind. The error carries
//! its id and is reported as partially applied, unless
//! `rollback_failed_create` deleted it again.
//!
//! ## Update
//!
//! Label and identity provider ARN are pushed to the directory and the signed
//! metadata is fetched, then the credentials are rotated: revoke, wait for the
//! revoke to land, set. A set issued while the revoke is still in flight would
//! be wiped by it. Nothing is called after the set.
//!
//! ## Delete
//!
//! Deleting the application invalidates its credentials on the remote side,
//! so no revoke is issued unless `revoke_credentials_on_delete` is set.

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, field, info, info_span, warn, Instrument};

use crate::config::ControllerConfig;
use crate::controller::error::{Operation, ReconcileError, ResourceKind, Stage};
use crate::controller::validation::{validate_application_spec, validate_remote_id};
use crate::controller::wait::{await_revocation, fetch_metadata, OperationScope};
use crate::controller::ResourceController;
use crate::provider::{IdentityDirectory, Provisioning, RemoteApplication};
use crate::resource::{ApplicationRecord, ApplicationSpec, ProvisioningCredentials};

/// Controller for application integrations
pub struct ApplicationController {
    directory: Arc<dyn IdentityDirectory>,
    provisioning: Arc<dyn Provisioning>,
    config: ControllerConfig,
}

impl std::fmt::Debug for ApplicationController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApplicationController")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ApplicationController {
    pub fn new(
        directory: Arc<dyn IdentityDirectory>,
        provisioning: Arc<dyn Provisioning>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            directory,
            provisioning,
            config,
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    fn scope<'a>(&self, operation: Operation, cancel: &'a CancellationToken) -> OperationScope<'a> {
        OperationScope::new(
            ResourceKind::Application,
            operation,
            cancel,
            self.config.remote_call_timeout(),
        )
    }

    async fn create_application(
        &self,
        scope: &mut OperationScope<'_>,
        spec: &ApplicationSpec,
    ) -> Result<ApplicationRecord, ReconcileError> {
        validate_application_spec(spec).map_err(|e| scope.invalid(&e))?;

        let app = scope
            .run(
                Stage::CreateApplication,
                &spec.name,
                self.directory.create_application(&spec.definition()),
            )
            .await?;
        scope.set_remote_id(&app.id);
        tracing::Span::current().record("remote_id", app.id.as_str());
        info!("Created application {} ({})", app.id, spec.name);

        match self.provision(scope, &app, &spec.credentials).await {
            Ok(document) => Ok(ApplicationRecord::from_remote(app, document)),
            Err(e) => Err(self.compensate(scope, &app.id, e).await),
        }
    }

    /// Metadata and credentials for a freshly created application
    async fn provision(
        &self,
        scope: &OperationScope<'_>,
        app: &RemoteApplication,
        credentials: &ProvisioningCredentials,
    ) -> Result<String, ReconcileError> {
        let document = fetch_metadata(
            scope,
            self.directory.as_ref(),
            &app.id,
            &app.signing_key_id,
            &self.config,
        )
        .await?;

        scope
            .run(
                Stage::SetCredentials,
                &app.id,
                self.provisioning.set_credentials(&app.id, credentials),
            )
            .await?;

        Ok(document)
    }

    /// Delete a half-created application when `rollback_failed_create` is set
    ///
    /// Cancelled creates are not compensated. A failed rollback is logged and
    /// the original error is returned unchanged.
    async fn compensate(
        &self,
        scope: &OperationScope<'_>,
        app_id: &str,
        err: ReconcileError,
    ) -> ReconcileError {
        if !self.config.rollback_failed_create || matches!(err, ReconcileError::Cancelled { .. }) {
            return err;
        }

        warn!("Rolling back application {} after failed create: {}", app_id, err);
        let rolled_back = match scope
            .call(
                Stage::DeleteApplication,
                app_id,
                self.directory.delete_application(app_id),
            )
            .await
        {
            Ok(Ok(())) => true,
            Ok(Err(e)) if e.is_not_found() => true,
            Ok(Err(e)) => {
                error!(
                    "Failed to roll back application {}, it is left behind: {}",
                    app_id, e
                );
                false
            }
            Err(cancelled) => {
                error!(
                    "Rollback of application {} interrupted, it is left behind: {}",
                    app_id, cancelled
                );
                false
            }
        };
        err.with_rollback(rolled_back)
    }

    async fn read_application(
        &self,
        scope: &mut OperationScope<'_>,
        app_id: &str,
    ) -> Result<Option<ApplicationRecord>, ReconcileError> {
        validate_remote_id(app_id).map_err(|e| scope.invalid(&e))?;
        scope.set_remote_id(app_id);

        let app = match scope
            .call(
                Stage::GetApplication,
                app_id,
                self.directory.get_application(app_id),
            )
            .await?
        {
            Ok(app) => app,
            Err(e) if e.is_not_found() => {
                info!("Application {} no longer exists in the directory", app_id);
                return Ok(None);
            }
            Err(e) => return Err(scope.fail(Stage::GetApplication, e)),
        };

        let document = fetch_metadata(
            scope,
            self.directory.as_ref(),
            &app.id,
            &app.signing_key_id,
            &self.config,
        )
        .await?;
        Ok(Some(ApplicationRecord::from_remote(app, document)))
    }

    async fn update_application(
        &self,
        scope: &mut OperationScope<'_>,
        app_id: &str,
        spec: &ApplicationSpec,
    ) -> Result<ApplicationRecord, ReconcileError> {
        validate_remote_id(app_id).map_err(|e| scope.invalid(&e))?;
        validate_application_spec(spec).map_err(|e| scope.invalid(&e))?;
        scope.set_remote_id(app_id);

        let app = scope
            .run(
                Stage::UpdateApplication,
                app_id,
                self.directory
                    .update_application(app_id, &spec.label, &spec.identity_provider_arn),
            )
            .await?;
        info!("Updated application {} ({})", app_id, spec.label);

        // The signing key survives the update, so the document is checked
        // before the credentials are touched
        let document = fetch_metadata(
            scope,
            self.directory.as_ref(),
            &app.id,
            &app.signing_key_id,
            &self.config,
        )
        .await?;

        scope
            .run(
                Stage::RevokeCredentials,
                app_id,
                self.provisioning.revoke_credentials(app_id),
            )
            .await?;
        await_revocation(scope, self.provisioning.as_ref(), app_id, &self.config).await?;
        scope
            .run(
                Stage::SetCredentials,
                app_id,
                self.provisioning.set_credentials(app_id, &spec.credentials),
            )
            .await?;
        info!("Rotated provisioning credentials of application {}", app_id);

        Ok(ApplicationRecord::from_remote(app, document))
    }

    async fn delete_application(
        &self,
        scope: &mut OperationScope<'_>,
        app_id: &str,
    ) -> Result<(), ReconcileError> {
        validate_remote_id(app_id).map_err(|e| scope.invalid(&e))?;
        scope.set_remote_id(app_id);

        if self.config.revoke_credentials_on_delete {
            match scope
                .call(
                    Stage::RevokeCredentials,
                    app_id,
                    self.provisioning.revoke_credentials(app_id),
                )
                .await?
            {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(scope.fail(Stage::RevokeCredentials, e)),
            }
        }

        match scope
            .call(
                Stage::DeleteApplication,
                app_id,
                self.directory.delete_application(app_id),
            )
            .await?
        {
            Ok(()) => {
                info!("Deleted application {}", app_id);
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                info!("Application {} already deleted", app_id);
                Ok(())
            }
            Err(e) => Err(scope.fail(Stage::DeleteApplication, e)),
        }
    }
}

#[async_trait]
impl ResourceController for ApplicationController {
    const KIND: ResourceKind = ResourceKind::Application;
    type Spec = ApplicationSpec;
    type Record = ApplicationRecord;

    async fn create(
        &self,
        spec: &ApplicationSpec,
        cancel: &CancellationToken,
    ) -> Result<ApplicationRecord, ReconcileError> {
        let span = info_span!(
            "application.create",
            application.name = %spec.name,
            remote_id = field::Empty
        );
        let mut scope = self.scope(Operation::Create, cancel);
        let result = self
            .create_application(&mut scope, spec)
            .instrument(span)
            .await;
        scope.finish(&result);
        result
    }

    async fn read(
        &self,
        app_id: &String,
        cancel: &CancellationToken,
    ) -> Result<Option<ApplicationRecord>, ReconcileError> {
        let span = info_span!("application.read", remote_id = %app_id);
        let mut scope = self.scope(Operation::Read, cancel);
        let result = self.read_application(&mut scope, app_id).instrument(span).await;
        scope.finish(&result);
        result
    }

    async fn update(
        &self,
        app_id: &String,
        spec: &ApplicationSpec,
        cancel: &CancellationToken,
    ) -> Result<ApplicationRecord, ReconcileError> {
        let span = info_span!("application.update", remote_id = %app_id);
        let mut scope = self.scope(Operation::Update, cancel);
        let result = self
            .update_application(&mut scope, app_id, spec)
            .instrument(span)
            .await;
        scope.finish(&result);
        result
    }

    async fn delete(&self, app_id: &String, cancel: &CancellationToken) -> Result<(), ReconcileError> {
        let span = info_span!("application.delete", remote_id = %app_id);
        let mut scope = self.scope(Operation::Delete, cancel);
        let result = self.delete_application(&mut scope, app_id).instrument(span).await;
        scope.finish(&result);
        result
    }
}
