//! # Attachment Controller
//!
//! Reconciles one user's membership in an application. The user is resolved
//! from an email (optionally scoped to a directory domain) and the resolved
//! user id becomes the record's remote id.
//!
//! Create and update share one path: adding a membership is an upsert on
//! the directory side, so both re-issue it with the desired role and SAML
//! role mappings and then read the membership back.
//!
//! Errors carry the resolved user id as their remote id, matching
//! `AttachmentRecord::id`. The application id is already in the desired state.

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{field, info, info_span, Instrument};

use crate::config::ControllerConfig;
use crate::controller::error::{Operation, ReconcileError, ResourceKind, Stage};
use crate::controller::validation::{
    validate_attachment_key, validate_attachment_spec, validate_attachment_target,
};
use crate::controller::wait::OperationScope;
use crate::controller::ResourceController;
use crate::provider::IdentityDirectory;
use crate::resource::{AttachmentKey, AttachmentRecord, AttachmentSpec};

/// Controller for application memberships
pub struct AttachmentController {
    directory: Arc<dyn IdentityDirectory>,
    config: ControllerConfig,
}

impl std::fmt::Debug for AttachmentController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachmentController")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AttachmentController {
    pub fn new(directory: Arc<dyn IdentityDirectory>, config: ControllerConfig) -> Self {
        Self { directory, config }
    }

    fn scope<'a>(&self, operation: Operation, cancel: &'a CancellationToken) -> OperationScope<'a> {
        OperationScope::new(
            ResourceKind::Attachment,
            operation,
            cancel,
            self.config.remote_call_timeout(),
        )
    }

    async fn create_attachment(
        &self,
        scope: &mut OperationScope<'_>,
        spec: &AttachmentSpec,
    ) -> Result<AttachmentRecord, ReconcileError> {
        validate_attachment_spec(spec).map_err(|e| scope.invalid(&e))?;

        let user_id = match scope
            .call(
                Stage::ResolveUser,
                &spec.user,
                self.directory
                    .resolve_user_id(&spec.user, spec.domain_scope()),
            )
            .await?
        {
            Ok(user_id) => user_id,
            Err(e) if e.is_not_found() => {
                return Err(ReconcileError::UserResolution {
                    email: spec.user.clone(),
                    domain: spec.domain.clone(),
                })
            }
            Err(e) => return Err(scope.fail(Stage::ResolveUser, e)),
        };

        let key = AttachmentKey::new(spec.app_id.as_str(), user_id);
        tracing::Span::current().record("remote_id", field::display(&key));
        self.upsert(scope, &key, spec).await
    }

    /// Add or overwrite the membership, then read it back
    ///
    /// The remote id is attached to errors once the membership has been written.
    async fn upsert(
        &self,
        scope: &mut OperationScope<'_>,
        key: &AttachmentKey,
        spec: &AttachmentSpec,
    ) -> Result<AttachmentRecord, ReconcileError> {
        let target = key.to_string();
        scope
            .run(
                Stage::AddMembership,
                &target,
                self.directory.add_membership(
                    &key.app_id,
                    &key.user_id,
                    &spec.role,
                    &spec.saml_roles,
                ),
            )
            .await?;
        scope.set_remote_id(key.user_id.as_str());
        info!(
            "Attached {} to application {} as {}",
            spec.user, key.app_id, spec.role
        );

        let membership = scope
            .run(
                Stage::ReadBack,
                &target,
                self.directory.get_membership(&key.app_id, &key.user_id),
            )
            .await?;
        Ok(AttachmentRecord::from_membership(membership).with_identity(&spec.user, &spec.domain))
    }

    async fn read_attachment(
        &self,
        scope: &mut OperationScope<'_>,
        key: &AttachmentKey,
    ) -> Result<Option<AttachmentRecord>, ReconcileError> {
        validate_attachment_key(key).map_err(|e| scope.invalid(&e))?;
        let target = key.to_string();
        scope.set_remote_id(key.user_id.as_str());

        // Only the directory's not-found means the membership is gone
        match scope
            .call(
                Stage::GetMembership,
                &target,
                self.directory.get_membership(&key.app_id, &key.user_id),
            )
            .await?
        {
            Ok(membership) => Ok(Some(AttachmentRecord::from_membership(membership))),
            Err(e) if e.is_not_found() => {
                info!("Membership {} no longer exists in the directory", target);
                Ok(None)
            }
            Err(e) => Err(scope.fail(Stage::GetMembership, e)),
        }
    }

    async fn update_attachment(
        &self,
        scope: &mut OperationScope<'_>,
        key: &AttachmentKey,
        spec: &AttachmentSpec,
    ) -> Result<AttachmentRecord, ReconcileError> {
        validate_attachment_key(key).map_err(|e| scope.invalid(&e))?;
        validate_attachment_spec(spec).map_err(|e| scope.invalid(&e))?;
        validate_attachment_target(key, spec).map_err(|e| scope.invalid(&e))?;
        scope.set_remote_id(key.user_id.as_str());
        self.upsert(scope, key, spec).await
    }

    async fn delete_attachment(
        &self,
        scope: &mut OperationScope<'_>,
        key: &AttachmentKey,
    ) -> Result<(), ReconcileError> {
        validate_attachment_key(key).map_err(|e| scope.invalid(&e))?;
        let target = key.to_string();
        scope.set_remote_id(key.user_id.as_str());

        match scope
            .call(
                Stage::RemoveMembership,
                &target,
                self.directory.remove_membership(&key.app_id, &key.user_id),
            )
            .await?
        {
            Ok(()) => {
                info!("Removed membership {}", target);
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                info!("Membership {} already removed", target);
                Ok(())
            }
            Err(e) => Err(scope.fail(Stage::RemoveMembership, e)),
        }
    }
}

#[async_trait]
impl ResourceController for AttachmentController {
    const KIND: ResourceKind = ResourceKind::Attachment;
    type Spec = AttachmentSpec;
    type Record = AttachmentRecord;

    async fn create(
        &self,
        spec: &AttachmentSpec,
        cancel: &CancellationToken,
    ) -> Result<AttachmentRecord, ReconcileError> {
        let span = info_span!(
            "attachment.create",
            application.id = %spec.app_id,
            remote_id = field::Empty
        );
        let mut scope = self.scope(Operation::Create, cancel);
        let result = self
            .create_attachment(&mut scope, spec)
            .instrument(span)
            .await;
        scope.finish(&result);
        result
    }

    async fn read(
        &self,
        key: &AttachmentKey,
        cancel: &CancellationToken,
    ) -> Result<Option<AttachmentRecord>, ReconcileError> {
        let span = info_span!("attachment.read", remote_id = %key);
        let mut scope = self.scope(Operation::Read, cancel);
        let result = self.read_attachment(&mut scope, key).instrument(span).await;
        scope.finish(&result);
        result
    }

    async fn update(
        &self,
        key: &AttachmentKey,
        spec: &AttachmentSpec,
        cancel: &CancellationToken,
    ) -> Result<AttachmentRecord, ReconcileError> {
        let span = info_span!("attachment.update", remote_id = %key);
        let mut scope = self.scope(Operation::Update, cancel);
        let result = self
            .update_attachment(&mut scope, key, spec)
            .instrument(span)
            .await;
        scope.finish(&result);
        result
    }

    async fn delete(
        &self,
        key: &AttachmentKey,
        cancel: &CancellationToken,
    ) -> Result<(), ReconcileError> {
        let span = info_span!("attachment.delete", remote_id = %key);
        let mut scope = self.scope(Operation::Delete, cancel);
        let result = self.delete_attachment(&mut scope, key).instrument(span).await;
        scope.finish(&result);
        result
    }
}
