//! # In-Memory Providers
//!
//! `IdentityDirectory` and `Provisioning` implementations backed by
//! mutex-protected maps. They model the remote behaviour the controllers
//! have to cope with:
//!
//! - signed metadata that stays empty for the first few fetches of a new application
//! - credential revokes that complete asynchronously, wiping any credentials
//!   set while they were still in flight
//! - injected failures per call name
//!
//! Every call is appended to a `CallLog`, which can be shared between both
//! providers to assert cross-service ordering.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::provider::{
    ApplicationDefinition, IdentityDirectory, Membership, MembershipProfile, Provisioning,
    RemoteApplication, RemoteError, RevocationState, Service,
};
use crate::resource::ProvisioningCredentials;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Ordered record of remote calls, as `service.call` strings
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, service: Service, call: &str) {
        lock(&self.0).push(format!("{service}.{call}"));
    }

    /// All calls so far, oldest first
    pub fn entries(&self) -> Vec<String> {
        lock(&self.0).clone()
    }

    /// Number of times `call` (as `service.call`) was made
    pub fn count(&self, call: &str) -> usize {
        lock(&self.0).iter().filter(|entry| *entry == call).count()
    }

    /// Index of the first occurrence of `call`
    pub fn position(&self, call: &str) -> Option<usize> {
        lock(&self.0).iter().position(|entry| entry == call)
    }

    pub fn clear(&self) {
        lock(&self.0).clear();
    }
}

#[derive(Debug)]
struct StoredApplication {
    app: RemoteApplication,
    metadata_fetches: u32,
}

#[derive(Debug, Clone)]
struct DirectoryUser {
    id: String,
    email: String,
    domain: String,
    display_name: String,
}

#[derive(Debug, Default)]
struct DirectoryState {
    next_id: u64,
    applications: BTreeMap<String, StoredApplication>,
    users: Vec<DirectoryUser>,
    memberships: BTreeMap<(String, String), Membership>,
    metadata_lag: u32,
    failures: HashMap<String, RemoteError>,
}

impl DirectoryState {
    fn check(&self, call: &str) -> Result<(), RemoteError> {
        self.failures.get(call).cloned().map_or(Ok(()), Err)
    }

    fn application_mut(&mut self, app_id: &str) -> Result<&mut StoredApplication, RemoteError> {
        self.applications
            .get_mut(app_id)
            .ok_or_else(|| RemoteError::not_found(Service::Directory, format!("application {app_id}")))
    }
}

/// In-memory identity directory
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    state: Mutex<DirectoryState>,
    calls: CallLog,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record calls into `calls` instead of a private log
    #[must_use]
    pub fn with_call_log(mut self, calls: CallLog) -> Self {
        self.calls = calls;
        self
    }

    pub fn call_log(&self) -> CallLog {
        self.calls.clone()
    }

    /// Register a directory user; an empty `domain` means the default partition
    pub fn add_user(&self, user_id: &str, email: &str, domain: &str, display_name: &str) {
        lock(&self.state).users.push(DirectoryUser {
            id: user_id.to_string(),
            email: email.to_string(),
            domain: domain.to_string(),
            display_name: display_name.to_string(),
        });
    }

    /// Serve an empty metadata document for the first `fetches` fetches of each application
    pub fn set_metadata_lag(&self, fetches: u32) {
        lock(&self.state).metadata_lag = fetches;
    }

    /// Fail every subsequent `call` (trait method name) with `error`
    pub fn fail_on(&self, call: &str, error: RemoteError) {
        lock(&self.state).failures.insert(call.to_string(), error);
    }

    pub fn clear_failures(&self) {
        lock(&self.state).failures.clear();
    }

    pub fn application(&self, app_id: &str) -> Option<RemoteApplication> {
        lock(&self.state)
            .applications
            .get(app_id)
            .map(|stored| stored.app.clone())
    }

    pub fn application_count(&self) -> usize {
        lock(&self.state).applications.len()
    }

    pub fn membership(&self, app_id: &str, user_id: &str) -> Option<Membership> {
        lock(&self.state)
            .memberships
            .get(&(app_id.to_string(), user_id.to_string()))
            .cloned()
    }

    /// Delete an application without going through the trait, as another actor would
    pub fn delete_application_out_of_band(&self, app_id: &str) {
        let mut state = lock(&self.state);
        state.applications.remove(app_id);
        state.memberships.retain(|(app, _), _| app != app_id);
    }

    /// Remove a membership without going through the trait, as another actor would
    pub fn remove_membership_out_of_band(&self, app_id: &str, user_id: &str) {
        lock(&self.state)
            .memberships
            .remove(&(app_id.to_string(), user_id.to_string()));
    }
}

#[async_trait]
impl IdentityDirectory for InMemoryDirectory {
    async fn create_application(
        &self,
        definition: &ApplicationDefinition,
    ) -> Result<RemoteApplication, RemoteError> {
        self.calls.push(Service::Directory, "create_application");
        let mut state = lock(&self.state);
        state.check("create_application")?;

        state.next_id += 1;
        let id = format!("0oa{:06}", state.next_id);
        let app = RemoteApplication {
            id: id.clone(),
            name: definition.name.clone(),
            label: definition.label.clone(),
            sign_on_mode: definition.sign_on_mode.clone(),
            status: "ACTIVE".to_string(),
            signing_key_id: format!("kid-{id}"),
            settings: definition.settings.clone(),
        };
        state.applications.insert(
            id,
            StoredApplication {
                app: app.clone(),
                metadata_fetches: 0,
            },
        );
        Ok(app)
    }

    async fn get_application(&self, app_id: &str) -> Result<RemoteApplication, RemoteError> {
        self.calls.push(Service::Directory, "get_application");
        let mut state = lock(&self.state);
        state.check("get_application")?;
        Ok(state.application_mut(app_id)?.app.clone())
    }

    async fn update_application(
        &self,
        app_id: &str,
        label: &str,
        identity_provider_arn: &str,
    ) -> Result<RemoteApplication, RemoteError> {
        self.calls.push(Service::Directory, "update_application");
        let mut state = lock(&self.state);
        state.check("update_application")?;
        let stored = state.application_mut(app_id)?;
        label.clone_into(&mut stored.app.label);
        identity_provider_arn.clone_into(&mut stored.app.settings.identity_provider_arn);
        Ok(stored.app.clone())
    }

    async fn delete_application(&self, app_id: &str) -> Result<(), RemoteError> {
        self.calls.push(Service::Directory, "delete_application");
        let mut state = lock(&self.state);
        state.check("delete_application")?;
        state.application_mut(app_id)?;
        state.applications.remove(app_id);
        state.memberships.retain(|(app, _), _| app != app_id);
        Ok(())
    }

    async fn get_signed_metadata(
        &self,
        app_id: &str,
        signing_key_id: &str,
    ) -> Result<String, RemoteError> {
        self.calls.push(Service::Directory, "get_signed_metadata");
        let mut state = lock(&self.state);
        state.check("get_signed_metadata")?;
        let lag = state.metadata_lag;
        let stored = state.application_mut(app_id)?;
        if stored.app.signing_key_id != signing_key_id {
            return Err(RemoteError::rejected(
                Service::Directory,
                Some(400),
                format!("unknown signing key {signing_key_id} for application {app_id}"),
            ));
        }

        stored.metadata_fetches += 1;
        if stored.metadata_fetches <= lag {
            return Ok(String::new());
        }
        Ok(format!(
            "<md:EntityDescriptor entityID=\"http://www.okta.com/{app_id}\"><ds:KeyName>{signing_key_id}</ds:KeyName></md:EntityDescriptor>"
        ))
    }

    async fn resolve_user_id(
        &self,
        email: &str,
        domain: Option<&str>,
    ) -> Result<String, RemoteError> {
        self.calls.push(Service::Directory, "resolve_user_id");
        let state = lock(&self.state);
        state.check("resolve_user_id")?;
        state
            .users
            .iter()
            .find(|user| {
                user.email.eq_ignore_ascii_case(email)
                    && domain.map_or(true, |domain| user.domain == domain)
            })
            .map(|user| user.id.clone())
            .ok_or_else(|| {
                RemoteError::not_found(
                    Service::Directory,
                    format!("user {email} in domain '{}'", domain.unwrap_or_default()),
                )
            })
    }

    async fn add_membership(
        &self,
        app_id: &str,
        user_id: &str,
        role: &str,
        role_mappings: &[String],
    ) -> Result<Membership, RemoteError> {
        self.calls.push(Service::Directory, "add_membership");
        let mut state = lock(&self.state);
        state.check("add_membership")?;
        state.application_mut(app_id)?;
        let user = state
            .users
            .iter()
            .find(|user| user.id == user_id)
            .cloned()
            .ok_or_else(|| RemoteError::not_found(Service::Directory, format!("user {user_id}")))?;

        let membership = Membership {
            app_id: app_id.to_string(),
            user_id: user_id.to_string(),
            status: "PROVISIONED".to_string(),
            profile: MembershipProfile {
                email: user.email,
                display_name: user.display_name,
                role: role.to_string(),
                saml_roles: role_mappings.to_vec(),
            },
        };
        state
            .memberships
            .insert((app_id.to_string(), user_id.to_string()), membership.clone());
        Ok(membership)
    }

    async fn get_membership(&self, app_id: &str, user_id: &str) -> Result<Membership, RemoteError> {
        self.calls.push(Service::Directory, "get_membership");
        let state = lock(&self.state);
        state.check("get_membership")?;
        state
            .memberships
            .get(&(app_id.to_string(), user_id.to_string()))
            .cloned()
            .ok_or_else(|| {
                RemoteError::not_found(Service::Directory, format!("membership {app_id}/{user_id}"))
            })
    }

    async fn remove_membership(&self, app_id: &str, user_id: &str) -> Result<(), RemoteError> {
        self.calls.push(Service::Directory, "remove_membership");
        let mut state = lock(&self.state);
        state.check("remove_membership")?;
        state
            .memberships
            .remove(&(app_id.to_string(), user_id.to_string()))
            .map(|_| ())
            .ok_or_else(|| {
                RemoteError::not_found(Service::Directory, format!("membership {app_id}/{user_id}"))
            })
    }
}

#[derive(Debug)]
struct PendingRevocation {
    remaining_checks: u32,
}

#[derive(Debug)]
struct ProvisioningState {
    credentials: HashMap<String, ProvisioningCredentials>,
    pending: HashMap<String, PendingRevocation>,
    revocation_lag: u32,
    reports_state: bool,
    failures: HashMap<String, RemoteError>,
}

impl Default for ProvisioningState {
    fn default() -> Self {
        Self {
            credentials: HashMap::new(),
            pending: HashMap::new(),
            revocation_lag: 0,
            reports_state: true,
            failures: HashMap::new(),
        }
    }
}

impl ProvisioningState {
    fn check(&self, call: &str) -> Result<(), RemoteError> {
        self.failures.get(call).cloned().map_or(Ok(()), Err)
    }

    fn complete_revocation(&mut self, app_id: &str) {
        self.pending.remove(app_id);
        // Whatever is stored when the revoke lands is wiped, including
        // credentials set while it was in flight.
        self.credentials.remove(app_id);
    }
}

/// In-memory credential provisioning service
#[derive(Debug, Default)]
pub struct InMemoryProvisioning {
    state: Mutex<ProvisioningState>,
    calls: CallLog,
}

impl InMemoryProvisioning {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record calls into `calls` instead of a private log
    #[must_use]
    pub fn with_call_log(mut self, calls: CallLog) -> Self {
        self.calls = calls;
        self
    }

    pub fn call_log(&self) -> CallLog {
        self.calls.clone()
    }

    /// Keep each revoke in flight for `checks` revocation state checks
    ///
    /// `u32::MAX` keeps revokes pending forever.
    pub fn set_revocation_lag(&self, checks: u32) {
        lock(&self.state).revocation_lag = checks;
    }

    /// Stop reporting revocation state; revokes then complete immediately
    pub fn disable_state_reporting(&self) {
        lock(&self.state).reports_state = false;
    }

    /// Fail every subsequent `call` (trait method name) with `error`
    pub fn fail_on(&self, call: &str, error: RemoteError) {
        lock(&self.state).failures.insert(call.to_string(), error);
    }

    pub fn clear_failures(&self) {
        lock(&self.state).failures.clear();
    }

    /// Credentials currently held for an application
    pub fn credentials(&self, app_id: &str) -> Option<ProvisioningCredentials> {
        lock(&self.state).credentials.get(app_id).cloned()
    }

    /// Land every in-flight revoke now
    pub fn complete_pending_revocations(&self) {
        let mut state = lock(&self.state);
        let pending: Vec<String> = state.pending.keys().cloned().collect();
        for app_id in pending {
            state.complete_revocation(&app_id);
        }
    }
}

#[async_trait]
impl Provisioning for InMemoryProvisioning {
    async fn set_credentials(
        &self,
        app_id: &str,
        credentials: &ProvisioningCredentials,
    ) -> Result<(), RemoteError> {
        self.calls.push(Service::Provisioning, "set_credentials");
        let mut state = lock(&self.state);
        state.check("set_credentials")?;
        state
            .credentials
            .insert(app_id.to_string(), credentials.clone());
        Ok(())
    }

    async fn revoke_credentials(&self, app_id: &str) -> Result<(), RemoteError> {
        self.calls.push(Service::Provisioning, "revoke_credentials");
        let mut state = lock(&self.state);
        state.check("revoke_credentials")?;
        if state.revocation_lag == 0 || !state.reports_state {
            state.complete_revocation(app_id);
        } else {
            let remaining_checks = state.revocation_lag;
            state
                .pending
                .insert(app_id.to_string(), PendingRevocation { remaining_checks });
        }
        Ok(())
    }

    async fn revocation_state(&self, app_id: &str) -> Result<RevocationState, RemoteError> {
        self.calls.push(Service::Provisioning, "revocation_state");
        let mut state = lock(&self.state);
        state.check("revocation_state")?;
        if !state.reports_state {
            return Ok(RevocationState::Unsupported);
        }

        let finished = match state.pending.get_mut(app_id) {
            Some(pending) if pending.remaining_checks <= 1 => true,
            Some(pending) => {
                pending.remaining_checks -= 1;
                return Ok(RevocationState::Revoking);
            }
            None => false,
        };
        if finished {
            state.complete_revocation(app_id);
        }

        if state.credentials.contains_key(app_id) {
            Ok(RevocationState::Active)
        } else {
            Ok(RevocationState::Revoked)
        }
    }
}
