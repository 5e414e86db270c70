//! # Provisioning Credentials
//!
//! The access key / secret pair handed to the provisioning service.
//! The pair is write-only: it is accepted from the desired state, sent to
//! the provisioning service, and never read back or persisted in a record.

use schemars::JsonSchema;
use serde::Deserialize;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Federated-access credentials for one application
///
/// The secret is wiped from memory on drop and never shows up in `Debug` output.
#[derive(Clone, PartialEq, Eq, Deserialize, JsonSchema, Zeroize, ZeroizeOnDrop)]
pub struct ProvisioningCredentials {
    /// Access key of the cloud identity the provisioning service acts as
    #[schemars(extend("writeOnly" = true))]
    pub access_key: String,
    /// Secret paired with `access_key`
    #[schemars(extend("writeOnly" = true))]
    pub secret: String,
}

impl ProvisioningCredentials {
    pub fn new(access_key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret: secret.into(),
        }
    }
}

impl std::fmt::Debug for ProvisioningCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvisioningCredentials")
            .field("access_key", &self.access_key)
            .field("secret", &"<redacted>")
            .finish()
    }
}
