//! # Resource Schema Export
//!
//! JSON Schema of the configuration surface the host exposes for each
//! resource type, plus the computed outputs it should expect back.

use schemars::schema_for;
use serde::Serialize;
use serde_json::Value;

use crate::resource::{ApplicationSpec, AttachmentSpec};

/// Schema of one resource type
#[derive(Debug, Clone, Serialize)]
pub struct ResourceSchema {
    /// JSON Schema of the authored spec
    pub spec: Value,
    /// Fields the controller fills in and the host must not author
    pub computed: Vec<&'static str>,
}

/// Schemas of every resource type, keyed by resource type name
#[derive(Debug, Clone, Serialize)]
pub struct ResourceSchemas {
    pub application: ResourceSchema,
    pub attachment: ResourceSchema,
}

/// Generate the schemas for both resource types
///
/// # Errors
///
/// Returns an error if a generated schema cannot be converted to JSON.
pub fn resource_schemas() -> Result<ResourceSchemas, serde_json::Error> {
    Ok(ResourceSchemas {
        application: ResourceSchema {
            spec: serde_json::to_value(schema_for!(ApplicationSpec))?,
            computed: vec!["id", "saml_metadata_document"],
        },
        attachment: ResourceSchema {
            spec: serde_json::to_value(schema_for!(AttachmentSpec))?,
            computed: vec!["id", "status", "display_name"],
        },
    })
}
