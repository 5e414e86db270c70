//! Federated Application Controller Library
//!
//! Reconciles federated cloud application integrations and their user
//! memberships against an identity directory and a credential provisioning
//! service. The host drives every resource through `ResourceController` and
//! persists the returned records between passes.
//!
//! ## Quick Start
//!
//! ```rust
//! use federated_app_controller::prelude::*;
//! ```
//!
//! This brings commonly used types and traits into scope. For more specific imports,
//! use the individual modules.

pub mod config;
pub mod constants;
pub mod controller;
pub mod observability;
pub mod prelude;
pub mod provider;
pub mod resource;
