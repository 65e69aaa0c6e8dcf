//! azptu-core
//!
//! Core primitives for azptu:
//! - Deployment topologies and their management-API SKU names
//! - The provisioned-capacity model catalog (minimum / increment rules)
//! - The capacity validation engine run before every mutating remote call
//! - Project and deployment summaries shared by the store and the CLI
//!
//! Nothing in this crate reads the environment or touches the network. The
//! only I/O is [`ModelCatalog::from_path`], which reads a caller-supplied file.

pub mod catalog;
pub mod errors;
pub mod model;
pub mod topology;
pub mod validation;

pub use crate::catalog::{CapacityRule, ModelCatalog, ModelEntry, ModelRule, DEFAULT_MODEL_FORMAT};
pub use crate::errors::{CoreError, CoreResult};
pub use crate::topology::Topology;
pub use crate::validation::{
    FailureKind, ValidationEngine, ValidationFailure, ValidationRequest, ValidationResult,
    require_positive,
};

/// Version string of the built-in catalog document format.
pub const CATALOG_FORMAT_V1: &str = "1";

/// Convenience re-exports.
pub mod prelude {
    pub use crate::catalog::{CapacityRule, ModelCatalog, ModelEntry, ModelRule, DEFAULT_MODEL_FORMAT};
    pub use crate::model::{DeploymentInfo, DeploymentSpec, ProjectRef, ProjectSummary};
    pub use crate::topology::Topology;
    pub use crate::validation::{
        FailureKind, ValidationEngine, ValidationFailure, ValidationRequest, ValidationResult,
    };
    pub use crate::{CoreError, CoreResult};
}
