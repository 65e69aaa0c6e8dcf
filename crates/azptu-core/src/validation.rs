//! Capacity validation.
//!
//! Decides whether a requested capacity is acceptable for a model, a topology
//! and, for scale updates, the deployment's current capacity. The engine is a
//! pure function of its inputs: no I/O, no logging, no hidden state.
//!
//! Checks run in a fixed order so the reported diagnostic is always the most
//! specific one that applies:
//! 1. the model exists in the catalog
//! 2. the model has a rule for the topology
//! 3. the capacity reaches the topology minimum
//! 4. the capacity sits on a `minimum + k * increment` step
//! 5. for updates, the capacity differs from the current one

use std::fmt;

use serde::Serialize;

use crate::catalog::ModelCatalog;
use crate::errors::{CoreError, CoreResult};
use crate::topology::Topology;

/// One capacity check, built per command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationRequest {
    model_id: String,
    topology: Topology,
    requested_capacity: u32,
    previous_capacity: Option<u32>,
}

impl ValidationRequest {
    /// Request for a new deployment.
    pub fn create(model_id: impl Into<String>, topology: Topology, capacity: i64) -> CoreResult<Self> {
        Ok(Self {
            model_id: model_id.into(),
            topology,
            requested_capacity: positive_capacity(capacity, "capacity")?,
            previous_capacity: None,
        })
    }

    /// Request for a scale update of an existing deployment.
    pub fn update(
        model_id: impl Into<String>,
        topology: Topology,
        capacity: i64,
        previous_capacity: u32,
    ) -> CoreResult<Self> {
        Ok(Self {
            model_id: model_id.into(),
            topology,
            requested_capacity: positive_capacity(capacity, "new capacity")?,
            previous_capacity: Some(previous_capacity),
        })
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    pub fn requested_capacity(&self) -> u32 {
        self.requested_capacity
    }

    pub fn previous_capacity(&self) -> Option<u32> {
        self.previous_capacity
    }
}

/// Checks that a command-line capacity is a positive `u32`. Used on its own
/// when the request cannot be built yet, e.g. before the current deployment
/// has been fetched for an update.
pub fn require_positive(value: i64, field: &str) -> CoreResult<u32> {
    positive_capacity(value, field)
}

fn positive_capacity(value: i64, field: &str) -> CoreResult<u32> {
    if value <= 0 {
        return Err(CoreError::invalid_argument(format!(
            "{field} must be a positive integer, got {value}"
        )));
    }
    u32::try_from(value)
        .map_err(|_| CoreError::invalid_argument(format!("{field} is too large: {value}")))
}

/// Stable machine-readable failure codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    UnknownModel,
    UnsupportedTopology,
    BelowMinimum,
    InvalidIncrement,
    NoChange,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownModel => "unknown_model",
            Self::UnsupportedTopology => "unsupported_topology",
            Self::BelowMinimum => "below_minimum",
            Self::InvalidIncrement => "invalid_increment",
            Self::NoChange => "no_change",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a request was rejected. Model ids are the catalog's canonical spelling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationFailure {
    #[error("model {model} is not in the provisioned-capacity catalog")]
    UnknownModel { model: String },

    #[error(
        "model {model} does not support {requested} deployments (supported: {})",
        labels(.supported)
    )]
    UnsupportedTopology {
        model: String,
        requested: Topology,
        supported: Vec<Topology>,
    },

    #[error("capacity below minimum for {model} ({topology}): minimum {minimum}, provided {provided}")]
    BelowMinimum {
        model: String,
        topology: Topology,
        minimum: u32,
        provided: u32,
    },

    #[error(
        "invalid capacity {provided} for {model} ({topology}): use increments of {increment} above {minimum}{}",
        nearest_hint(*.nearest_below, *.nearest_above)
    )]
    InvalidIncrement {
        model: String,
        topology: Topology,
        minimum: u32,
        increment: u32,
        provided: u32,
        nearest_below: Option<u32>,
        nearest_above: Option<u32>,
    },

    #[error("deployment already has capacity {capacity}; nothing to update")]
    NoChange { capacity: u32 },
}

fn labels(topologies: &[Topology]) -> String {
    topologies
        .iter()
        .map(Topology::label)
        .collect::<Vec<_>>()
        .join(", ")
}

fn nearest_hint(below: Option<u32>, above: Option<u32>) -> String {
    match (below, above) {
        (Some(b), Some(a)) => format!(" (nearest valid: {b} or {a})"),
        (Some(b), None) => format!(" (nearest valid: {b})"),
        (None, Some(a)) => format!(" (nearest valid: {a})"),
        (None, None) => String::new(),
    }
}

impl ValidationFailure {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::UnknownModel { .. } => FailureKind::UnknownModel,
            Self::UnsupportedTopology { .. } => FailureKind::UnsupportedTopology,
            Self::BelowMinimum { .. } => FailureKind::BelowMinimum,
            Self::InvalidIncrement { .. } => FailureKind::InvalidIncrement,
            Self::NoChange { .. } => FailureKind::NoChange,
        }
    }
}

/// Outcome of [`ValidationEngine::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<ValidationFailure>,
}

impl ValidationResult {
    fn accept() -> Self {
        Self { accepted: true, reason: None }
    }

    fn reject(reason: ValidationFailure) -> Self {
        Self { accepted: false, reason: Some(reason) }
    }

    pub fn accepted(&self) -> bool {
        self.accepted
    }

    pub fn reason(&self) -> Option<&ValidationFailure> {
        self.reason.as_ref()
    }

    pub fn into_result(self) -> Result<(), ValidationFailure> {
        match self.reason {
            None => Ok(()),
            Some(f) => Err(f),
        }
    }
}

impl From<ValidationFailure> for ValidationResult {
    fn from(reason: ValidationFailure) -> Self {
        Self::reject(reason)
    }
}

/// Runs capacity checks against a catalog supplied at construction.
#[derive(Debug, Clone, Copy)]
pub struct ValidationEngine<'a> {
    catalog: &'a ModelCatalog,
}

impl<'a> ValidationEngine<'a> {
    pub fn new(catalog: &'a ModelCatalog) -> Self {
        Self { catalog }
    }

    pub fn validate(&self, req: &ValidationRequest) -> ValidationResult {
        match self.check(req) {
            Ok(()) => ValidationResult::accept(),
            Err(f) => ValidationResult::reject(f),
        }
    }

    fn check(&self, req: &ValidationRequest) -> Result<(), ValidationFailure> {
        let entry = self
            .catalog
            .entry(req.model_id())
            .ok_or_else(|| ValidationFailure::UnknownModel {
                model: req.model_id().to_string(),
            })?;

        let rule = entry
            .rule(req.topology())
            .ok_or_else(|| ValidationFailure::UnsupportedTopology {
                model: entry.id.clone(),
                requested: req.topology(),
                supported: entry.topologies().into_iter().collect(),
            })?;

        let provided = req.requested_capacity();
        if provided < rule.minimum {
            return Err(ValidationFailure::BelowMinimum {
                model: entry.id.clone(),
                topology: req.topology(),
                minimum: rule.minimum,
                provided,
            });
        }

        if !rule.admits(provided) {
            let (nearest_below, nearest_above) = rule.nearest(provided);
            return Err(ValidationFailure::InvalidIncrement {
                model: entry.id.clone(),
                topology: req.topology(),
                minimum: rule.minimum,
                increment: rule.increment,
                provided,
                nearest_below,
                nearest_above,
            });
        }

        if req.previous_capacity() == Some(provided) {
            return Err(ValidationFailure::NoChange { capacity: provided });
        }

        Ok(())
    }
}
