//! Provisioned-capacity model catalog.
//!
//! The catalog maps a model identifier to the topologies it can be deployed
//! under and, per topology, the minimum capacity and the increment above that
//! minimum. It is loaded once, validated eagerly, and never mutated afterwards.
//!
//! Document format (JSON):
//!
//! ```json
//! { "version": "1",
//!   "models": [
//!     { "id": "gpt-4o", "description": "...", "versions": ["2024-08-06"],
//!       "rules": { "regional": { "minimum": 50, "increment": 50 } } } ] }
//! ```
//!
//! `format` is optional per model and defaults to `OpenAI`.
//!
//! Lookups are case-insensitive and treat `_` as `-`. Diagnostics always carry
//! the canonical id as written in the document.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{CoreError, CoreResult};
use crate::topology::Topology;
use crate::CATALOG_FORMAT_V1;

const BUILTIN_CATALOG: &str = include_str!("../data/ptu_models.json");

/// Format assumed when a catalog entry does not name one.
pub const DEFAULT_MODEL_FORMAT: &str = "OpenAI";

/// Minimum and increment for one (model, topology) pair.
///
/// Valid capacities are `minimum + k * increment` for `k >= 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CapacityRule {
    pub minimum: u32,
    pub increment: u32,
}

impl CapacityRule {
    pub fn new(minimum: u32, increment: u32) -> CoreResult<Self> {
        let rule = Self { minimum, increment };
        rule.check()?;
        Ok(rule)
    }

    fn check(&self) -> CoreResult<()> {
        match self.problem() {
            Some(msg) => Err(CoreError::catalog(msg)),
            None => Ok(()),
        }
    }

    fn problem(&self) -> Option<&'static str> {
        if self.minimum == 0 {
            Some("minimum must be greater than zero")
        } else if self.increment == 0 {
            Some("increment must be greater than zero")
        } else {
            None
        }
    }

    /// True when `capacity` lands exactly on `minimum + k * increment`.
    pub fn admits(&self, capacity: u32) -> bool {
        capacity >= self.minimum && (capacity - self.minimum) % self.increment == 0
    }

    /// Closest valid capacities around `capacity`: the largest valid value not
    /// above it and the smallest valid value not below it. Either side is
    /// `None` when no such value exists in `u32`.
    pub fn nearest(&self, capacity: u32) -> (Option<u32>, Option<u32>) {
        if capacity <= self.minimum {
            let below = (capacity == self.minimum).then_some(self.minimum);
            return (below, Some(self.minimum));
        }
        let steps = (capacity - self.minimum) / self.increment;
        let below = self.minimum + steps * self.increment;
        if below == capacity {
            return (Some(below), Some(below));
        }
        (Some(below), below.checked_add(self.increment))
    }
}

/// A flattened (model, topology) rule, as listed by [`ModelCatalog::rules_for`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelRule {
    pub model_id: String,
    pub topology: Topology,
    pub minimum_capacity: u32,
    pub increment: u32,
}

/// One model with its metadata and per-topology rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelEntry {
    pub id: String,
    /// Model format the management API expects, e.g. `OpenAI` or `DeepSeek`.
    pub format: String,
    pub description: String,
    pub versions: Vec<String>,
    pub rules: BTreeMap<Topology, CapacityRule>,
}

impl ModelEntry {
    pub fn rule(&self, topology: Topology) -> Option<CapacityRule> {
        self.rules.get(&topology).copied()
    }

    pub fn topologies(&self) -> BTreeSet<Topology> {
        self.rules.keys().copied().collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogDocument {
    version: String,
    models: Vec<ModelDocument>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ModelDocument {
    id: String,
    #[serde(default = "default_format")]
    format: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    versions: Vec<String>,
    rules: BTreeMap<String, CapacityRule>,
}

fn default_format() -> String {
    DEFAULT_MODEL_FORMAT.to_string()
}

/// Immutable lookup table of model rules.
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    version: String,
    models: Vec<ModelEntry>,
    index: HashMap<String, usize>,
}

/// Normalized lookup key: lowercase, `_` folded to `-`.
fn lookup_key(model_id: &str) -> String {
    model_id.trim().to_ascii_lowercase().replace('_', "-")
}

impl ModelCatalog {
    /// The catalog embedded in the binary.
    pub fn builtin() -> CoreResult<Self> {
        Self::from_json_str(BUILTIN_CATALOG)
    }

    /// Load and validate a catalog document from disk.
    pub fn from_path(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| CoreError::CatalogIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Parse and validate a catalog document.
    pub fn from_json_str(raw: &str) -> CoreResult<Self> {
        let doc: CatalogDocument = serde_json::from_str(raw)?;
        if doc.version != CATALOG_FORMAT_V1 {
            return Err(CoreError::catalog(format!(
                "unsupported catalog version: {} (expected {CATALOG_FORMAT_V1})",
                doc.version
            )));
        }

        let mut entries = Vec::with_capacity(doc.models.len());
        for (idx, m) in doc.models.into_iter().enumerate() {
            let mut rules = BTreeMap::new();
            for (key, rule) in m.rules {
                let topology = Topology::parse(&key).map_err(|_| {
                    CoreError::catalog(format!(
                        "models[{idx}] ({}): unknown topology key: {key}",
                        m.id
                    ))
                })?;
                if rules.insert(topology, rule).is_some() {
                    return Err(CoreError::catalog(format!(
                        "models[{idx}] ({}): topology {} listed twice",
                        m.id,
                        topology.as_str()
                    )));
                }
            }
            entries.push(ModelEntry {
                id: m.id,
                format: m.format,
                description: m.description,
                versions: m.versions,
                rules,
            });
        }

        Self::from_entries(doc.version, entries)
    }

    /// Build a catalog from already-typed entries, applying the same checks as
    /// document loading.
    pub fn from_entries(version: impl Into<String>, models: Vec<ModelEntry>) -> CoreResult<Self> {
        let mut index = HashMap::with_capacity(models.len());
        for (idx, m) in models.iter().enumerate() {
            if m.format.trim().is_empty() {
                return Err(CoreError::catalog(format!("model {}: format must not be empty", m.id)));
            }
            if m.id.trim().is_empty() {
                return Err(CoreError::catalog(format!("models[{idx}]: id must not be empty")));
            }
            if m.rules.is_empty() {
                return Err(CoreError::catalog(format!(
                    "model {}: at least one topology rule is required",
                    m.id
                )));
            }
            for (topology, rule) in &m.rules {
                if let Some(msg) = rule.problem() {
                    return Err(CoreError::catalog(format!(
                        "model {} ({}): {msg}",
                        m.id,
                        topology.as_str()
                    )));
                }
            }
            if let Some(prev) = index.insert(lookup_key(&m.id), idx) {
                return Err(CoreError::catalog(format!(
                    "duplicate model id: {} (conflicts with {})",
                    m.id, models[prev].id
                )));
            }
        }

        Ok(Self {
            version: version.into(),
            models,
            index,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Models in document order.
    pub fn models(&self) -> impl Iterator<Item = &ModelEntry> {
        self.models.iter()
    }

    pub fn entry(&self, model_id: &str) -> Option<&ModelEntry> {
        self.index
            .get(&lookup_key(model_id))
            .map(|&idx| &self.models[idx])
    }

    pub fn is_known(&self, model_id: &str) -> bool {
        self.entry(model_id).is_some()
    }

    pub fn rule(&self, model_id: &str, topology: Topology) -> Option<CapacityRule> {
        self.entry(model_id).and_then(|e| e.rule(topology))
    }

    /// Every rule for the model; empty when the model is unknown.
    pub fn rules_for(&self, model_id: &str) -> Vec<ModelRule> {
        let Some(entry) = self.entry(model_id) else {
            return Vec::new();
        };
        entry
            .rules
            .iter()
            .map(|(topology, rule)| ModelRule {
                model_id: entry.id.clone(),
                topology: *topology,
                minimum_capacity: rule.minimum,
                increment: rule.increment,
            })
            .collect()
    }

    /// Topologies that have a rule for the model; empty when unknown.
    pub fn topologies_for(&self, model_id: &str) -> BTreeSet<Topology> {
        self.entry(model_id)
            .map(ModelEntry::topologies)
            .unwrap_or_default()
    }
}
