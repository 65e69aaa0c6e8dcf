//! Shared data types for projects and deployments.
//!
//! These are the shapes the CLI renders and the state store caches. They are
//! plain data; the remote client fills them in from management-API responses.

use serde::{Deserialize, Serialize};

use crate::topology::Topology;

/// Account kinds that can host model deployments.
pub const AI_ACCOUNT_KINDS: [&str; 3] = ["AIServices", "OpenAI", "CognitiveServices"];

/// An AI account ("project") visible in the subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub name: String,
    pub resource_group: String,
    pub location: String,
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl ProjectSummary {
    /// True for account kinds that can host model deployments.
    pub fn is_ai_account(&self) -> bool {
        AI_ACCOUNT_KINDS.contains(&self.kind.as_str())
    }

    /// True for the kinds that host OpenAI-format deployments directly.
    pub fn is_primary_kind(&self) -> bool {
        matches!(self.kind.as_str(), "AIServices" | "OpenAI")
    }
}

/// The project chosen with `set-project`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

/// What to deploy: the body of a create or scale request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentSpec {
    pub model_name: String,
    pub model_version: String,
    pub model_format: String,
    pub topology: Topology,
    pub capacity: u32,
}

impl DeploymentSpec {
    pub fn sku_name(&self) -> &'static str {
        self.topology.sku_name()
    }
}

/// Deployment details as reported by the management API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentInfo {
    pub name: String,
    pub model_name: Option<String>,
    pub model_version: Option<String>,
    pub model_format: Option<String>,
    pub sku_name: Option<String>,
    pub capacity: u32,
    pub provisioning_state: Option<String>,
}

impl DeploymentInfo {
    /// Topology implied by the SKU, when it is a provisioned SKU.
    pub fn topology(&self) -> Option<Topology> {
        self.sku_name.as_deref().and_then(Topology::from_sku_name)
    }
}
