//! On-disk shape of the state record.
//!
//! ```json
//! { "version": 1,
//!   "resource_group": { "value": "rg-ai", "set_at": 1731000000 },
//!   "subscription_id": { "value": "0000-...", "set_at": 1731000000 } }
//! ```
//!
//! Timestamps are unix seconds.

use std::fmt;

use serde::{Deserialize, Serialize};

use azptu_core::model::{ProjectRef, ProjectSummary};

pub const STATE_VERSION: u32 = 1;

/// A value plus the unix second it was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stamped<T> {
    pub value: T,
    pub set_at: i64,
}

impl<T> Stamped<T> {
    pub fn new(value: T, set_at: i64) -> Self {
        Self { value, set_at }
    }

    /// Live while `0 <= now - set_at < ttl`. A timestamp from the future is
    /// treated as stale.
    pub fn is_live(&self, now: i64, ttl_seconds: u64) -> bool {
        let elapsed = now.saturating_sub(self.set_at);
        elapsed >= 0 && (elapsed as u64) < ttl_seconds
    }
}

/// Projects listed for one subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedProjects {
    pub subscription_id: String,
    pub projects: Vec<ProjectSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_group: Option<Stamped<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<Stamped<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_project: Option<Stamped<ProjectRef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_cache: Option<Stamped<CachedProjects>>,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            resource_group: None,
            subscription_id: None,
            current_project: None,
            project_cache: None,
        }
    }
}

impl PersistedState {
    pub fn set_at(&self, field: StateField) -> Option<i64> {
        match field {
            StateField::ResourceGroup => self.resource_group.as_ref().map(|s| s.set_at),
            StateField::SubscriptionId => self.subscription_id.as_ref().map(|s| s.set_at),
            StateField::CurrentProject => self.current_project.as_ref().map(|s| s.set_at),
            StateField::ProjectCache => self.project_cache.as_ref().map(|s| s.set_at),
        }
    }

    pub fn is_empty(&self) -> bool {
        StateField::ALL.iter().all(|f| self.set_at(*f).is_none())
    }
}

/// Independently expiring fields of the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StateField {
    ResourceGroup,
    SubscriptionId,
    CurrentProject,
    ProjectCache,
}

impl StateField {
    pub const ALL: [StateField; 4] = [
        StateField::ResourceGroup,
        StateField::SubscriptionId,
        StateField::CurrentProject,
        StateField::ProjectCache,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::ResourceGroup => "Resource Group",
            Self::SubscriptionId => "Subscription",
            Self::CurrentProject => "Current Project",
            Self::ProjectCache => "Project Cache",
        }
    }
}

impl fmt::Display for StateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What a read of one field would see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldStatus {
    NotSet,
    Expired,
    Set,
}

impl FieldStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotSet => "not set",
            Self::Expired => "expired",
            Self::Set => "set",
        }
    }
}
