//! Management-plane collaborator.
//!
//! Commands talk to Azure through [`DeploymentApi`] only; [`ArmClient`] is the
//! production implementation over the Resource Manager REST API. Nothing here
//! is called before local validation has accepted a mutating request.

use async_trait::async_trait;

use azptu_core::model::{DeploymentInfo, DeploymentSpec, ProjectSummary};

pub mod arm;
pub mod auth;
pub mod error;

pub use arm::{ArmClient, ArmConfig};
pub use error::{RemoteError, RemoteResult};

/// Addresses one AI account inside a subscription and resource group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountScope {
    pub subscription_id: String,
    pub resource_group: String,
    pub account_name: String,
}

#[async_trait]
pub trait DeploymentApi: Send + Sync {
    async fn list_projects(&self, subscription_id: &str) -> RemoteResult<Vec<ProjectSummary>>;

    async fn list_deployments(&self, scope: &AccountScope) -> RemoteResult<Vec<DeploymentInfo>>;

    async fn get_deployment(&self, scope: &AccountScope, name: &str) -> RemoteResult<DeploymentInfo>;

    /// Creates the deployment and waits until provisioning finishes.
    async fn create_deployment(
        &self,
        scope: &AccountScope,
        name: &str,
        spec: &DeploymentSpec,
    ) -> RemoteResult<DeploymentInfo>;

    /// Rewrites the deployment with a new capacity and waits for it.
    async fn update_capacity(
        &self,
        scope: &AccountScope,
        name: &str,
        spec: &DeploymentSpec,
    ) -> RemoteResult<DeploymentInfo>;

    async fn delete_deployment(&self, scope: &AccountScope, name: &str) -> RemoteResult<()>;
}
