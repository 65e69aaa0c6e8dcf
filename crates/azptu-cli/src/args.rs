use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

use azptu_core::Topology;

#[derive(Parser, Debug, Clone)]
#[command(name = "azptu", version, about = "Manage provisioned-capacity (PTU) model deployments on Azure")]
pub struct Cli {
    /// Emit JSON output on stdout.
    #[arg(long, global = true)]
    pub json: bool,

    /// More logging on stderr (-v info, -vv debug). RUST_LOG wins when set.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Where remembered settings are kept.
    #[arg(long, global = true, env = "AZPTU_STATE_FILE", default_value = ".azptu/state.json")]
    pub state_file: PathBuf,

    /// Seconds a remembered setting stays valid.
    #[arg(long, global = true, env = "AZPTU_STATE_TTL", default_value_t = azptu_store::DEFAULT_TTL_SECONDS)]
    pub state_ttl: u64,

    /// Model catalog JSON to use instead of the built-in one.
    #[arg(long, global = true, env = "AZPTU_CATALOG")]
    pub catalog: Option<PathBuf>,

    #[arg(long, global = true, env = "AZPTU_MANAGEMENT_ENDPOINT", default_value = "https://management.azure.com")]
    pub management_endpoint: String,

    #[arg(long, global = true, env = "AZPTU_API_VERSION", default_value = "2024-10-01")]
    pub api_version: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List AI accounts (projects) in the subscription.
    ListProjects {
        /// Ignore the cached list.
        #[arg(long)]
        refresh: bool,
        #[arg(long)]
        subscription_id: Option<String>,
    },

    /// Remember the project used by list-deployments.
    SetProject {
        name: String,
        #[arg(long)]
        endpoint: Option<String>,
    },

    /// List deployments of a project.
    ListDeployments {
        /// Account name (defaults to the current project).
        #[arg(long)]
        project: Option<String>,
        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Show models that support provisioned capacity and their rules.
    ListPtuModels,

    /// Remember the resource group.
    SetResourceGroup { name: String },

    /// Remember the subscription id.
    SetSubscription { id: String },

    /// Show remembered settings and their freshness.
    ShowConfig,

    /// Forget all remembered settings.
    Logoff,

    /// Create a provisioned-capacity deployment.
    CreatePtuDeployment(CreateArgs),

    /// Change the capacity of an existing deployment.
    UpdatePtuCapacity(UpdateArgs),

    /// Delete a deployment.
    DeletePtuDeployment(DeleteArgs),

    /// Show one deployment.
    GetPtuInfo(DeploymentArgs),

    /// Print tool and catalog versions.
    Version,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ScopeArgs {
    #[arg(long)]
    pub subscription_id: Option<String>,
    #[arg(long)]
    pub resource_group: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct DeploymentArgs {
    #[command(flatten)]
    pub scope: ScopeArgs,
    #[arg(long)]
    pub account_name: String,
    #[arg(long)]
    pub deployment_name: String,
}

#[derive(Args, Debug, Clone)]
pub struct CreateArgs {
    #[command(flatten)]
    pub target: DeploymentArgs,
    #[arg(long)]
    pub model_name: String,
    #[arg(long)]
    pub model_version: String,
    /// Provisioned units.
    #[arg(long, allow_negative_numbers = true)]
    pub capacity: i64,
    /// regional | global | data-zone (default: regional).
    #[arg(long, value_parser = Topology::parse)]
    pub deployment_type: Option<Topology>,
    /// Defaults to the catalog's format for the model.
    #[arg(long)]
    pub model_format: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct UpdateArgs {
    #[command(flatten)]
    pub target: DeploymentArgs,
    #[arg(long, allow_negative_numbers = true)]
    pub new_capacity: i64,
    /// Overrides the topology implied by the deployment's SKU.
    #[arg(long, value_parser = Topology::parse)]
    pub deployment_type: Option<Topology>,
    /// Used when the deployment does not report its model.
    #[arg(long)]
    pub model_name: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct DeleteArgs {
    #[command(flatten)]
    pub target: DeploymentArgs,
    /// Skip the confirmation prompt.
    #[arg(long)]
    pub force: bool,
}
