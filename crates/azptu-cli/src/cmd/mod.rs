use anyhow::Result;
use tracing::debug;

use crate::args::{Cli, Command};
use crate::config::Settings;
use crate::context::Context;

mod deploy;
mod models;
mod projects;
mod state;
mod version;

pub async fn dispatch(cli: Cli) -> Result<()> {
    let settings = Settings::from_cli(&cli)?;
    let ctx = Context::new(settings);
    debug!(command = ?cli.command, "dispatch");

    match cli.command {
        Command::ListProjects { refresh, subscription_id } => {
            projects::list_projects(&ctx, refresh, subscription_id.as_deref()).await
        }
        Command::SetProject { name, endpoint } => projects::set_project(&ctx, &name, endpoint),
        Command::ListDeployments { project, scope } => {
            projects::list_deployments(&ctx, project.as_deref(), &scope).await
        }
        Command::ListPtuModels => models::run(&ctx),
        Command::SetResourceGroup { name } => state::set_resource_group(&ctx, &name),
        Command::SetSubscription { id } => state::set_subscription(&ctx, &id),
        Command::ShowConfig => state::show_config(&ctx),
        Command::Logoff => state::logoff(&ctx),
        Command::CreatePtuDeployment(args) => deploy::run_create(&ctx, &args).await,
        Command::UpdatePtuCapacity(args) => deploy::run_update(&ctx, &args).await,
        Command::DeletePtuDeployment(args) => deploy::run_delete(&ctx, &args).await,
        Command::GetPtuInfo(args) => deploy::run_get_info(&ctx, &args).await,
        Command::Version => version::run(&ctx),
    }
}
