use std::io::{self, Write};

use anyhow::{anyhow, Result};
use serde::Serialize;
use termcolor::WriteColor;
use tracing::{info, warn};

use azptu_core::model::{DeploymentInfo, ProjectRef, ProjectSummary};
use azptu_core::CoreError;
use azptu_store::{Clock, StateStore};

use crate::args::ScopeArgs;
use crate::context::{self, Context};
use crate::output::{self, Render};
use crate::remote::DeploymentApi;

#[derive(Debug, Serialize)]
pub struct ProjectsOut {
    pub from_cache: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_project: Option<ProjectRef>,
    pub projects: Vec<ProjectSummary>,
}

impl Render for ProjectsOut {
    fn render(&self, w: &mut dyn WriteColor) -> io::Result<()> {
        let src = if self.from_cache { "cached" } else { "fresh" };
        output::heading(w, &format!("AI projects ({}, {src})", self.projects.len()))?;
        let current = self.current_project.as_ref().map(|p| p.name.as_str());
        for p in &self.projects {
            let mark = if Some(p.name.as_str()) == current { "*" } else { " " };
            // ? marks kinds that may not take OpenAI-format deployments
            let fit = if p.is_primary_kind() { "✓" } else { "?" };
            writeln!(w, "{mark} {fit} {:<28} {:<18} {:<14} {}", p.name, p.kind, p.location, p.resource_group)?;
        }
        if self.projects.is_empty() {
            output::dim(w, "  no AI accounts found")?;
        }
        match current {
            Some(name) => output::dim(w, &format!("current project: {name}")),
            None => output::dim(w, "no current project; use `azptu set-project <NAME>`"),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SetProjectOut {
    pub project: ProjectRef,
    pub known: bool,
}

impl Render for SetProjectOut {
    fn render(&self, w: &mut dyn WriteColor) -> io::Result<()> {
        output::success(w, &format!("Current project set to {}", self.project.name))?;
        if let Some(ep) = &self.project.endpoint {
            output::field(w, "endpoint", ep)?;
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct DeploymentsOut {
    pub project: String,
    pub resource_group: String,
    pub deployments: Vec<DeploymentInfo>,
}

impl Render for DeploymentsOut {
    fn render(&self, w: &mut dyn WriteColor) -> io::Result<()> {
        output::heading(w, &format!("Deployments in {} ({})", self.project, self.resource_group))?;
        if self.deployments.is_empty() {
            return output::dim(w, "  none");
        }
        for d in &self.deployments {
            writeln!(
                w,
                "  {:<28} {:<22} {:<28} {:>6}  {}",
                d.name,
                d.model_name.as_deref().unwrap_or("-"),
                d.sku_name.as_deref().unwrap_or("-"),
                d.capacity,
                d.provisioning_state.as_deref().unwrap_or("-"),
            )?;
        }
        Ok(())
    }
}

/// Cached list when it is live and was listed for the resolved subscription,
/// the remote list otherwise. Only AI account kinds are kept and written back
/// to the cache together with their subscription.
pub async fn fetch_projects<A, C>(
    api: &A,
    store: &mut StateStore<C>,
    explicit_subscription: Option<&str>,
    refresh: bool,
) -> Result<(Vec<ProjectSummary>, bool)>
where
    A: DeploymentApi + ?Sized,
    C: Clock,
{
    let subscription = context::resolve_subscription(store, explicit_subscription)?;
    if !refresh {
        if let Some(cached) = store.project_cache_for(&subscription) {
            return Ok((cached.to_vec(), true));
        }
    }

    let projects: Vec<ProjectSummary> = api
        .list_projects(&subscription)
        .await?
        .into_iter()
        .filter(ProjectSummary::is_ai_account)
        .collect();
    info!(count = projects.len(), "projects listed");

    if let Err(e) = store.set_project_cache(subscription.as_str(), projects.clone()) {
        warn!(error = %e, "could not cache project list");
    }
    Ok((projects, false))
}

pub async fn list_projects(ctx: &Context, refresh: bool, subscription: Option<&str>) -> Result<()> {
    let mut store = ctx.open_store();
    let api = ctx.remote()?;
    let (projects, from_cache) = fetch_projects(&api, &mut store, subscription, refresh).await?;
    ctx.output.emit(&ProjectsOut {
        from_cache,
        current_project: store.current_project().cloned(),
        projects,
    })
}

/// Endpoint comes from the flag, then from the cached project list. The cache
/// only counts when it belongs to the remembered subscription, or when no
/// subscription is remembered at all.
pub fn choose_project<C: Clock>(
    store: &StateStore<C>,
    name: &str,
    endpoint: Option<String>,
) -> Result<SetProjectOut> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CoreError::invalid_argument("project name must not be empty").into());
    }
    let listed = match store.subscription_id() {
        Some(sub) => store.project_cache_for(sub),
        None => store.project_cache().map(|c| c.projects.as_slice()),
    };
    let cached = listed.and_then(|ps| ps.iter().find(|p| p.name == name));
    let endpoint = endpoint.or_else(|| cached.and_then(|p| p.endpoint.clone()));
    Ok(SetProjectOut {
        project: ProjectRef { name: name.to_string(), endpoint },
        known: cached.is_some(),
    })
}

pub fn set_project(ctx: &Context, name: &str, endpoint: Option<String>) -> Result<()> {
    let mut store = ctx.open_store();
    let out = choose_project(&store, name, endpoint)?;
    if !out.known {
        warn!(project = %out.project.name, "project not in cached list");
        ctx.output.note(&format!(
            "warning: {} is not in the cached project list; run `azptu list-projects` to check the name",
            out.project.name
        ));
    }
    store.set_current_project(out.project.clone())?;
    ctx.output.emit(&out)
}

pub async fn list_deployments(ctx: &Context, project: Option<&str>, scope: &ScopeArgs) -> Result<()> {
    let store = ctx.open_store();
    let project = match project.map(str::trim).filter(|p| !p.is_empty()) {
        Some(p) => p.to_string(),
        None => store
            .current_project()
            .map(|p| p.name.clone())
            .ok_or_else(|| anyhow!("no project given: pass --project or run `azptu set-project <NAME>`"))?,
    };
    let scope = context::resolve_scope(&store, scope)?;
    let api = ctx.remote()?;
    let deployments = api.list_deployments(&scope.account(&project)).await?;
    ctx.output.emit(&DeploymentsOut {
        project,
        resource_group: scope.resource_group,
        deployments,
    })
}
