//! create / update / delete / get-info for provisioned deployments.
//!
//! Mutating commands validate locally first; the remote API is not touched
//! (not even for a token) when validation rejects.

use std::io;

use anyhow::{anyhow, bail, Result};
use serde::Serialize;
use termcolor::WriteColor;
use tracing::{info, warn};

use azptu_core::model::{DeploymentInfo, DeploymentSpec};
use azptu_core::{
    require_positive, CoreError, ModelCatalog, Topology, ValidationEngine, ValidationRequest,
};

use crate::args::{CreateArgs, DeleteArgs, DeploymentArgs, UpdateArgs};
use crate::context::{self, Context};
use crate::output::{self, Output, Render};
use crate::remote::{AccountScope, DeploymentApi};

#[derive(Debug, Serialize)]
pub struct DeploymentOut {
    pub action: &'static str,
    pub account: String,
    pub deployment: DeploymentInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_capacity: Option<u32>,
}

impl Render for DeploymentOut {
    fn render(&self, w: &mut dyn WriteColor) -> io::Result<()> {
        let d = &self.deployment;
        match self.action {
            "created" => output::success(w, &format!("Deployment {} created", d.name))?,
            "updated" => output::success(w, &format!("Deployment {} updated", d.name))?,
            _ => output::heading(w, &format!("Deployment {}", d.name))?,
        }
        render_info(w, &self.account, d)?;
        if let Some(prev) = self.previous_capacity {
            output::field(w, "previous capacity", &prev.to_string())?;
        }
        Ok(())
    }
}

fn render_info(w: &mut dyn WriteColor, account: &str, d: &DeploymentInfo) -> io::Result<()> {
    let or_dash = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
    output::field(w, "account", account)?;
    output::field(w, "model", &or_dash(&d.model_name))?;
    output::field(w, "version", &or_dash(&d.model_version))?;
    output::field(w, "format", &or_dash(&d.model_format))?;
    let sku = match d.topology() {
        Some(t) => format!("{} ({})", or_dash(&d.sku_name), t.label()),
        None => or_dash(&d.sku_name),
    };
    output::field(w, "sku", &sku)?;
    output::field(w, "capacity", &d.capacity.to_string())?;
    output::field(w, "state", &or_dash(&d.provisioning_state))
}

#[derive(Debug, Serialize)]
pub struct DeleteOut {
    pub account: String,
    pub deployment: String,
    pub deleted: bool,
}

impl Render for DeleteOut {
    fn render(&self, w: &mut dyn WriteColor) -> io::Result<()> {
        if self.deleted {
            output::success(w, &format!("Deployment {} deleted", self.deployment))
        } else {
            output::dim(w, "Deletion cancelled")
        }
    }
}

/// Validates, then creates and waits for provisioning.
pub async fn create<A: DeploymentApi + ?Sized>(
    api: &A,
    catalog: &ModelCatalog,
    scope: &AccountScope,
    args: &CreateArgs,
    out: &Output,
) -> Result<DeploymentOut> {
    let topology = args.deployment_type.unwrap_or_default();
    let req = ValidationRequest::create(&args.model_name, topology, args.capacity)?;
    ValidationEngine::new(catalog).validate(&req).into_result()?;

    let entry = catalog
        .entry(&args.model_name)
        .ok_or_else(|| anyhow!("model {} vanished from the catalog", args.model_name))?;
    let spec = DeploymentSpec {
        model_name: entry.id.clone(),
        model_version: args.model_version.trim().to_string(),
        model_format: args.model_format.clone().unwrap_or_else(|| entry.format.clone()),
        topology,
        capacity: req.requested_capacity(),
    };
    if spec.model_version.is_empty() {
        return Err(CoreError::invalid_argument("model version must not be empty").into());
    }

    let name = &args.target.deployment_name;
    info!(deployment = %name, model = %spec.model_name, %topology, capacity = spec.capacity, "creating deployment");
    let pb = out.spinner(format!("creating {name} ({} x{})", spec.sku_name(), spec.capacity));
    let result = api.create_deployment(scope, name, &spec).await;
    pb.finish_and_clear();

    Ok(DeploymentOut {
        action: "created",
        account: scope.account_name.clone(),
        deployment: result?,
        previous_capacity: None,
    })
}

/// Reads the current deployment, validates the new capacity against it, then
/// rewrites the deployment keeping its model.
pub async fn update<A: DeploymentApi + ?Sized>(
    api: &A,
    catalog: &ModelCatalog,
    scope: &AccountScope,
    args: &UpdateArgs,
    out: &Output,
) -> Result<DeploymentOut> {
    require_positive(args.new_capacity, "new capacity")?;

    let name = &args.target.deployment_name;
    let current = api.get_deployment(scope, name).await?;

    let topology = args
        .deployment_type
        .or_else(|| current.topology())
        .unwrap_or(Topology::DEFAULT);
    let model = match (&current.model_name, &args.model_name) {
        (Some(reported), Some(given)) if !reported.eq_ignore_ascii_case(given) => {
            warn!(%reported, %given, "--model-name differs from the deployment; using the deployment's model");
            reported.clone()
        }
        (Some(reported), _) => reported.clone(),
        (None, Some(given)) => given.clone(),
        (None, None) => {
            return Err(CoreError::invalid_argument(format!(
                "deployment {name} does not report its model; pass --model-name"
            ))
            .into())
        }
    };

    let req = ValidationRequest::update(&model, topology, args.new_capacity, current.capacity)?;
    ValidationEngine::new(catalog).validate(&req).into_result()?;

    let version = current
        .model_version
        .clone()
        .ok_or_else(|| anyhow!("deployment {name} does not report its model version"))?;
    let format = current
        .model_format
        .clone()
        .or_else(|| catalog.entry(&model).map(|e| e.format.clone()))
        .ok_or_else(|| anyhow!("deployment {name} does not report its model format"))?;
    let spec = DeploymentSpec {
        model_name: model,
        model_version: version,
        model_format: format,
        topology,
        capacity: req.requested_capacity(),
    };

    info!(deployment = %name, from = current.capacity, to = spec.capacity, "updating capacity");
    let pb = out.spinner(format!("scaling {name} {} -> {}", current.capacity, spec.capacity));
    let result = api.update_capacity(scope, name, &spec).await;
    pb.finish_and_clear();

    Ok(DeploymentOut {
        action: "updated",
        account: scope.account_name.clone(),
        deployment: result?,
        previous_capacity: Some(current.capacity),
    })
}

/// Shows what is about to go, asks unless `force`, then deletes.
pub async fn delete<A, F>(
    api: &A,
    scope: &AccountScope,
    args: &DeleteArgs,
    out: &Output,
    confirm: F,
) -> Result<DeleteOut>
where
    A: DeploymentApi + ?Sized,
    F: FnOnce(&str) -> Result<bool>,
{
    let name = &args.target.deployment_name;
    match api.get_deployment(scope, name).await {
        Ok(d) => out.note(&format!(
            "{name}: {} {} x{}",
            d.model_name.as_deref().unwrap_or("?"),
            d.sku_name.as_deref().unwrap_or("?"),
            d.capacity
        )),
        Err(e) if e.is_not_found() => return Err(e.into()),
        Err(e) => warn!(error = %e, "could not read deployment before delete"),
    }

    let mut result = DeleteOut {
        account: scope.account_name.clone(),
        deployment: name.clone(),
        deleted: false,
    };
    if !args.force {
        if out.is_json() {
            bail!("refusing to prompt in --json mode; pass --force");
        }
        if !confirm(&format!("Delete deployment {name} from {}?", scope.account_name))? {
            return Ok(result);
        }
    }

    let pb = out.spinner(format!("deleting {name}"));
    let deleted = api.delete_deployment(scope, name).await;
    pb.finish_and_clear();
    deleted?;

    result.deleted = true;
    Ok(result)
}

fn account_scope(ctx: &Context, target: &DeploymentArgs) -> Result<AccountScope> {
    let store = ctx.open_store();
    Ok(context::resolve_scope(&store, &target.scope)?.account(&target.account_name))
}

pub async fn run_create(ctx: &Context, args: &CreateArgs) -> Result<()> {
    let catalog = ctx.catalog()?;
    let scope = account_scope(ctx, &args.target)?;
    let api = ctx.remote()?;
    let out = create(&api, &catalog, &scope, args, &ctx.output).await?;
    ctx.output.emit(&out)
}

pub async fn run_update(ctx: &Context, args: &UpdateArgs) -> Result<()> {
    let catalog = ctx.catalog()?;
    let scope = account_scope(ctx, &args.target)?;
    let api = ctx.remote()?;
    let out = update(&api, &catalog, &scope, args, &ctx.output).await?;
    ctx.output.emit(&out)
}

pub async fn run_delete(ctx: &Context, args: &DeleteArgs) -> Result<()> {
    let scope = account_scope(ctx, &args.target)?;
    let api = ctx.remote()?;
    let output = ctx.output;
    let out = delete(&api, &scope, args, &ctx.output, |prompt| output.confirm(prompt)).await?;
    ctx.output.emit(&out)
}

pub async fn run_get_info(ctx: &Context, args: &DeploymentArgs) -> Result<()> {
    let scope = account_scope(ctx, args)?;
    let api = ctx.remote()?;
    let deployment = api.get_deployment(&scope, &args.deployment_name).await?;
    ctx.output.emit(&DeploymentOut {
        action: "info",
        account: scope.account_name,
        deployment,
        previous_capacity: None,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use azptu_core::model::ProjectSummary;
    use azptu_core::{FailureKind, ValidationFailure};

    use super::*;
    use crate::args::ScopeArgs;
    use crate::remote::{RemoteError, RemoteResult};

    /// Records every call; answers from a single optional deployment.
    #[derive(Default)]
    struct FakeApi {
        current: Option<DeploymentInfo>,
        calls: Mutex<Vec<String>>,
        sent: Mutex<Option<DeploymentSpec>>,
    }

    impl FakeApi {
        fn with(current: DeploymentInfo) -> Self {
            Self { current: Some(current), ..Self::default() }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: &str) {
            self.calls.lock().unwrap().push(call.to_string());
        }
    }

    #[async_trait]
    impl DeploymentApi for FakeApi {
        async fn list_projects(&self, _: &str) -> RemoteResult<Vec<ProjectSummary>> {
            self.record("list_projects");
            Ok(Vec::new())
        }
        async fn list_deployments(&self, _: &AccountScope) -> RemoteResult<Vec<DeploymentInfo>> {
            self.record("list_deployments");
            Ok(self.current.clone().into_iter().collect())
        }
        async fn get_deployment(&self, _: &AccountScope, name: &str) -> RemoteResult<DeploymentInfo> {
            self.record("get");
            self.current.clone().ok_or_else(|| RemoteError::not_found(name))
        }
        async fn create_deployment(&self, _: &AccountScope, name: &str, spec: &DeploymentSpec) -> RemoteResult<DeploymentInfo> {
            self.record("create");
            *self.sent.lock().unwrap() = Some(spec.clone());
            Ok(info(name, spec))
        }
        async fn update_capacity(&self, _: &AccountScope, name: &str, spec: &DeploymentSpec) -> RemoteResult<DeploymentInfo> {
            self.record("update");
            *self.sent.lock().unwrap() = Some(spec.clone());
            Ok(info(name, spec))
        }
        async fn delete_deployment(&self, _: &AccountScope, _: &str) -> RemoteResult<()> {
            self.record("delete");
            Ok(())
        }
    }

    fn info(name: &str, spec: &DeploymentSpec) -> DeploymentInfo {
        DeploymentInfo {
            name: name.to_string(),
            model_name: Some(spec.model_name.clone()),
            model_version: Some(spec.model_version.clone()),
            model_format: Some(spec.model_format.clone()),
            sku_name: Some(spec.sku_name().to_string()),
            capacity: spec.capacity,
            provisioning_state: Some("Succeeded".to_string()),
        }
    }

    fn existing(sku: &str, capacity: u32) -> DeploymentInfo {
        DeploymentInfo {
            name: "dep".to_string(),
            model_name: Some("gpt-4o".to_string()),
            model_version: Some("2024-08-06".to_string()),
            model_format: Some("OpenAI".to_string()),
            sku_name: Some(sku.to_string()),
            capacity,
            provisioning_state: Some("Succeeded".to_string()),
        }
    }

    fn scope() -> AccountScope {
        AccountScope {
            subscription_id: "sub".to_string(),
            resource_group: "rg".to_string(),
            account_name: "acct".to_string(),
        }
    }

    fn target() -> DeploymentArgs {
        DeploymentArgs {
            scope: ScopeArgs::default(),
            account_name: "acct".to_string(),
            deployment_name: "dep".to_string(),
        }
    }

    fn create_args(model: &str, topology: Option<Topology>, capacity: i64) -> CreateArgs {
        CreateArgs {
            target: target(),
            model_name: model.to_string(),
            model_version: "2024-08-06".to_string(),
            capacity,
            deployment_type: topology,
            model_format: None,
        }
    }

    fn update_args(capacity: i64, topology: Option<Topology>) -> UpdateArgs {
        UpdateArgs { target: target(), new_capacity: capacity, deployment_type: topology, model_name: None }
    }

    fn failure_kind(err: &anyhow::Error) -> Option<FailureKind> {
        err.downcast_ref::<ValidationFailure>().map(ValidationFailure::kind)
    }

    fn quiet() -> Output {
        Output::new(true)
    }

    #[tokio::test]
    async fn rejected_create_never_calls_remote() {
        let cat = ModelCatalog::builtin().unwrap();
        let api = FakeApi::default();

        for (model, topo, cap, kind) in [
            ("gpt-4o", Some(Topology::Regional), 25, FailureKind::BelowMinimum),
            ("gpt-4o", Some(Topology::Regional), 75, FailureKind::InvalidIncrement),
            ("gpt-4", None, 300, FailureKind::UnsupportedTopology),
            ("gpt-5-ultra", Some(Topology::Global), 100, FailureKind::UnknownModel),
        ] {
            let err = create(&api, &cat, &scope(), &create_args(model, topo, cap), &quiet()).await.unwrap_err();
            assert_eq!(failure_kind(&err), Some(kind), "{model} {cap}");
        }

        let err = create(&api, &cat, &scope(), &create_args("gpt-4o", None, 0), &quiet()).await.unwrap_err();
        assert!(err.downcast_ref::<CoreError>().is_some_and(CoreError::is_user_input));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn accepted_create_sends_canonical_model_and_sku() {
        let cat = ModelCatalog::builtin().unwrap();
        let api = FakeApi::default();
        let out = create(&api, &cat, &scope(), &create_args("GPT-4O", Some(Topology::DataZone), 20), &quiet())
            .await
            .unwrap();

        assert_eq!(api.calls(), ["create"]);
        let sent = api.sent.lock().unwrap().clone().unwrap();
        assert_eq!(sent.model_name, "gpt-4o");
        assert_eq!(sent.model_format, "OpenAI");
        assert_eq!(sent.sku_name(), "DataZoneProvisionedManaged");
        assert_eq!(out.deployment.capacity, 20);
    }

    #[tokio::test]
    async fn deepseek_uses_catalog_format() {
        let cat = ModelCatalog::builtin().unwrap();
        let api = FakeApi::default();
        create(&api, &cat, &scope(), &create_args("deepseek-r1", Some(Topology::Global), 200), &quiet())
            .await
            .unwrap();
        assert_eq!(api.sent.lock().unwrap().as_ref().unwrap().model_format, "DeepSeek");
    }

    #[tokio::test]
    async fn update_infers_topology_from_sku() {
        let cat = ModelCatalog::builtin().unwrap();
        let api = FakeApi::with(existing("GlobalProvisionedManaged", 15));

        let out = update(&api, &cat, &scope(), &update_args(20, None), &quiet()).await.unwrap();
        assert_eq!(api.calls(), ["get", "update"]);
        assert_eq!(out.previous_capacity, Some(15));
        let sent = api.sent.lock().unwrap().clone().unwrap();
        assert_eq!(sent.topology, Topology::Global);
        assert_eq!(sent.model_version, "2024-08-06");
        assert_eq!(sent.capacity, 20);
    }

    #[tokio::test]
    async fn update_to_same_capacity_is_no_change() {
        let cat = ModelCatalog::builtin().unwrap();
        let api = FakeApi::with(existing("GlobalProvisionedManaged", 15));

        let err = update(&api, &cat, &scope(), &update_args(15, None), &quiet()).await.unwrap_err();
        assert_eq!(failure_kind(&err), Some(FailureKind::NoChange));
        assert_eq!(api.calls(), ["get"]);
    }

    #[tokio::test]
    async fn update_with_bad_capacity_skips_remote_entirely() {
        let cat = ModelCatalog::builtin().unwrap();
        let api = FakeApi::with(existing("GlobalProvisionedManaged", 15));

        let err = update(&api, &cat, &scope(), &update_args(-10, None), &quiet()).await.unwrap_err();
        assert_matches!(err.downcast_ref::<CoreError>(), Some(CoreError::InvalidArgument(_)));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn update_with_explicit_topology_overrides_sku() {
        let cat = ModelCatalog::builtin().unwrap();
        let api = FakeApi::with(existing("GlobalProvisionedManaged", 15));

        let err = update(&api, &cat, &scope(), &update_args(20, Some(Topology::Regional)), &quiet())
            .await
            .unwrap_err();
        assert_eq!(failure_kind(&err), Some(FailureKind::BelowMinimum));
        assert_eq!(api.calls(), ["get"]);
    }

    #[tokio::test]
    async fn delete_respects_confirmation() {
        let api = FakeApi::with(existing("ProvisionedManaged", 50));
        let args = DeleteArgs { target: target(), force: false };

        let out = delete(&api, &scope(), &args, &Output::new(false), |_| Ok(false)).await.unwrap();
        assert!(!out.deleted);
        assert_eq!(api.calls(), ["get"]);

        let out = delete(&api, &scope(), &args, &Output::new(false), |_| Ok(true)).await.unwrap();
        assert!(out.deleted);
        assert_eq!(api.calls(), ["get", "get", "delete"]);
    }

    #[tokio::test]
    async fn forced_delete_does_not_prompt() {
        let api = FakeApi::with(existing("ProvisionedManaged", 50));
        let args = DeleteArgs { target: target(), force: true };
        let out = delete(&api, &scope(), &args, &quiet(), |_| panic!("prompted")).await.unwrap();
        assert!(out.deleted);
    }

    #[tokio::test]
    async fn delete_of_missing_deployment_fails() {
        let api = FakeApi::default();
        let args = DeleteArgs { target: target(), force: true };
        let err = delete(&api, &scope(), &args, &quiet(), |_| Ok(true)).await.unwrap_err();
        assert!(err.downcast_ref::<RemoteError>().is_some_and(RemoteError::is_not_found));
        assert_eq!(api.calls(), ["get"]);
    }
}
