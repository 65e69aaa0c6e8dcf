//! Per-invocation wiring: settings, output, and the collaborators built from
//! them. Also resolves subscription and resource group from flags or state.

use anyhow::{bail, Context as _, Result};

use azptu_core::ModelCatalog;
use azptu_store::{Clock, StateField, StateStore};

use crate::args::ScopeArgs;
use crate::config::Settings;
use crate::output::Output;
use crate::remote::{auth, AccountScope, ArmClient};

pub struct Context {
    pub settings: Settings,
    pub output: Output,
}

impl Context {
    pub fn new(settings: Settings) -> Self {
        let output = Output::new(settings.json);
        Self { settings, output }
    }

    pub fn catalog(&self) -> Result<ModelCatalog> {
        match &self.settings.catalog_path {
            Some(path) => ModelCatalog::from_path(path)
                .with_context(|| format!("loading model catalog from {}", path.display())),
            None => Ok(ModelCatalog::builtin()?),
        }
    }

    pub fn open_store(&self) -> StateStore {
        StateStore::open(self.settings.state.clone())
    }

    /// The client does not authenticate until its first call.
    pub fn remote(&self) -> Result<ArmClient> {
        Ok(ArmClient::new(self.settings.arm.clone(), auth::default_source())?)
    }
}

/// Subscription and resource group a command operates in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    pub subscription_id: String,
    pub resource_group: String,
}

impl Scope {
    pub fn account(&self, account_name: &str) -> AccountScope {
        AccountScope {
            subscription_id: self.subscription_id.clone(),
            resource_group: self.resource_group.clone(),
            account_name: account_name.to_string(),
        }
    }
}

/// Explicit flag first, then the remembered value.
pub fn resolve_subscription<C: Clock>(store: &StateStore<C>, explicit: Option<&str>) -> Result<String> {
    resolve(
        explicit,
        store.subscription_id(),
        store.is_expired(StateField::SubscriptionId),
        "subscription",
        "--subscription-id",
        "set-subscription <ID>",
    )
}

pub fn resolve_resource_group<C: Clock>(store: &StateStore<C>, explicit: Option<&str>) -> Result<String> {
    resolve(
        explicit,
        store.resource_group(),
        store.is_expired(StateField::ResourceGroup),
        "resource group",
        "--resource-group",
        "set-resource-group <NAME>",
    )
}

pub fn resolve_scope<C: Clock>(store: &StateStore<C>, args: &ScopeArgs) -> Result<Scope> {
    Ok(Scope {
        subscription_id: resolve_subscription(store, args.subscription_id.as_deref())?,
        resource_group: resolve_resource_group(store, args.resource_group.as_deref())?,
    })
}

fn resolve(
    explicit: Option<&str>,
    remembered: Option<&str>,
    expired: bool,
    what: &str,
    flag: &str,
    command: &str,
) -> Result<String> {
    if let Some(v) = explicit.map(str::trim).filter(|v| !v.is_empty()) {
        return Ok(v.to_string());
    }
    if let Some(v) = remembered {
        return Ok(v.to_string());
    }
    if expired {
        bail!("the remembered {what} has expired: pass {flag} or run `azptu {command}` again");
    }
    bail!("no {what} given: pass {flag} or run `azptu {command}`")
}
