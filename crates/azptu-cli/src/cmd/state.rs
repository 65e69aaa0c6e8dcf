use std::io;

use anyhow::Result;
use serde::Serialize;
use termcolor::WriteColor;
use time::format_description::well_known::Rfc3339;

use azptu_core::CoreError;
use azptu_store::{Clock, FieldStatus, StateField, StateStore};

use crate::context::Context;
use crate::output::{self, Render};

#[derive(Debug, Serialize)]
pub struct SetOut {
    pub field: StateField,
    pub value: String,
    pub ttl_seconds: u64,
}

impl Render for SetOut {
    fn render(&self, w: &mut dyn WriteColor) -> io::Result<()> {
        output::success(
            w,
            &format!("{} set to {} (remembered for {}s)", self.field, self.value, self.ttl_seconds),
        )
    }
}

#[derive(Debug, Serialize)]
pub struct ConfigOut {
    pub state_file: String,
    pub ttl_seconds: u64,
    pub fields: Vec<FieldView>,
}

#[derive(Debug, Serialize)]
pub struct FieldView {
    pub field: StateField,
    pub status: FieldStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_seconds: Option<u64>,
}

impl Render for ConfigOut {
    fn render(&self, w: &mut dyn WriteColor) -> io::Result<()> {
        output::heading(w, "Current configuration")?;
        for f in &self.fields {
            let shown = match (f.status, &f.value, f.remaining_seconds) {
                (FieldStatus::Set, Some(v), Some(left)) => format!("{v} (expires in {left}s)"),
                (FieldStatus::Set, Some(v), None) => v.clone(),
                (status, _, _) => status.as_str().to_string(),
            };
            output::field(w, f.field.label(), &shown)?;
        }
        output::dim(w, &format!("state file {} (ttl {}s)", self.state_file, self.ttl_seconds))
    }
}

#[derive(Debug, Serialize)]
pub struct LogoffOut {
    pub cleared: bool,
    pub state_file: String,
}

impl Render for LogoffOut {
    fn render(&self, w: &mut dyn WriteColor) -> io::Result<()> {
        output::success(w, "Remembered settings cleared")
    }
}

fn required(value: &str, what: &str) -> Result<String> {
    let v = value.trim();
    if v.is_empty() {
        return Err(CoreError::invalid_argument(format!("{what} must not be empty")).into());
    }
    Ok(v.to_string())
}

pub fn set_resource_group(ctx: &Context, name: &str) -> Result<()> {
    let name = required(name, "resource group name")?;
    let mut store = ctx.open_store();
    store.set_resource_group(&name)?;
    ctx.output.emit(&SetOut { field: StateField::ResourceGroup, value: name, ttl_seconds: store.ttl_seconds() })
}

pub fn set_subscription(ctx: &Context, id: &str) -> Result<()> {
    let id = required(id, "subscription id")?;
    let mut store = ctx.open_store();
    store.set_subscription_id(&id)?;
    ctx.output.emit(&SetOut { field: StateField::SubscriptionId, value: id, ttl_seconds: store.ttl_seconds() })
}

/// Snapshot of every field as a read would see it now.
pub fn config_view<C: Clock>(store: &StateStore<C>) -> ConfigOut {
    let fields = StateField::ALL
        .iter()
        .map(|&field| {
            let status = store.status(field);
            let value = match (status, field) {
                (FieldStatus::Set, StateField::ResourceGroup) => store.resource_group().map(str::to_string),
                (FieldStatus::Set, StateField::SubscriptionId) => store.subscription_id().map(str::to_string),
                (FieldStatus::Set, StateField::CurrentProject) => store.current_project().map(|p| p.name.clone()),
                (FieldStatus::Set, StateField::ProjectCache) => {
                    store.project_cache().map(|c| format!("{} projects ({})", c.projects.len(), c.subscription_id))
                }
                _ => None,
            };
            FieldView {
                field,
                status,
                value,
                set_at: store.set_at(field).and_then(|t| t.format(&Rfc3339).ok()),
                remaining_seconds: store.remaining_seconds(field),
            }
        })
        .collect();
    ConfigOut {
        state_file: store.path().display().to_string(),
        ttl_seconds: store.ttl_seconds(),
        fields,
    }
}

pub fn show_config(ctx: &Context) -> Result<()> {
    let store = ctx.open_store();
    ctx.output.emit(&config_view(&store))
}

pub fn logoff(ctx: &Context) -> Result<()> {
    let mut store = ctx.open_store();
    store.clear()?;
    ctx.output.emit(&LogoffOut { cleared: true, state_file: store.path().display().to_string() })
}

#[cfg(test)]
mod tests {
    use azptu_core::model::ProjectRef;
    use azptu_store::{ManualClock, StoreConfig};

    use super::*;
    use crate::output::render_to_string;

    #[test]
    fn view_reports_set_expired_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::at_unix(1_700_000_000);
        let mut store = StateStore::open_with_clock(StoreConfig::new(dir.path().join("s.json")), clock.clone());

        store.set_resource_group("rg-old").unwrap();
        clock.advance_secs(200);
        store.set_current_project(ProjectRef { name: "proj-a".to_string(), endpoint: None }).unwrap();
        clock.advance_secs(150);

        let view = config_view(&store);
        let by = |f: StateField| view.fields.iter().find(|v| v.field == f).unwrap();

        assert_eq!(by(StateField::ResourceGroup).status, FieldStatus::Expired);
        assert_eq!(by(StateField::ResourceGroup).value, None);
        assert!(by(StateField::ResourceGroup).set_at.is_some());
        assert_eq!(by(StateField::SubscriptionId).status, FieldStatus::NotSet);
        assert_eq!(by(StateField::CurrentProject).value.as_deref(), Some("proj-a"));
        assert_eq!(by(StateField::CurrentProject).remaining_seconds, Some(150));

        let text = render_to_string(&view);
        assert!(text.contains("Resource Group: expired"));
        assert!(text.contains("Subscription: not set"));
        assert!(text.contains("Current Project: proj-a (expires in 150s)"));
    }

    #[test]
    fn blank_values_are_rejected_as_user_input() {
        let err = required("   ", "resource group name").unwrap_err();
        let core = err.downcast_ref::<CoreError>().unwrap();
        assert!(core.is_user_input());
    }
}
