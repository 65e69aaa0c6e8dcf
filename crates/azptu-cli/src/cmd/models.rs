use std::io::{self, Write};

use anyhow::Result;
use serde::Serialize;
use termcolor::WriteColor;

use azptu_core::{ModelCatalog, Topology};

use crate::context::Context;
use crate::output::{self, Render};

#[derive(Debug, Serialize)]
pub struct ModelsOut {
    pub catalog_version: String,
    pub models: Vec<ModelView>,
}

#[derive(Debug, Serialize)]
pub struct ModelView {
    pub id: String,
    pub format: String,
    pub description: String,
    pub versions: Vec<String>,
    pub rules: Vec<RuleView>,
}

#[derive(Debug, Serialize)]
pub struct RuleView {
    pub topology: Topology,
    pub sku: &'static str,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub increment: Option<u32>,
}

/// One row per model and per topology, including the unavailable ones.
pub fn describe(catalog: &ModelCatalog) -> ModelsOut {
    let models = catalog
        .models()
        .map(|m| ModelView {
            id: m.id.clone(),
            format: m.format.clone(),
            description: m.description.clone(),
            versions: m.versions.clone(),
            rules: Topology::ALL
                .iter()
                .map(|t| {
                    let rule = m.rule(*t);
                    RuleView {
                        topology: *t,
                        sku: t.sku_name(),
                        available: rule.is_some(),
                        minimum: rule.map(|r| r.minimum),
                        increment: rule.map(|r| r.increment),
                    }
                })
                .collect(),
        })
        .collect();
    ModelsOut { catalog_version: catalog.version().to_string(), models }
}

impl Render for ModelsOut {
    fn render(&self, w: &mut dyn WriteColor) -> io::Result<()> {
        output::heading(w, &format!("Models with provisioned capacity (catalog v{})", self.catalog_version))?;
        for m in &self.models {
            writeln!(w)?;
            output::heading(w, &m.id)?;
            if !m.description.is_empty() {
                output::dim(w, &format!("  {}", m.description))?;
            }
            output::field(w, "format", &m.format)?;
            output::field(w, "versions", &m.versions.join(", "))?;
            for r in rule_lines(m) {
                writeln!(w, "    {r}")?;
            }
        }
        Ok(())
    }
}

fn rule_lines(m: &ModelView) -> impl Iterator<Item = String> + '_ {
    m.rules.iter().map(|r| match (r.minimum, r.increment) {
        (Some(min), Some(inc)) => format!("{:<10} minimum {min}, increments of {inc}", r.topology.label()),
        _ => format!("{:<10} not available", r.topology.label()),
    })
}

pub fn run(ctx: &Context) -> Result<()> {
    let catalog = ctx.catalog()?;
    ctx.output.emit(&describe(&catalog))
}
