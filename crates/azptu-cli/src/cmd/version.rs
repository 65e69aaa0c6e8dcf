use std::io;

use anyhow::Result;
use serde::Serialize;
use termcolor::WriteColor;

use crate::context::Context;
use crate::output::{self, Render};

#[derive(Debug, Serialize)]
pub struct VersionOut {
    pub version: &'static str,
    pub catalog_version: String,
    pub catalog_models: usize,
}

impl Render for VersionOut {
    fn render(&self, w: &mut dyn WriteColor) -> io::Result<()> {
        output::heading(w, &format!("azptu {}", self.version))?;
        output::field(w, "catalog", &format!("v{} ({} models)", self.catalog_version, self.catalog_models))
    }
}

pub fn run(ctx: &Context) -> Result<()> {
    let catalog = ctx.catalog()?;
    ctx.output.emit(&VersionOut {
        version: env!("CARGO_PKG_VERSION"),
        catalog_version: catalog.version().to_string(),
        catalog_models: catalog.len(),
    })
}
