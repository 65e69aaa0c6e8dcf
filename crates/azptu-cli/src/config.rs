//! Run settings, built once from the global flags.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use url::Url;

use azptu_store::StoreConfig;

use crate::args::Cli;
use crate::remote::ArmConfig;

const POLL_INTERVAL: Duration = Duration::from_secs(5);
const POLL_TIMEOUT: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone)]
pub struct Settings {
    pub json: bool,
    pub state: StoreConfig,
    pub catalog_path: Option<PathBuf>,
    pub arm: ArmConfig,
}

impl Settings {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        validate_settings(cli)?;
        let endpoint = Url::parse(cli.management_endpoint.trim())
            .map_err(|e| anyhow!("invalid --management-endpoint: {e}"))?;
        Ok(Self {
            json: cli.json,
            state: StoreConfig::new(&cli.state_file).with_ttl(cli.state_ttl),
            catalog_path: cli.catalog.clone(),
            arm: ArmConfig {
                endpoint,
                api_version: cli.api_version.trim().to_string(),
                poll_interval: POLL_INTERVAL,
                poll_timeout: POLL_TIMEOUT,
            },
        })
    }
}

/// Rejects flag values no command can work with.
pub fn validate_settings(cli: &Cli) -> Result<()> {
    if cli.state_ttl == 0 {
        bail!("--state-ttl must be greater than zero");
    }
    if cli.state_file.as_os_str().is_empty() {
        bail!("--state-file must not be empty");
    }
    if cli.api_version.trim().is_empty() {
        bail!("--api-version must not be empty");
    }
    let raw = cli.management_endpoint.trim();
    if raw.is_empty() {
        bail!("--management-endpoint must not be empty");
    }
    let url = Url::parse(raw).map_err(|e| anyhow!("invalid --management-endpoint {raw:?}: {e}"))?;
    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        bail!("--management-endpoint must be an absolute http(s) URL, got {raw:?}");
    }
    Ok(())
}
