//! Bearer tokens for the management API.

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::debug;

use super::error::{RemoteError, RemoteResult};

pub const TOKEN_ENV: &str = "AZURE_ACCESS_TOKEN";
pub const MANAGEMENT_RESOURCE: &str = "https://management.azure.com/";

#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn token(&self) -> RemoteResult<String>;
}

/// A token known up front (environment variable or tests).
#[derive(Debug, Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Reads [`TOKEN_ENV`]; blank values count as absent.
    pub fn from_env() -> Option<Self> {
        std::env::var(TOKEN_ENV)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(Self::new)
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn token(&self) -> RemoteResult<String> {
        Ok(self.0.clone())
    }
}

/// Asks the Azure CLI for a token once per process.
#[derive(Debug, Default)]
pub struct AzureCliToken {
    cached: OnceCell<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliTokenResponse {
    access_token: String,
}

impl AzureCliToken {
    pub fn new() -> Self {
        Self::default()
    }

    async fn fetch() -> RemoteResult<String> {
        debug!("requesting management token from az cli");
        let out = Command::new("az")
            .args(["account", "get-access-token", "--resource", MANAGEMENT_RESOURCE, "--output", "json"])
            .output()
            .await
            .map_err(|e| RemoteError::Auth(format!("cannot run `az` ({e}); run `az login` or set {TOKEN_ENV}")))?;

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            return Err(RemoteError::Auth(format!(
                "`az account get-access-token` failed: {}; run `az login`",
                stderr.trim()
            )));
        }

        let parsed: CliTokenResponse = serde_json::from_slice(&out.stdout)
            .map_err(|e| RemoteError::Auth(format!("unreadable az cli token output: {e}")))?;
        Ok(parsed.access_token)
    }
}

#[async_trait]
impl TokenSource for AzureCliToken {
    async fn token(&self) -> RemoteResult<String> {
        self.cached.get_or_try_init(Self::fetch).await.cloned()
    }
}

/// Environment token when present, the Azure CLI otherwise.
pub fn default_source() -> Box<dyn TokenSource> {
    match StaticToken::from_env() {
        Some(t) => Box::new(t),
        None => Box::new(AzureCliToken::new()),
    }
}
