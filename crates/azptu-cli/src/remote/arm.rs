//! Azure Resource Manager client for Cognitive Services accounts and their
//! model deployments.
//!
//! Create and scale are the same `PUT`; the service answers before the
//! deployment is provisioned, so both poll `GET` until `provisioningState`
//! settles. Delete polls until the deployment is gone.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info};
use url::Url;

use azptu_core::model::{DeploymentInfo, DeploymentSpec, ProjectSummary};

use super::auth::TokenSource;
use super::error::{RemoteError, RemoteResult};
use super::{AccountScope, DeploymentApi};

const PROVIDER: &str = "Microsoft.CognitiveServices";

#[derive(Debug, Clone)]
pub struct ArmConfig {
    pub endpoint: Url,
    pub api_version: String,
    pub poll_interval: Duration,
    pub poll_timeout: Duration,
}

pub struct ArmClient {
    http: Client,
    cfg: ArmConfig,
    tokens: Box<dyn TokenSource>,
}

impl ArmClient {
    pub fn new(cfg: ArmConfig, tokens: Box<dyn TokenSource>) -> RemoteResult<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .user_agent(concat!("azptu/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, cfg, tokens })
    }

    fn url(&self, segments: &[&str]) -> RemoteResult<Url> {
        let mut url = self.cfg.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| RemoteError::InvalidEndpoint(self.cfg.endpoint.to_string()))?
            .pop_if_empty()
            .extend(segments);
        url.query_pairs_mut().append_pair("api-version", &self.cfg.api_version);
        Ok(url)
    }

    fn deployments_url(&self, scope: &AccountScope) -> RemoteResult<Url> {
        self.url(&[
            "subscriptions",
            &scope.subscription_id,
            "resourceGroups",
            &scope.resource_group,
            "providers",
            PROVIDER,
            "accounts",
            &scope.account_name,
            "deployments",
        ])
    }

    fn deployment_url(&self, scope: &AccountScope, name: &str) -> RemoteResult<Url> {
        let mut url = self.deployments_url(scope)?;
        url.path_segments_mut()
            .map_err(|_| RemoteError::InvalidEndpoint(self.cfg.endpoint.to_string()))?
            .push(name);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, what: &str) -> RemoteResult<T> {
        debug!(%url, "GET");
        let token = self.tokens.token().await?;
        let resp = self.http.get(url).bearer_auth(token).send().await?;
        decode(check(resp, what).await?).await
    }

    /// Follows `nextLink` until the listing is exhausted.
    async fn get_all<T: DeserializeOwned>(&self, first: Url, what: &str) -> RemoteResult<Vec<T>> {
        let mut out = Vec::new();
        let mut next = Some(first);
        while let Some(url) = next.take() {
            let page: Page<T> = self.get_json(url, what).await?;
            out.extend(page.value);
            next = match page.next_link {
                Some(link) => Some(
                    Url::parse(&link).map_err(|e| RemoteError::Decode(format!("bad nextLink {link}: {e}")))?,
                ),
                None => None,
            };
        }
        Ok(out)
    }

    async fn put_and_wait(
        &self,
        scope: &AccountScope,
        name: &str,
        spec: &DeploymentSpec,
    ) -> RemoteResult<DeploymentInfo> {
        let url = self.deployment_url(scope, name)?;
        let body = DeploymentBody::from(spec);
        info!(deployment = name, sku = spec.sku_name(), capacity = spec.capacity, "PUT deployment");

        let token = self.tokens.token().await?;
        let resp = self.http.put(url).bearer_auth(token).json(&body).send().await?;
        let first: DeploymentWire = decode(check(resp, &deployment_label(scope, name)).await?).await?;
        self.wait_for_terminal(scope, name, first.into()).await
    }

    async fn wait_for_terminal(
        &self,
        scope: &AccountScope,
        name: &str,
        mut current: DeploymentInfo,
    ) -> RemoteResult<DeploymentInfo> {
        let deadline = Instant::now() + self.cfg.poll_timeout;
        loop {
            let state = current.provisioning_state.clone();
            match state.as_deref() {
                None => return Ok(current),
                Some(s) if s.eq_ignore_ascii_case("Succeeded") => return Ok(current),
                Some(s) if s.eq_ignore_ascii_case("Failed") || s.eq_ignore_ascii_case("Canceled") => {
                    return Err(RemoteError::OperationFailed { state: s.to_string() });
                }
                Some(s) => debug!(deployment = name, state = s, "still provisioning"),
            }
            if Instant::now() >= deadline {
                return Err(RemoteError::Timeout(self.cfg.poll_timeout));
            }
            tokio::time::sleep(self.cfg.poll_interval).await;
            current = self.get_deployment(scope, name).await?;
        }
    }
}

#[async_trait]
impl DeploymentApi for ArmClient {
    async fn list_projects(&self, subscription_id: &str) -> RemoteResult<Vec<ProjectSummary>> {
        let url = self.url(&["subscriptions", subscription_id, "providers", PROVIDER, "accounts"])?;
        let accounts: Vec<AccountWire> = self.get_all(url, &format!("subscription {subscription_id}")).await?;
        Ok(accounts.into_iter().map(ProjectSummary::from).collect())
    }

    async fn list_deployments(&self, scope: &AccountScope) -> RemoteResult<Vec<DeploymentInfo>> {
        let url = self.deployments_url(scope)?;
        let wires: Vec<DeploymentWire> = self.get_all(url, &format!("account {}", scope.account_name)).await?;
        Ok(wires.into_iter().map(DeploymentInfo::from).collect())
    }

    async fn get_deployment(&self, scope: &AccountScope, name: &str) -> RemoteResult<DeploymentInfo> {
        let url = self.deployment_url(scope, name)?;
        let wire: DeploymentWire = self.get_json(url, &deployment_label(scope, name)).await?;
        Ok(wire.into())
    }

    async fn create_deployment(
        &self,
        scope: &AccountScope,
        name: &str,
        spec: &DeploymentSpec,
    ) -> RemoteResult<DeploymentInfo> {
        self.put_and_wait(scope, name, spec).await
    }

    async fn update_capacity(
        &self,
        scope: &AccountScope,
        name: &str,
        spec: &DeploymentSpec,
    ) -> RemoteResult<DeploymentInfo> {
        self.put_and_wait(scope, name, spec).await
    }

    async fn delete_deployment(&self, scope: &AccountScope, name: &str) -> RemoteResult<()> {
        let url = self.deployment_url(scope, name)?;
        info!(deployment = name, "DELETE deployment");
        let token = self.tokens.token().await?;
        let resp = self.http.delete(url).bearer_auth(token).send().await?;
        check(resp, &deployment_label(scope, name)).await?;

        let deadline = Instant::now() + self.cfg.poll_timeout;
        loop {
            match self.get_deployment(scope, name).await {
                Err(e) if e.is_not_found() => return Ok(()),
                Err(e) => return Err(e),
                Ok(d) => debug!(deployment = name, state = ?d.provisioning_state, "still deleting"),
            }
            if Instant::now() >= deadline {
                return Err(RemoteError::Timeout(self.cfg.poll_timeout));
            }
            tokio::time::sleep(self.cfg.poll_interval).await;
        }
    }
}

fn deployment_label(scope: &AccountScope, name: &str) -> String {
    format!("deployment {name} in account {}", scope.account_name)
}

async fn check(resp: Response, what: &str) -> RemoteResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let message = arm_message(&body)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("no message").to_string());
    debug!(status = status.as_u16(), %message, "management API error");

    Err(match status {
        StatusCode::UNAUTHORIZED => RemoteError::Auth(message),
        StatusCode::FORBIDDEN => RemoteError::QuotaExceeded(message),
        StatusCode::NOT_FOUND => RemoteError::not_found(what),
        StatusCode::TOO_MANY_REQUESTS => RemoteError::CapacityUnavailable(message),
        other => RemoteError::Http { status: other.as_u16(), message },
    })
}

async fn decode<T: DeserializeOwned>(resp: Response) -> RemoteResult<T> {
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| RemoteError::Decode(e.to_string()))
}

/// Pulls `error.message` out of an ARM error body.
fn arm_message(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    let detail = parsed.error?;
    match (detail.code, detail.message) {
        (Some(code), Some(msg)) => Some(format!("{code}: {msg}")),
        (None, Some(msg)) => Some(msg),
        (Some(code), None) => Some(code),
        (None, None) => None,
    }
}

/// Resource group segment of an ARM resource id.
fn resource_group_of(id: &str) -> Option<&str> {
    let mut parts = id.split('/');
    while let Some(p) = parts.next() {
        if p.eq_ignore_ascii_case("resourceGroups") {
            return parts.next().filter(|s| !s.is_empty());
        }
    }
    None
}

// Wire shapes.

#[derive(Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
    #[serde(default, rename = "nextLink")]
    next_link: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<ErrorDetail>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    code: Option<String>,
    message: Option<String>,
}

#[derive(Deserialize)]
struct AccountWire {
    #[serde(default)]
    id: String,
    name: String,
    #[serde(default)]
    location: String,
    #[serde(default)]
    kind: String,
    #[serde(default)]
    properties: AccountProps,
}

#[derive(Deserialize, Default)]
struct AccountProps {
    endpoint: Option<String>,
}

impl From<AccountWire> for ProjectSummary {
    fn from(w: AccountWire) -> Self {
        Self {
            resource_group: resource_group_of(&w.id).unwrap_or_default().to_string(),
            name: w.name,
            location: w.location,
            kind: w.kind,
            endpoint: w.properties.endpoint,
        }
    }
}

#[derive(Deserialize)]
struct DeploymentWire {
    name: String,
    sku: Option<SkuWire>,
    #[serde(default)]
    properties: DeploymentProps,
}

#[derive(Deserialize)]
struct SkuWire {
    name: String,
    #[serde(default)]
    capacity: Option<u32>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct DeploymentProps {
    model: Option<ModelWire>,
    provisioning_state: Option<String>,
}

#[derive(Deserialize)]
struct ModelWire {
    format: Option<String>,
    name: Option<String>,
    version: Option<String>,
}

impl From<DeploymentWire> for DeploymentInfo {
    fn from(w: DeploymentWire) -> Self {
        let (sku_name, capacity) = match w.sku {
            Some(s) => (Some(s.name), s.capacity.unwrap_or(0)),
            None => (None, 0),
        };
        let (model_name, model_version, model_format) = match w.properties.model {
            Some(m) => (m.name, m.version, m.format),
            None => (None, None, None),
        };
        Self {
            name: w.name,
            model_name,
            model_version,
            model_format,
            sku_name,
            capacity,
            provisioning_state: w.properties.provisioning_state,
        }
    }
}

#[derive(Serialize)]
struct DeploymentBody<'a> {
    sku: SkuBody<'a>,
    properties: PropertiesBody<'a>,
}

#[derive(Serialize)]
struct SkuBody<'a> {
    name: &'a str,
    capacity: u32,
}

#[derive(Serialize)]
struct PropertiesBody<'a> {
    model: ModelBody<'a>,
}

#[derive(Serialize)]
struct ModelBody<'a> {
    format: &'a str,
    name: &'a str,
    version: &'a str,
}

impl<'a> From<&'a DeploymentSpec> for DeploymentBody<'a> {
    fn from(spec: &'a DeploymentSpec) -> Self {
        Self {
            sku: SkuBody { name: spec.sku_name(), capacity: spec.capacity },
            properties: PropertiesBody {
                model: ModelBody {
                    format: &spec.model_format,
                    name: &spec.model_name,
                    version: &spec.model_version,
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use assert_matches::assert_matches;
    use azptu_core::Topology;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::remote::auth::StaticToken;

    const DEP_PATH: &str =
        "/subscriptions/sub-1/resourceGroups/rg-ai/providers/Microsoft.CognitiveServices/accounts/acct/deployments/gpt4o-ptu";

    fn client(server: &MockServer) -> ArmClient {
        let cfg = ArmConfig {
            endpoint: Url::parse(&server.uri()).unwrap(),
            api_version: "2024-10-01".to_string(),
            poll_interval: Duration::from_millis(5),
            poll_timeout: Duration::from_secs(2),
        };
        ArmClient::new(cfg, Box::new(StaticToken::new("t0k"))).unwrap()
    }

    fn scope() -> AccountScope {
        AccountScope {
            subscription_id: "sub-1".to_string(),
            resource_group: "rg-ai".to_string(),
            account_name: "acct".to_string(),
        }
    }

    fn spec(capacity: u32) -> DeploymentSpec {
        DeploymentSpec {
            model_name: "gpt-4o".to_string(),
            model_version: "2024-08-06".to_string(),
            model_format: "OpenAI".to_string(),
            topology: Topology::Global,
            capacity,
        }
    }

    fn deployment(state: &str, capacity: u32) -> serde_json::Value {
        json!({
            "name": "gpt4o-ptu",
            "sku": { "name": "GlobalProvisionedManaged", "capacity": capacity },
            "properties": {
                "model": { "format": "OpenAI", "name": "gpt-4o", "version": "2024-08-06" },
                "provisioningState": state
            }
        })
    }

    #[tokio::test]
    async fn create_puts_body_and_polls_until_succeeded() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path(DEP_PATH))
            .and(query_param("api-version", "2024-10-01"))
            .and(header("authorization", "Bearer t0k"))
            .and(body_json(json!({
                "sku": { "name": "GlobalProvisionedManaged", "capacity": 15 },
                "properties": { "model": { "format": "OpenAI", "name": "gpt-4o", "version": "2024-08-06" } }
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(deployment("Creating", 15)))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(DEP_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(deployment("Succeeded", 15)))
            .mount(&server)
            .await;

        let info = client(&server).create_deployment(&scope(), "gpt4o-ptu", &spec(15)).await.unwrap();
        assert_eq!(info.provisioning_state.as_deref(), Some("Succeeded"));
        assert_eq!(info.capacity, 15);
        assert_eq!(info.topology(), Some(Topology::Global));
    }

    #[tokio::test]
    async fn failed_provisioning_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path(DEP_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(deployment("Failed", 20)))
            .mount(&server)
            .await;

        let err = client(&server).update_capacity(&scope(), "gpt4o-ptu", &spec(20)).await.unwrap_err();
        assert_matches!(err, RemoteError::OperationFailed { .. });
    }

    #[tokio::test]
    async fn status_codes_map_to_remote_errors() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path(DEP_PATH))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": { "code": "InsufficientCapacity", "message": "no capacity in eastus" }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(DEP_PATH))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": { "code": "QuotaExceeded", "message": "quota" }
            })))
            .mount(&server)
            .await;

        let c = client(&server);
        let err = c.create_deployment(&scope(), "gpt4o-ptu", &spec(15)).await.unwrap_err();
        assert_matches!(err, RemoteError::CapacityUnavailable(_));
        assert!(err.to_string().contains("InsufficientCapacity: no capacity in eastus"));

        let err = c.get_deployment(&scope(), "gpt4o-ptu").await.unwrap_err();
        assert_matches!(err, RemoteError::QuotaExceeded(_));
    }

    #[tokio::test]
    async fn missing_deployment_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(DEP_PATH))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = client(&server).get_deployment(&scope(), "gpt4o-ptu").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("gpt4o-ptu"));
    }

    #[tokio::test]
    async fn delete_waits_until_gone() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path(DEP_PATH))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(DEP_PATH))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        client(&server).delete_deployment(&scope(), "gpt4o-ptu").await.unwrap();
    }

    #[tokio::test]
    async fn list_projects_follows_next_link() {
        let server = MockServer::start().await;
        let accounts = "/subscriptions/sub-1/providers/Microsoft.CognitiveServices/accounts";
        Mock::given(method("GET"))
            .and(path(accounts))
            .and(query_param("api-version", "2024-10-01"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [{
                    "id": "/subscriptions/sub-1/resourceGroups/rg-ai/providers/Microsoft.CognitiveServices/accounts/proj-a",
                    "name": "proj-a", "location": "eastus", "kind": "AIServices",
                    "properties": { "endpoint": "https://proj-a.openai.azure.com/" }
                }],
                "nextLink": format!("{}/page2", server.uri())
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/page2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [{
                    "id": "/subscriptions/sub-1/resourceGroups/rg-speech/providers/Microsoft.CognitiveServices/accounts/speech",
                    "name": "speech", "location": "westus", "kind": "SpeechServices"
                }]
            })))
            .mount(&server)
            .await;

        let projects = client(&server).list_projects("sub-1").await.unwrap();
        assert_eq!(projects.len(), 2);
        assert_eq!(projects[0].resource_group, "rg-ai");
        assert_eq!(projects[0].endpoint.as_deref(), Some("https://proj-a.openai.azure.com/"));
        assert_eq!(projects[1].kind, "SpeechServices");
        assert!(!projects[1].is_ai_account());
    }

    #[test]
    fn path_segments_are_escaped() {
        let cfg = ArmConfig {
            endpoint: Url::parse("https://management.azure.com").unwrap(),
            api_version: "2024-10-01".to_string(),
            poll_interval: Duration::from_secs(1),
            poll_timeout: Duration::from_secs(1),
        };
        let c = ArmClient::new(cfg, Box::new(StaticToken::new("x"))).unwrap();
        let s = AccountScope { account_name: "a b".to_string(), ..scope() };
        let url = c.deployment_url(&s, "d/1").unwrap();
        assert_eq!(
            url.as_str(),
            "https://management.azure.com/subscriptions/sub-1/resourceGroups/rg-ai/providers/Microsoft.CognitiveServices/accounts/a%20b/deployments/d%2F1?api-version=2024-10-01"
        );
    }

    #[test]
    fn error_message_and_resource_group_parsing() {
        assert_eq!(
            arm_message(r#"{"error":{"code":"X","message":"y"}}"#).as_deref(),
            Some("X: y")
        );
        assert_eq!(arm_message("not json"), None);
        assert_eq!(resource_group_of("/subscriptions/s/resourcegroups/RG1/providers/p"), Some("RG1"));
        assert_eq!(resource_group_of("/subscriptions/s"), None);
    }
}
