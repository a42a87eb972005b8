//! Bearer-token acquisition for the Cost Management API.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

use crate::cloud::TokenSource;
use crate::config::{AzureConfig, HttpConfig};
use crate::errors::{CostError, CostResult};

pub const MANAGEMENT_RESOURCE: &str = "https://management.azure.com";
const DEFAULT_MSI_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";
const CLI_TIMEOUT: Duration = Duration::from_secs(30);

const PLACEHOLDER_SUBSCRIPTIONS: &[&str] = &[
    "providers",
    "YOUR_SUBSCRIPTION_ID",
    "YOUR_SUB_ID",
    "<subscription-id>",
    "subscription-id",
];

#[derive(Debug, Clone)]
pub enum AzureCredential {
    /// Reuses the signed-in `az` CLI session.
    CliSession,
    ServicePrincipal {
        authority_url: String,
        tenant_id: String,
        client_id: String,
        client_secret: String,
        http: reqwest::Client,
    },
    ManagedIdentity {
        endpoint: String,
        client_id: Option<String>,
        http: reqwest::Client,
    },
}

#[derive(Deserialize)]
struct CliToken {
    #[serde(rename = "accessToken")]
    access_token: String,
}

#[derive(Deserialize)]
struct OAuthToken {
    access_token: String,
}

#[derive(Deserialize)]
struct CliAccount {
    id: String,
}

impl AzureCredential {
    pub fn from_config(azure: &AzureConfig, http: &HttpConfig) -> CostResult<Self> {
        let client = || {
            reqwest::Client::builder()
                .timeout(Duration::from_secs(http.timeout_secs))
                .build()
                .map_err(CostError::from)
        };

        match azure.auth_method.as_str() {
            "cli" | "" => Ok(Self::CliSession),
            "service_principal" | "sp" => {
                let missing: Vec<&str> = [
                    ("tenant_id", &azure.tenant_id),
                    ("client_id", &azure.client_id),
                    ("client_secret", &azure.client_secret),
                ]
                .into_iter()
                .filter(|(_, v)| v.trim().is_empty())
                .map(|(k, _)| k)
                .collect();
                if !missing.is_empty() {
                    return Err(CostError::Configuration(format!(
                        "service principal auth requires azure.{}",
                        missing.join(", azure.")
                    )));
                }
                Ok(Self::ServicePrincipal {
                    authority_url: azure.authority_url.trim_end_matches('/').to_string(),
                    tenant_id: azure.tenant_id.clone(),
                    client_id: azure.client_id.clone(),
                    client_secret: azure.client_secret.clone(),
                    http: client()?,
                })
            }
            "managed_identity" | "msi" => Ok(Self::ManagedIdentity {
                endpoint: azure
                    .msi_endpoint
                    .clone()
                    .filter(|e| !e.is_empty())
                    .unwrap_or_else(|| DEFAULT_MSI_ENDPOINT.into()),
                client_id: azure.msi_client_id.clone().filter(|c| !c.is_empty()),
                http: client()?,
            }),
            other => Err(CostError::Configuration(format!(
                "unknown azure.auth_method '{other}' (expected cli, service_principal or managed_identity)"
            ))),
        }
    }

    pub fn method_name(&self) -> &'static str {
        match self {
            Self::CliSession => "cli",
            Self::ServicePrincipal { .. } => "service_principal",
            Self::ManagedIdentity { .. } => "managed_identity",
        }
    }
}

async fn run_az(args: &[&str]) -> CostResult<Vec<u8>> {
    let output = tokio::time::timeout(CLI_TIMEOUT, Command::new("az").args(args).output())
        .await
        .map_err(|_| CostError::Token("az CLI timed out".into()))?
        .map_err(|e| CostError::Token(format!("failed to run az CLI: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(CostError::Token(format!("az CLI failed: {}", stderr.trim())));
    }
    Ok(output.stdout)
}

async fn read_token<T: for<'de> Deserialize<'de>>(resp: reqwest::Response) -> CostResult<T> {
    let status = resp.status();
    let body = resp.text().await?;
    if !status.is_success() {
        return Err(CostError::Token(format!("token endpoint returned {status}: {body}")));
    }
    serde_json::from_str(&body).map_err(|e| CostError::Token(format!("unexpected token response: {e}")))
}

#[async_trait]
impl TokenSource for AzureCredential {
    async fn acquire(&self) -> CostResult<String> {
        tracing::debug!(method = self.method_name(), "acquiring access token");
        match self {
            Self::CliSession => {
                let stdout = run_az(&[
                    "account",
                    "get-access-token",
                    "--resource",
                    MANAGEMENT_RESOURCE,
                    "--output",
                    "json",
                ])
                .await?;
                let token: CliToken = serde_json::from_slice(&stdout)
                    .map_err(|e| CostError::Token(format!("unexpected az CLI output: {e}")))?;
                Ok(token.access_token)
            }
            Self::ServicePrincipal {
                authority_url,
                tenant_id,
                client_id,
                client_secret,
                http,
            } => {
                let scope = format!("{MANAGEMENT_RESOURCE}/.default");
                let resp = http
                    .post(format!("{authority_url}/{tenant_id}/oauth2/v2.0/token"))
                    .form(&[
                        ("grant_type", "client_credentials"),
                        ("client_id", client_id.as_str()),
                        ("client_secret", client_secret.as_str()),
                        ("scope", scope.as_str()),
                    ])
                    .send()
                    .await
                    .map_err(|e| CostError::Token(e.to_string()))?;
                let token: OAuthToken = read_token(resp).await?;
                Ok(token.access_token)
            }
            Self::ManagedIdentity {
                endpoint,
                client_id,
                http,
            } => {
                let mut query = vec![("resource", MANAGEMENT_RESOURCE), ("api-version", "2018-02-01")];
                if let Some(id) = client_id {
                    query.push(("client_id", id.as_str()));
                }
                let resp = http
                    .get(endpoint)
                    .query(&query)
                    .header("Metadata", "true")
                    .send()
                    .await
                    .map_err(|e| CostError::Token(e.to_string()))?;
                let token: OAuthToken = read_token(resp).await?;
                Ok(token.access_token)
            }
        }
    }
}

/// Reads the default subscription from the signed-in `az` session.
pub async fn detect_subscription_from_cli() -> CostResult<String> {
    let stdout = run_az(&["account", "show", "--output", "json"]).await?;
    let account: CliAccount = serde_json::from_slice(&stdout)
        .map_err(|e| CostError::Authentication(format!("unexpected az account output: {e}")))?;
    validate_subscription_id(&account.id)?;
    Ok(account.id)
}

pub fn validate_subscription_id(id: &str) -> CostResult<()> {
    let id = id.trim();
    if id.is_empty() {
        return Err(CostError::Authentication("subscription ID not set".into()));
    }
    if PLACEHOLDER_SUBSCRIPTIONS.iter().any(|p| p.eq_ignore_ascii_case(id)) {
        return Err(CostError::Authentication(format!(
            "'{id}' is a placeholder, set a real subscription ID"
        )));
    }
    if id.len() != 36 || uuid::Uuid::parse_str(id).is_err() {
        return Err(CostError::Authentication(format!("'{id}' is not a valid subscription GUID")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sp_config(authority: &str) -> AzureConfig {
        AzureConfig {
            auth_method: "service_principal".into(),
            tenant_id: "tenant-1".into(),
            client_id: "app-1".into(),
            client_secret: "s3cr3t+/=".into(),
            authority_url: authority.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_subscription_id() {
        assert!(validate_subscription_id("0b1f6471-1bf0-4dda-aec3-cb9272f09590").is_ok());
        for bad in ["", "  ", "providers", "YOUR_SUBSCRIPTION_ID", "<subscription-id>", "not-a-guid"] {
            assert!(
                matches!(validate_subscription_id(bad), Err(CostError::Authentication(_))),
                "{bad:?} should be rejected"
            );
        }
        // Hyphenless form parses as a UUID but is not how subscriptions are written.
        assert!(validate_subscription_id("0b1f64711bf04ddaaec3cb9272f09590").is_err());
    }

    #[test]
    fn test_from_config_methods() {
        let http = HttpConfig::default();
        let cli = AzureCredential::from_config(&AzureConfig::default(), &http).unwrap();
        assert_eq!(cli.method_name(), "cli");

        let msi = AzureCredential::from_config(
            &AzureConfig {
                auth_method: "managed_identity".into(),
                ..Default::default()
            },
            &http,
        )
        .unwrap();
        match msi {
            AzureCredential::ManagedIdentity { endpoint, client_id, .. } => {
                assert_eq!(endpoint, DEFAULT_MSI_ENDPOINT);
                assert!(client_id.is_none());
            }
            other => panic!("unexpected credential: {other:?}"),
        }
    }

    #[test]
    fn test_from_config_rejects_bad_input() {
        let http = HttpConfig::default();
        let unknown = AzureConfig {
            auth_method: "kerberos".into(),
            ..Default::default()
        };
        assert!(matches!(
            AzureCredential::from_config(&unknown, &http),
            Err(CostError::Configuration(_))
        ));

        let mut partial = sp_config("https://login.example");
        partial.client_secret.clear();
        let err = AzureCredential::from_config(&partial, &http).unwrap_err();
        assert!(err.to_string().contains("client_secret"));
    }

    #[tokio::test]
    async fn test_service_principal_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tenant-1/oauth2/v2.0/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string_contains("client_id=app-1"))
            .and(body_string_contains("client_secret=s3cr3t%2B%2F%3D"))
            .and(body_string_contains("scope=https%3A%2F%2Fmanagement.azure.com%2F.default"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token_type": "Bearer", "expires_in": 3599, "access_token": "sp-token"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let cred = AzureCredential::from_config(&sp_config(&server.uri()), &HttpConfig::default()).unwrap();
        assert_eq!(cred.acquire().await.unwrap(), "sp-token");
    }

    #[tokio::test]
    async fn test_service_principal_rejection_is_token_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("AADSTS7000215: invalid secret"))
            .mount(&server)
            .await;

        let cred = AzureCredential::from_config(&sp_config(&server.uri()), &HttpConfig::default()).unwrap();
        let err = cred.acquire().await.unwrap_err();
        assert!(matches!(err, CostError::Token(ref m) if m.contains("AADSTS7000215")));
    }

    #[tokio::test]
    async fn test_managed_identity_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/metadata/identity/oauth2/token"))
            .and(header("Metadata", "true"))
            .and(query_param("resource", MANAGEMENT_RESOURCE))
            .and(query_param("api-version", "2018-02-01"))
            .and(query_param("client_id", "mi-client"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": "mi-token" })))
            .expect(1)
            .mount(&server)
            .await;

        let cfg = AzureConfig {
            auth_method: "managed_identity".into(),
            msi_endpoint: Some(format!("{}/metadata/identity/oauth2/token", server.uri())),
            msi_client_id: Some("mi-client".into()),
            ..Default::default()
        };
        let cred = AzureCredential::from_config(&cfg, &HttpConfig::default()).unwrap();
        assert_eq!(cred.acquire().await.unwrap(), "mi-token");
    }
}
