use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;

use crate::errors::{CostError, CostResult};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub azure: AzureConfig,
    #[serde(default)]
    pub aws: AwsConfig,
    #[serde(default)]
    pub gcp: GcpConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub trend: TrendConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_storage_path")]
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { path: default_storage_path() }
    }
}

fn default_storage_path() -> String {
    "~/.costwatch/data.db".into()
}

#[derive(Debug, Deserialize, Clone)]
pub struct AzureConfig {
    #[serde(default = "default_auth_method")]
    pub auth_method: String,
    #[serde(default)]
    pub subscription_id: String,
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default = "default_management_url")]
    pub management_url: String,
    #[serde(default = "default_authority_url")]
    pub authority_url: String,
    pub msi_endpoint: Option<String>,
    pub msi_client_id: Option<String>,
}

impl Default for AzureConfig {
    fn default() -> Self {
        Self {
            auth_method: default_auth_method(),
            subscription_id: String::new(),
            tenant_id: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            management_url: default_management_url(),
            authority_url: default_authority_url(),
            msi_endpoint: None,
            msi_client_id: None,
        }
    }
}

fn default_auth_method() -> String {
    "cli".into()
}
fn default_management_url() -> String {
    "https://management.azure.com".into()
}
fn default_authority_url() -> String {
    "https://login.microsoftonline.com".into()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AwsConfig {
    #[serde(default)]
    pub access_key: String,
    #[serde(default)]
    pub secret_key: String,
    #[serde(default)]
    pub session_token: String,
    #[serde(default)]
    pub region: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct GcpConfig {
    #[serde(default)]
    pub project_id: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_secs: default_timeout() }
    }
}

fn default_timeout() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct TrendConfig {
    /// Changes within +/- this percentage classify as "stable".
    #[serde(default = "default_stable_band")]
    pub stable_band_pct: f64,
    #[serde(default = "default_history_months")]
    pub history_months: u32,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            stable_band_pct: default_stable_band(),
            history_months: default_history_months(),
        }
    }
}

fn default_stable_band() -> f64 {
    5.0
}
fn default_history_months() -> u32 {
    6
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8080
}

impl AppConfig {
    /// Keys readable through [`AppConfig::get`]. Secrets are not listed.
    pub const KEYS: &'static [&'static str] = &[
        "azure.subscription_id",
        "azure.auth_method",
        "azure.tenant_id",
        "azure.client_id",
        "azure.management_url",
        "aws.region",
        "gcp.project_id",
        "storage.path",
        "http.timeout_secs",
        "trend.stable_band_pct",
        "trend.history_months",
        "server.host",
        "server.port",
    ];

    /// Layers `~/.costwatch/config.*`, `./config.*`, an explicit file and
    /// `COSTWATCH__SECTION__KEY` environment variables.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(home) = dirs::home_dir() {
            let user_file = home.join(".costwatch").join("config");
            builder = builder.add_source(
                config::File::with_name(&user_file.to_string_lossy()).required(false),
            );
        }
        builder = builder.add_source(config::File::with_name("config").required(false));
        if let Some(path) = explicit {
            builder = builder.add_source(config::File::from(path.to_path_buf()).required(true));
        }

        let config = builder
            .add_source(config::Environment::with_prefix("COSTWATCH").separator("__"))
            .set_override_option("azure.client_secret", std::env::var("AZURE_CLIENT_SECRET").ok())?
            .set_override_option("azure.msi_endpoint", std::env::var("MSI_ENDPOINT").ok())?
            .set_override_option("azure.msi_client_id", std::env::var("MSI_CLIENT_ID").ok())?
            .build()?;

        let mut app_config: AppConfig = config.try_deserialize()?;
        app_config.storage.path = expand_home(&app_config.storage.path)
            .to_string_lossy()
            .into_owned();
        Ok(app_config)
    }

    /// Store key for a setting; `subscription` is an alias of `azure.subscription_id`.
    pub fn canonical_key(key: &str) -> &str {
        match key {
            "subscription" => "azure.subscription_id",
            other => other,
        }
    }

    /// Whether `key` can be overridden from the store.
    pub fn is_known_key(key: &str) -> bool {
        matches!(
            Self::canonical_key(key),
            "azure.subscription_id"
                | "azure.auth_method"
                | "azure.tenant_id"
                | "azure.client_id"
                | "azure.client_secret"
                | "azure.management_url"
                | "aws.access_key"
                | "aws.secret_key"
                | "aws.session_token"
                | "aws.region"
                | "gcp.project_id"
                | "http.timeout_secs"
                | "trend.stable_band_pct"
                | "trend.history_months"
                | "server.host"
                | "server.port"
        )
    }

    /// Checks that `value` is acceptable for `key` without applying it.
    pub fn validate_override(key: &str, value: &str) -> CostResult<()> {
        match Self::canonical_key(key) {
            "storage.path" => Err(CostError::Configuration(
                "storage.path is read from the config file or COSTWATCH__STORAGE__PATH".into(),
            )),
            "http.timeout_secs" => parse_setting::<u64>(key, value).map(drop),
            "trend.stable_band_pct" => parse_band(key, value).map(drop),
            "trend.history_months" => parse_setting::<u32>(key, value).map(drop),
            "server.port" => parse_setting::<u16>(key, value).map(drop),
            k if Self::is_known_key(k) => Ok(()),
            _ => Err(CostError::Configuration(format!("unknown configuration key '{key}'"))),
        }
    }

    /// Applies a stored override. Returns `Ok(false)` for keys this struct does not carry.
    pub fn apply_override(&mut self, key: &str, value: &str) -> CostResult<bool> {
        if !Self::is_known_key(key) {
            return Ok(false);
        }
        Self::validate_override(key, value)?;

        let text = value.to_string();
        match Self::canonical_key(key) {
            "azure.subscription_id" => self.azure.subscription_id = text,
            "azure.auth_method" => self.azure.auth_method = text,
            "azure.tenant_id" => self.azure.tenant_id = text,
            "azure.client_id" => self.azure.client_id = text,
            "azure.client_secret" => self.azure.client_secret = text,
            "azure.management_url" => self.azure.management_url = text,
            "aws.access_key" => self.aws.access_key = text,
            "aws.secret_key" => self.aws.secret_key = text,
            "aws.session_token" => self.aws.session_token = text,
            "aws.region" => self.aws.region = text,
            "gcp.project_id" => self.gcp.project_id = text,
            "http.timeout_secs" => self.http.timeout_secs = parse_setting(key, value)?,
            "trend.stable_band_pct" => self.trend.stable_band_pct = parse_band(key, value)?,
            "trend.history_months" => self.trend.history_months = parse_setting(key, value)?,
            "server.host" => self.server.host = text,
            "server.port" => self.server.port = parse_setting(key, value)?,
            _ => return Ok(false),
        }
        Ok(true)
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let value = match Self::canonical_key(key) {
            "azure.subscription_id" => self.azure.subscription_id.clone(),
            "azure.auth_method" => self.azure.auth_method.clone(),
            "azure.tenant_id" => self.azure.tenant_id.clone(),
            "azure.client_id" => self.azure.client_id.clone(),
            "azure.management_url" => self.azure.management_url.clone(),
            "aws.region" => self.aws.region.clone(),
            "gcp.project_id" => self.gcp.project_id.clone(),
            "storage.path" => self.storage.path.clone(),
            "http.timeout_secs" => self.http.timeout_secs.to_string(),
            "trend.stable_band_pct" => self.trend.stable_band_pct.to_string(),
            "trend.history_months" => self.trend.history_months.to_string(),
            "server.host" => self.server.host.clone(),
            "server.port" => self.server.port.to_string(),
            _ => return None,
        };
        Some(value)
    }
}

fn parse_setting<T: FromStr>(key: &str, value: &str) -> CostResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| CostError::Configuration(format!("invalid value '{value}' for {key}")))
}

fn parse_band(key: &str, value: &str) -> CostResult<f64> {
    let band: f64 = parse_setting(key, value)?;
    if !band.is_finite() || band < 0.0 {
        return Err(CostError::Configuration(format!("{key} must be a non-negative number")));
    }
    Ok(band)
}

pub fn expand_home(path: &str) -> PathBuf {
    let rest = path
        .strip_prefix("~")
        .or_else(|| path.strip_prefix("$HOME"));
    match (rest, dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest.trim_start_matches('/')),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.azure.auth_method, "cli");
        assert_eq!(cfg.http.timeout_secs, 60);
        assert_eq!(cfg.trend.history_months, 6);
        assert_eq!(cfg.storage.path, "~/.costwatch/data.db");
    }

    #[test]
    fn test_subscription_alias_override() {
        let mut cfg = AppConfig::default();
        assert!(cfg.apply_override("subscription", "sub-1").unwrap());
        assert_eq!(cfg.azure.subscription_id, "sub-1");
        assert_eq!(cfg.get("azure.subscription_id").as_deref(), Some("sub-1"));
        assert_eq!(AppConfig::canonical_key("subscription"), "azure.subscription_id");
        assert!(!cfg.apply_override("ollama.model", "x").unwrap());
    }

    #[test]
    fn test_numeric_overrides_are_parsed() {
        let mut cfg = AppConfig::default();
        assert!(cfg.apply_override("trend.stable_band_pct", "2").unwrap());
        assert!(cfg.apply_override("trend.history_months", "12").unwrap());
        assert!(cfg.apply_override("http.timeout_secs", "15").unwrap());
        assert!(cfg.apply_override("server.port", "9090").unwrap());
        assert!(cfg.apply_override("server.host", "0.0.0.0").unwrap());

        assert_eq!(cfg.trend.stable_band_pct, 2.0);
        assert_eq!(cfg.trend.history_months, 12);
        assert_eq!(cfg.http.timeout_secs, 15);
        assert_eq!(cfg.server.port, 9090);
        assert_eq!(cfg.server.host, "0.0.0.0");
    }

    #[test]
    fn test_bad_override_values_are_rejected() {
        let mut cfg = AppConfig::default();
        assert!(matches!(
            cfg.apply_override("trend.stable_band_pct", "wide"),
            Err(CostError::Configuration(_))
        ));
        assert!(cfg.apply_override("trend.stable_band_pct", "-1").is_err());
        assert!(cfg.apply_override("server.port", "70000").is_err());
        assert_eq!(cfg.trend.stable_band_pct, 5.0);
        assert_eq!(cfg.server.port, 8080);

        assert!(AppConfig::validate_override("storage.path", "/tmp/x.db").is_err());
        assert!(AppConfig::validate_override("ollama.model", "x").is_err());
        assert!(AppConfig::validate_override("subscription", "anything").is_ok());
    }

    #[test]
    fn test_load_explicit_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("costwatch.toml");
        std::fs::write(
            &path,
            "[azure]\nsubscription_id = \"abc\"\n[trend]\nstable_band_pct = 2.5\n[storage]\npath = \"/tmp/cw.db\"\n",
        )
        .unwrap();

        let cfg = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(cfg.azure.subscription_id, "abc");
        assert_eq!(cfg.trend.stable_band_pct, 2.5);
        assert_eq!(cfg.storage.path, "/tmp/cw.db");
        assert_eq!(cfg.azure.auth_method, "cli");
    }

    #[test]
    fn test_expand_home_leaves_absolute_paths() {
        assert_eq!(expand_home("/var/lib/cw.db"), PathBuf::from("/var/lib/cw.db"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/.costwatch/data.db"), home.join(".costwatch/data.db"));
        }
    }
}
