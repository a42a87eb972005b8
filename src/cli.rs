//! Command-line surface. Every command prints one rendered result to stdout.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::cloud::azure::{detect_subscription_from_cli, validate_subscription_id};
use crate::config::AppConfig;
use crate::db::{AlertRepo, CostRepo, SettingsRepo};
use crate::models::{CostFilter, CreateAlertRequest};
use crate::output::{render, OutputFormat, Render};
use crate::period;
use crate::services::CostService;

/// Track cloud spend from the terminal
#[derive(Parser, Debug)]
#[command(name = "costwatch")]
#[command(about = "Fetch, store and analyze cloud billing data")]
#[command(version)]
pub struct Cli {
    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    pub output: OutputFormat,

    /// Extra configuration file, layered over ~/.costwatch/config and ./config
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Read and write configuration overrides
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Cost queries and alerts
    #[command(subcommand)]
    Cost(CostCommand),
    /// Cloud provider status
    #[command(subcommand)]
    Cloud(CloudCommand),
    /// Run the HTTP API
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    Get { key: String },
    Set { key: String, value: String },
    List,
    /// Store the default subscription of the signed-in az CLI
    DetectSubscription,
}

#[derive(Subcommand, Debug)]
pub enum CostCommand {
    /// Refresh and summarize the current month
    Current,
    /// Summary of the last N days with monthly breakdown and trend
    History {
        #[arg(long, default_value_t = 30)]
        days: u32,
    },
    /// Pull a period from the provider into the local store
    Fetch {
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
    },
    /// Summarize stored costs
    Summary {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// List stored cost records
    Records {
        #[command(flatten)]
        filter: FilterArgs,
    },
    Forecast {
        /// Forecast from stored history instead of the provider
        #[arg(long)]
        local: bool,
    },
    Trend,
    Report,
    #[command(subcommand)]
    Alert(AlertCommand),
}

#[derive(clap::Args, Debug, Default)]
pub struct FilterArgs {
    #[arg(long)]
    pub start: Option<NaiveDate>,
    #[arg(long)]
    pub end: Option<NaiveDate>,
    #[arg(long)]
    pub service: Option<String>,
}

impl FilterArgs {
    fn filter(&self) -> CostFilter {
        CostFilter {
            start_date: self.start,
            end_date: self.end,
            service_name: self.service.clone(),
            group_by: None,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum AlertCommand {
    List,
    Add {
        name: String,
        threshold: f64,
        #[arg(long)]
        subscription: Option<String>,
        #[arg(long)]
        disabled: bool,
    },
    /// Compare stored current-month costs against enabled alerts
    Check,
    Delete { name: String },
    Enable { name: String },
    Disable { name: String },
}

#[derive(Subcommand, Debug)]
pub enum CloudCommand {
    List,
}

#[derive(Debug, Serialize)]
pub struct ProviderStatus {
    pub provider: &'static str,
    pub configured: bool,
    pub detail: String,
}

impl Render for [ProviderStatus] {
    fn table(&self) -> String {
        let mut out = String::from("Configured Cloud Providers\n");
        for p in self {
            let mark = if p.configured { "[x]" } else { "[ ]" };
            out.push_str(&format!("{mark} {}: {}\n", p.provider, p.detail));
        }
        out.push_str("\nUse 'costwatch config set' to configure providers\n");
        out
    }

    fn csv_header(&self) -> Vec<&'static str> {
        vec!["provider", "configured", "detail"]
    }

    fn csv_rows(&self) -> Vec<Vec<String>> {
        self.iter()
            .map(|p| vec![p.provider.to_string(), p.configured.to_string(), p.detail.clone()])
            .collect()
    }
}

/// Plain acknowledgement for commands that change state.
#[derive(Debug, Serialize)]
struct Message {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    count: Option<u64>,
}

impl Message {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            count: None,
        }
    }

    fn with_count(message: impl Into<String>, count: u64) -> Self {
        Self {
            message: message.into(),
            count: Some(count),
        }
    }
}

impl Render for Message {
    fn table(&self) -> String {
        format!("{}\n", self.message)
    }

    fn csv_header(&self) -> Vec<&'static str> {
        vec!["message", "count"]
    }

    fn csv_rows(&self) -> Vec<Vec<String>> {
        vec![vec![self.message.clone(), self.count.map(|c| c.to_string()).unwrap_or_default()]]
    }
}

pub fn provider_status(config: &AppConfig) -> Vec<ProviderStatus> {
    let status = |provider, value: &str| ProviderStatus {
        provider,
        configured: !value.is_empty(),
        detail: if value.is_empty() { "not configured".into() } else { value.to_string() },
    };
    vec![
        status("azure", &config.azure.subscription_id),
        status("aws", &config.aws.region),
        status("gcp", &config.gcp.project_id),
    ]
}

/// Replays stored overrides onto the loaded configuration.
pub async fn apply_store_overrides(config: &mut AppConfig, pool: &SqlitePool) -> anyhow::Result<()> {
    for (key, value) in SettingsRepo::all(pool).await? {
        match config.apply_override(&key, &value) {
            Ok(true) => {}
            Ok(false) => tracing::debug!(%key, "ignoring stored key with no configuration counterpart"),
            Err(e) => tracing::warn!(%key, error = %e, "ignoring invalid stored setting"),
        }
    }
    Ok(())
}

pub async fn run_config(cmd: ConfigCommand, config: &AppConfig, pool: &SqlitePool, format: OutputFormat) -> anyhow::Result<String> {
    match cmd {
        ConfigCommand::Get { key } => {
            let value = match SettingsRepo::get(pool, AppConfig::canonical_key(&key)).await? {
                Some(v) => v,
                None => config
                    .get(&key)
                    .ok_or_else(|| anyhow::anyhow!("unknown configuration key '{key}'"))?,
            };
            Ok(format!("{value}\n"))
        }
        ConfigCommand::Set { key, value } => {
            if AppConfig::canonical_key(&key) == "azure.subscription_id" {
                validate_subscription_id(&value)?;
            }
            let key = SettingsRepo::store_override(pool, &key, &value).await?;
            render(&Message::new(format!("Set {key} = {value}")), format)
        }
        ConfigCommand::List => {
            let mut entries: BTreeMap<String, String> = AppConfig::KEYS
                .iter()
                .filter_map(|k| config.get(k).map(|v| (k.to_string(), v)))
                .collect();
            for (key, value) in SettingsRepo::all(pool).await? {
                if !key.contains("secret") && !key.contains("token") && !key.contains("access_key") {
                    entries.insert(key, value);
                }
            }
            render(&entries, format)
        }
        ConfigCommand::DetectSubscription => {
            let id = detect_subscription_from_cli().await?;
            SettingsRepo::store_override(pool, "azure.subscription_id", &id).await?;
            render(&Message::new(format!("Subscription set to {id}")), format)
        }
    }
}

pub async fn run_cost(cmd: CostCommand, service: &CostService, format: OutputFormat) -> anyhow::Result<String> {
    match cmd {
        CostCommand::Current => render(&service.get_current_costs().await?, format),
        CostCommand::History { days } => render(&service.get_cost_history(days).await?, format),
        CostCommand::Fetch { start, end } => {
            let month = period::current_month_range(period::today());
            let start = start.unwrap_or(month.start);
            let end = end.unwrap_or_else(|| month.last_day());
            anyhow::ensure!(start <= end, "--start {start} is after --end {end}");

            let stored = service.fetch_and_store_costs(start, end).await?;
            render(
                &Message::with_count(format!("Fetched and stored costs for {start} to {end}"), stored as u64),
                format,
            )
        }
        CostCommand::Summary { filter } => render(&service.get_cost_summary(&filter.filter()).await?, format),
        CostCommand::Records { filter } => {
            let records = CostRepo::get_records(service.pool(), &filter.filter()).await?;
            render(records.as_slice(), format)
        }
        CostCommand::Forecast { local } => {
            let forecast = if local {
                service.get_local_forecast().await?
            } else {
                service.get_forecast().await?
            };
            render(&forecast, format)
        }
        CostCommand::Trend => render(&service.get_trend_analysis().await?, format),
        CostCommand::Report => render(&service.generate_report().await?, format),
        CostCommand::Alert(alert) => run_alert(alert, service, format).await,
    }
}

async fn run_alert(cmd: AlertCommand, service: &CostService, format: OutputFormat) -> anyhow::Result<String> {
    let pool = service.pool();
    match cmd {
        AlertCommand::List => render(AlertRepo::list(pool).await?.as_slice(), format),
        AlertCommand::Add {
            name,
            threshold,
            subscription,
            disabled,
        } => {
            let alert = service
                .create_alert(&CreateAlertRequest {
                    name,
                    threshold,
                    subscription_id: subscription,
                    enabled: !disabled,
                })
                .await?;
            render(
                &Message::new(format!("Alert '{}' created with threshold ${:.2}", alert.name, alert.threshold)),
                format,
            )
        }
        AlertCommand::Check => render(&service.check_alerts().await?, format),
        AlertCommand::Delete { name } => {
            let deleted = AlertRepo::delete_by_name(pool, &name).await?;
            render(&Message::with_count(format!("Alert '{name}' deleted"), deleted), format)
        }
        AlertCommand::Enable { name } => toggle(pool, &name, true, format).await,
        AlertCommand::Disable { name } => toggle(pool, &name, false, format).await,
    }
}

async fn toggle(pool: &SqlitePool, name: &str, enabled: bool, format: OutputFormat) -> anyhow::Result<String> {
    let updated = AlertRepo::set_enabled(pool, name, enabled).await?;
    anyhow::ensure!(updated > 0, "no alert named '{name}'");
    let state = if enabled { "enabled" } else { "disabled" };
    render(&Message::with_count(format!("Alert '{name}' {state}"), updated), format)
}

pub fn run_cloud(cmd: CloudCommand, config: &AppConfig, format: OutputFormat) -> anyhow::Result<String> {
    match cmd {
        CloudCommand::List => render(provider_status(config).as_slice(), format),
    }
}
