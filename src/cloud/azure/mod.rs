pub mod auth;
pub mod cost_client;
pub mod query;

pub use auth::{detect_subscription_from_cli, validate_subscription_id, AzureCredential};
pub use cost_client::AzureCostClient;
