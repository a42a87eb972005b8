use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Alert {
    pub id: i64,
    pub name: String,
    pub threshold: f64,
    pub subscription_id: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAlertRequest {
    pub name: String,
    pub threshold: f64,
    #[serde(default)]
    pub subscription_id: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertStatus {
    Triggered,
    Ok,
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Triggered => write!(f, "TRIGGERED"),
            Self::Ok => write!(f, "OK"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvaluation {
    pub name: String,
    pub threshold: f64,
    pub total_cost: f64,
    pub percent_of_threshold: f64,
    pub status: AlertStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertCheck {
    pub period: String,
    pub total_cost: f64,
    pub currency: String,
    pub evaluations: Vec<AlertEvaluation>,
}

impl AlertCheck {
    pub fn any_triggered(&self) -> bool {
        self.evaluations
            .iter()
            .any(|e| e.status == AlertStatus::Triggered)
    }
}
