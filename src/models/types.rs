use serde::{Deserialize, Serialize};

/// Label used when a provider item carries no value for a grouping dimension.
pub const UNASSIGNED: &str = "Unassigned";

pub const DEFAULT_CURRENCY: &str = "USD";

/// Dimension used to bucket costs, both in provider queries and in store aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
pub enum GroupBy {
    #[serde(rename = "ServiceName", alias = "service")]
    #[value(name = "service")]
    ServiceName,
    #[serde(rename = "ResourceGroup", alias = "resource_group")]
    #[value(name = "resource-group")]
    ResourceGroup,
}

impl GroupBy {
    /// Name of the dimension in the provider's query language.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ServiceName => "ServiceName",
            Self::ResourceGroup => "ResourceGroup",
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            Self::ServiceName => "service_name",
            Self::ResourceGroup => "resource_group",
        }
    }
}

impl std::fmt::Display for GroupBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Granularity {
    Daily,
    Monthly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

impl std::fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Increasing => write!(f, "increasing"),
            Self::Decreasing => write!(f, "decreasing"),
            Self::Stable => write!(f, "stable"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForecastSource {
    Provider,
    Local,
}
