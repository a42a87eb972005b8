//! Table, JSON and CSV rendering for CLI results.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::Serialize;

use crate::models::{Alert, AlertCheck, CostRecord, CostReport, CostSummary, Forecast, TrendAnalysis, TrendDirection};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Csv,
}

/// A CLI result with a human-readable table and a flat CSV form.
pub trait Render: Serialize {
    fn table(&self) -> String;
    fn csv_header(&self) -> Vec<&'static str>;
    fn csv_rows(&self) -> Vec<Vec<String>>;
}

pub fn render<T: Render + ?Sized>(value: &T, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Table => Ok(value.table()),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(value)?),
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(Vec::new());
            writer.write_record(value.csv_header())?;
            for row in value.csv_rows() {
                writer.write_record(&row)?;
            }
            let bytes = writer.into_inner().map_err(|e| anyhow::anyhow!(e.to_string()))?;
            Ok(String::from_utf8(bytes)?)
        }
    }
}

fn money(amount: f64) -> String {
    format!("${amount:.2}")
}

fn by_cost_desc(map: &BTreeMap<String, f64>) -> Vec<(&String, &f64)> {
    let mut entries: Vec<_> = map.iter().collect();
    entries.sort_by(|a, b| b.1.total_cmp(a.1));
    entries
}

impl Render for CostSummary {
    fn table(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Costs - {}", self.period);
        let _ = writeln!(out, "Total Cost: {} {}", money(self.total_cost), self.currency);

        if !self.by_service.is_empty() {
            let _ = writeln!(out, "\nBy Service:");
            for (service, cost) in by_cost_desc(&self.by_service) {
                let _ = writeln!(out, "  {:<30} {:>12}", format!("{service}:"), money(*cost));
            }
        }
        if !self.by_resource_group.is_empty() {
            let _ = writeln!(out, "\nBy Resource Group:");
            for (group, cost) in by_cost_desc(&self.by_resource_group) {
                let _ = writeln!(out, "  {:<30} {:>12}", format!("{group}:"), money(*cost));
            }
        }
        if let Some(forecast) = &self.forecast {
            let _ = writeln!(out, "\nForecast next month: {} ({})", money(forecast.next_month), forecast.confidence);
        }
        if let Some(months) = &self.monthly_breakdown {
            let _ = writeln!(out, "\nMonthly Breakdown:");
            for m in months {
                let _ = writeln!(out, "  {}: {}", m.month, money(m.total_cost));
            }
        }
        if let Some(trend) = &self.trend {
            let _ = writeln!(out, "\nTrend: {} ({:+.2}%)", trend.trend, trend.change_percent);
        }
        out
    }

    fn csv_header(&self) -> Vec<&'static str> {
        vec!["service", "cost"]
    }

    fn csv_rows(&self) -> Vec<Vec<String>> {
        self.by_service
            .iter()
            .map(|(service, cost)| vec![service.clone(), format!("{cost:.2}")])
            .collect()
    }
}

impl Render for [CostRecord] {
    fn table(&self) -> String {
        if self.is_empty() {
            return "No cost records\n".into();
        }
        let mut out = format!("{:<12} {:<30} {:<24} {:>12} {:<4}\n", "DATE", "SERVICE", "RESOURCE GROUP", "COST", "CUR");
        for r in self {
            let _ = writeln!(
                out,
                "{:<12} {:<30} {:<24} {:>12.2} {:<4}",
                r.date,
                r.service_name,
                r.resource_group.as_deref().unwrap_or("-"),
                r.cost,
                r.currency
            );
        }
        out
    }

    fn csv_header(&self) -> Vec<&'static str> {
        vec!["date", "subscription_id", "resource_group", "service_name", "cost", "currency"]
    }

    fn csv_rows(&self) -> Vec<Vec<String>> {
        self.iter()
            .map(|r| {
                vec![
                    r.date.to_string(),
                    r.subscription_id.clone(),
                    r.resource_group.clone().unwrap_or_default(),
                    r.service_name.clone(),
                    format!("{:.2}", r.cost),
                    r.currency.clone(),
                ]
            })
            .collect()
    }
}

impl Render for Forecast {
    fn table(&self) -> String {
        format!("Forecast for next month: {} (confidence: {})\n", money(self.next_month), self.confidence)
    }

    fn csv_header(&self) -> Vec<&'static str> {
        vec!["next_month", "confidence"]
    }

    fn csv_rows(&self) -> Vec<Vec<String>> {
        vec![vec![format!("{:.2}", self.next_month), self.confidence.clone()]]
    }
}

impl Render for TrendAnalysis {
    fn table(&self) -> String {
        let arrow = match self.trend {
            TrendDirection::Increasing => "up",
            TrendDirection::Decreasing => "down",
            TrendDirection::Stable => "flat",
        };
        let mut out = String::from("Cost Trend Analysis\n");
        let _ = writeln!(out, "Current Month:    {}", money(self.current_month));
        let _ = writeln!(out, "Previous Month:   {}", money(self.previous_month));
        let _ = writeln!(out, "Change:           {:.2}% ({arrow})", self.change_percent);
        let _ = writeln!(out, "Trend:            {}", self.trend);
        let _ = writeln!(out, "Monthly Average:  {}", money(self.average_monthly));
        let _ = writeln!(out, "Next Month Proj:  {}", money(self.projection));
        out
    }

    fn csv_header(&self) -> Vec<&'static str> {
        vec!["current_month", "previous_month", "change_percent", "trend", "average_monthly", "projection"]
    }

    fn csv_rows(&self) -> Vec<Vec<String>> {
        vec![vec![
            format!("{:.2}", self.current_month),
            format!("{:.2}", self.previous_month),
            format!("{:.2}", self.change_percent),
            self.trend.to_string(),
            format!("{:.2}", self.average_monthly),
            format!("{:.2}", self.projection),
        ]]
    }
}

impl Render for CostReport {
    fn table(&self) -> String {
        let mut out = format!("Cost Report - {}\nGenerated: {}\n", self.period, self.generated_at);
        let _ = writeln!(out, "\nTotal Cost: {} {}", money(self.total_cost), self.currency);
        match self.forecast {
            Some(f) => {
                let _ = writeln!(out, "Forecast:   {}", money(f));
            }
            None => {
                let _ = writeln!(out, "Forecast:   unavailable");
            }
        }
        if !self.top_services.is_empty() {
            let _ = writeln!(out, "\nTop Services:");
            for s in &self.top_services {
                let _ = writeln!(out, "  {:<30} {:>12}", format!("{}:", s.service), money(s.cost));
            }
        }
        if !self.monthly_data.is_empty() {
            let _ = writeln!(out, "\nMonthly Costs:");
            for m in &self.monthly_data {
                let _ = writeln!(out, "  {}: {}", m.month, money(m.total_cost));
            }
        }
        out
    }

    fn csv_header(&self) -> Vec<&'static str> {
        vec!["month", "total_cost", "currency"]
    }

    fn csv_rows(&self) -> Vec<Vec<String>> {
        self.monthly_data
            .iter()
            .map(|m| vec![m.month.clone(), format!("{:.2}", m.total_cost), m.currency.clone()])
            .collect()
    }
}

impl Render for AlertCheck {
    fn table(&self) -> String {
        if self.evaluations.is_empty() {
            return "No alerts configured\n".into();
        }
        let mut out = format!("Alert Status - {}\nCurrent costs: {}\n\n", self.period, money(self.total_cost));
        for e in &self.evaluations {
            let _ = writeln!(
                out,
                "{}: {} / {} ({:.1}%) {}",
                e.name,
                money(e.total_cost),
                money(e.threshold),
                e.percent_of_threshold,
                e.status
            );
        }
        if self.any_triggered() {
            let _ = writeln!(out, "\nBudget alerts triggered!");
        }
        out
    }

    fn csv_header(&self) -> Vec<&'static str> {
        vec!["name", "threshold", "total_cost", "percent_of_threshold", "status"]
    }

    fn csv_rows(&self) -> Vec<Vec<String>> {
        self.evaluations
            .iter()
            .map(|e| {
                vec![
                    e.name.clone(),
                    format!("{:.2}", e.threshold),
                    format!("{:.2}", e.total_cost),
                    format!("{:.1}", e.percent_of_threshold),
                    e.status.to_string(),
                ]
            })
            .collect()
    }
}

impl Render for [Alert] {
    fn table(&self) -> String {
        if self.is_empty() {
            return "No alerts configured\n".into();
        }
        let mut out = format!("{:<24} {:>12} {:<38} {}\n", "NAME", "THRESHOLD", "SUBSCRIPTION", "ENABLED");
        for a in self {
            let _ = writeln!(
                out,
                "{:<24} {:>12} {:<38} {}",
                a.name,
                money(a.threshold),
                a.subscription_id,
                if a.enabled { "yes" } else { "no" }
            );
        }
        out
    }

    fn csv_header(&self) -> Vec<&'static str> {
        vec!["name", "threshold", "subscription_id", "enabled"]
    }

    fn csv_rows(&self) -> Vec<Vec<String>> {
        self.iter()
            .map(|a| {
                vec![
                    a.name.clone(),
                    format!("{:.2}", a.threshold),
                    a.subscription_id.clone(),
                    a.enabled.to_string(),
                ]
            })
            .collect()
    }
}

impl Render for BTreeMap<String, String> {
    fn table(&self) -> String {
        if self.is_empty() {
            return "No settings stored\n".into();
        }
        self.iter().map(|(k, v)| format!("{k} = {v}\n")).collect()
    }

    fn csv_header(&self) -> Vec<&'static str> {
        vec!["key", "value"]
    }

    fn csv_rows(&self) -> Vec<Vec<String>> {
        self.iter().map(|(k, v)| vec![k.clone(), v.clone()]).collect()
    }
}
