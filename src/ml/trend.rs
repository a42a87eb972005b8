//! Month-over-month trend classification.

use crate::models::{TrendAnalysis, TrendDirection};

/// Percentage change from `previous` to `current`, with the zero-baseline cases pinned:
/// growth from nothing reports 100, nothing to nothing reports 0.
pub fn change_percent(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        if current > 0.0 {
            100.0
        } else {
            0.0
        }
    } else {
        (current - previous) / previous * 100.0
    }
}

/// Changes inside `[-band, band]` are stable.
pub fn classify(change: f64, band: f64) -> TrendDirection {
    if change > band {
        TrendDirection::Increasing
    } else if change < -band {
        TrendDirection::Decreasing
    } else {
        TrendDirection::Stable
    }
}

/// `monthly_totals` holds one entry per month that has data; empty months are not averaged in.
pub fn analyze(current: f64, previous: f64, monthly_totals: &[f64], band: f64) -> TrendAnalysis {
    let change = change_percent(current, previous);
    let average_monthly = if monthly_totals.is_empty() {
        0.0
    } else {
        monthly_totals.iter().sum::<f64>() / monthly_totals.len() as f64
    };

    TrendAnalysis {
        current_month: current,
        previous_month: previous,
        change_percent: change,
        trend: classify(change, band),
        average_monthly,
        projection: (current + (current - previous)).max(0.0),
    }
}
