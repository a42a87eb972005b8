use crate::errors::{CostError, CostResult};
use crate::models::{Alert, AlertEvaluation, AlertStatus};

pub fn validate_threshold(threshold: f64) -> CostResult<()> {
    if !threshold.is_finite() || threshold <= 0.0 {
        return Err(CostError::Configuration(format!(
            "alert threshold must be a positive amount, got {threshold}"
        )));
    }
    Ok(())
}

/// Evaluates every enabled alert against `total_cost`. A total equal to the threshold triggers.
pub fn evaluate(alerts: &[Alert], total_cost: f64) -> Vec<AlertEvaluation> {
    alerts
        .iter()
        .filter(|a| a.enabled)
        .map(|a| AlertEvaluation {
            name: a.name.clone(),
            threshold: a.threshold,
            total_cost,
            percent_of_threshold: total_cost / a.threshold * 100.0,
            status: if total_cost >= a.threshold {
                AlertStatus::Triggered
            } else {
                AlertStatus::Ok
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alert(name: &str, threshold: f64, enabled: bool) -> Alert {
        Alert {
            id: 0,
            name: name.into(),
            threshold,
            subscription_id: "sub-1".into(),
            enabled,
        }
    }

    #[test]
    fn test_threshold_boundary() {
        let alerts = vec![alert("monthly", 100.0, true)];

        let at = evaluate(&alerts, 100.0);
        assert_eq!(at[0].status, AlertStatus::Triggered);
        assert_eq!(at[0].percent_of_threshold, 100.0);

        let below = evaluate(&alerts, 99.99);
        assert_eq!(below[0].status, AlertStatus::Ok);
        assert!(below[0].percent_of_threshold < 100.0);
    }

    #[test]
    fn test_disabled_alerts_are_skipped() {
        let alerts = vec![alert("on", 50.0, true), alert("off", 10.0, false)];
        let evals = evaluate(&alerts, 75.0);
        assert_eq!(evals.len(), 1);
        assert_eq!(evals[0].name, "on");
        assert_eq!(evals[0].percent_of_threshold, 150.0);
    }

    #[test]
    fn test_validate_threshold() {
        assert!(validate_threshold(0.01).is_ok());
        for bad in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(validate_threshold(bad), Err(CostError::Configuration(_))));
        }
    }
}
