//! Exponential-smoothing (ETS) forecast of daily spend using the `augurs` crate.

use augurs::{
    ets::AutoETS,
    forecaster::{transforms::LinearInterpolator, Forecaster},
};
use chrono::NaiveDate;
use thiserror::Error;

pub const MIN_DATA_POINTS: usize = 7;

const CONFIDENCE_LEVEL: f64 = 0.95;

#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("need at least {need} days of cost history for a local forecast, have {have}")]
    InsufficientData { have: usize, need: usize },

    #[error("forecast model error: {0}")]
    Model(String),
}

#[derive(Debug, Clone)]
pub struct ForecastResult {
    pub predicted: Vec<f64>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl ForecastResult {
    /// Predicted spend over the whole horizon. Negative daily points count as zero.
    pub fn total(&self) -> f64 {
        self.predicted.iter().map(|v| v.max(0.0)).sum()
    }

    /// Label from the relative width of the summed prediction interval.
    pub fn confidence_label(&self) -> &'static str {
        let total = self.total();
        if total <= 0.0 {
            return "low";
        }
        let width: f64 = self.upper.iter().zip(&self.lower).map(|(u, l)| u - l).sum();
        match width / total {
            r if r < 0.5 => "high",
            r if r < 1.0 => "medium",
            _ => "low",
        }
    }
}

/// `data` is the historical daily cost series, `horizon` the number of days to predict.
pub fn generate_forecast(data: &[f64], horizon: usize) -> Result<ForecastResult, ForecastError> {
    if data.len() < MIN_DATA_POINTS {
        return Err(ForecastError::InsufficientData {
            have: data.len(),
            need: MIN_DATA_POINTS,
        });
    }

    let ets = AutoETS::non_seasonal();
    let transformers: Vec<Box<dyn augurs::forecaster::Transformer>> =
        vec![Box::new(LinearInterpolator::default())];
    let mut forecaster = Forecaster::new(ets).with_transformers(transformers);

    forecaster
        .fit(data)
        .map_err(|e| ForecastError::Model(format!("ETS fit error: {e}")))?;
    let forecast = forecaster
        .predict(horizon, CONFIDENCE_LEVEL)
        .map_err(|e| ForecastError::Model(format!("ETS predict error: {e}")))?;

    let point = forecast.point.clone();
    let (lower, upper) = match forecast.intervals {
        Some(intervals) => (intervals.lower, intervals.upper),
        None => (
            point.iter().map(|v| v * 0.85).collect(),
            point.iter().map(|v| v * 1.15).collect(),
        ),
    };

    Ok(ForecastResult {
        predicted: point,
        lower,
        upper,
    })
}

/// Dense daily series over `[start, end)`, with days missing from `points` set to zero.
pub fn fill_daily_gaps(points: &[(NaiveDate, f64)], start: NaiveDate, end: NaiveDate) -> Vec<f64> {
    let days = (end - start).num_days().max(0) as usize;
    let mut series = vec![0.0; days];
    for (date, cost) in points {
        let offset = (*date - start).num_days();
        if offset >= 0 && (offset as usize) < days {
            series[offset as usize] += cost;
        }
    }
    series
}

/// First stored day inside the window, so empty leading history is not fed to the model.
pub fn history_start(points: &[(NaiveDate, f64)], window_start: NaiveDate) -> NaiveDate {
    points
        .iter()
        .map(|(d, _)| *d)
        .min()
        .filter(|d| *d > window_start)
        .unwrap_or(window_start)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_forecast_basic() {
        let data: Vec<f64> = (0..30).map(|i| 100.0 + (i as f64 * 0.5)).collect();

        let result = generate_forecast(&data, 7).unwrap();
        assert_eq!(result.predicted.len(), 7);
        assert_eq!(result.lower.len(), 7);
        assert_eq!(result.upper.len(), 7);
        assert!(result.total() > 0.0);
    }

    #[test]
    fn test_forecast_needs_a_week_of_data() {
        let err = generate_forecast(&[1.0, 2.0, 3.0], 30).unwrap_err();
        assert!(matches!(err, ForecastError::InsufficientData { have: 3, need: 7 }));
    }

    #[test]
    fn test_confidence_label_from_interval_width() {
        let tight = ForecastResult {
            predicted: vec![10.0; 10],
            lower: vec![9.0; 10],
            upper: vec![11.0; 10],
        };
        assert_eq!(tight.confidence_label(), "high");

        let loose = ForecastResult {
            predicted: vec![10.0; 10],
            lower: vec![0.0; 10],
            upper: vec![25.0; 10],
        };
        assert_eq!(loose.confidence_label(), "low");

        let empty = ForecastResult {
            predicted: vec![-1.0],
            lower: vec![-2.0],
            upper: vec![0.0],
        };
        assert_eq!(empty.total(), 0.0);
        assert_eq!(empty.confidence_label(), "low");
    }

    #[test]
    fn test_fill_daily_gaps() {
        let points = vec![(d("2024-01-01"), 5.0), (d("2024-01-03"), 2.0), (d("2024-02-01"), 9.0)];
        let series = fill_daily_gaps(&points, d("2024-01-01"), d("2024-01-05"));
        assert_eq!(series, vec![5.0, 0.0, 2.0, 0.0]);
    }

    #[test]
    fn test_history_start_skips_empty_lead() {
        let points = vec![(d("2024-03-10"), 1.0), (d("2024-03-12"), 1.0)];
        assert_eq!(history_start(&points, d("2024-01-01")), d("2024-03-10"));
        assert_eq!(history_start(&[], d("2024-01-01")), d("2024-01-01"));
    }
}
