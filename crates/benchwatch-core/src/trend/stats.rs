// Copyright 2025 Benchwatch Project
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// ABOUTME: Elementary statistics over metric series: OLS, moving averages,
// anomalies, change points, forecasts, autocorrelation

use benchwatch_types::{
    Anomaly, AnomalySeverity, ChangePoint, ChangePointType, Forecast, ForecastPoint,
    ForecastValidation, MovingAveragePoint, TrendPoint, TrendStatistics,
};

/// Sliding-window width for change-point detection.
pub const CHANGE_POINT_WINDOW: usize = 10;

/// Maximum autocorrelation lag reported.
pub const MAX_AUTOCORRELATION_LAG: usize = 10;

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Coefficient of variation; zero for a zero mean.
pub fn volatility(values: &[f64]) -> f64 {
    let m = mean(values);
    if m.abs() < f64::EPSILON {
        return 0.0;
    }
    (std_dev(values) / m).abs()
}

/// Ordinary least squares in index space: (slope, intercept, R²).
///
/// A constant series has zero total variance; R² is 0 by convention and the
/// heuristic significance flag stays unset.
pub fn linear_regression(values: &[f64]) -> (f64, f64, f64) {
    let n = values.len();
    if n < 2 {
        return (0.0, values.first().copied().unwrap_or(0.0), 0.0);
    }

    let n_f = n as f64;
    let x_mean = (n_f - 1.0) / 2.0;
    let y_mean = mean(values);

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        sxy += dx * (y - y_mean);
        sxx += dx * dx;
    }
    if sxx == 0.0 {
        return (0.0, y_mean, 0.0);
    }

    let slope = sxy / sxx;
    let intercept = y_mean - slope * x_mean;

    let ss_tot: f64 = values.iter().map(|y| (y - y_mean).powi(2)).sum();
    if ss_tot == 0.0 {
        return (0.0, y_mean, 0.0);
    }
    let ss_res: f64 = values
        .iter()
        .enumerate()
        .map(|(i, y)| (y - (intercept + slope * i as f64)).powi(2))
        .sum();

    let r_squared = (1.0 - ss_res / ss_tot).clamp(0.0, 1.0);
    (slope, intercept, r_squared)
}

/// Full fit plus dispersion statistics for a series.
pub fn compute_statistics(values: &[f64]) -> TrendStatistics {
    let (slope, intercept, r_squared) = linear_regression(values);
    let vol = volatility(values);
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    TrendStatistics {
        slope,
        intercept,
        r_squared,
        p_value_heuristic: 1.0 - r_squared,
        heuristic_significant: r_squared > 0.5,
        volatility: vol,
        mean: mean(values),
        std_dev: std_dev(values),
        min: if min.is_finite() { min } else { 0.0 },
        max: if max.is_finite() { max } else { 0.0 },
        equation: format!("y = {slope:.4}x + {intercept:.4}"),
    }
}

/// Moving average of window `w` with local deviation and ±2σ bounds.
/// Undefined (empty) for series shorter than the window.
pub fn moving_average(points: &[TrendPoint], window: usize) -> Vec<MovingAveragePoint> {
    if window == 0 || points.len() < window {
        return Vec::new();
    }
    let values: Vec<f64> = points.iter().map(|p| p.value).collect();

    (window - 1..points.len())
        .map(|i| {
            let slice = &values[i + 1 - window..=i];
            let local_mean = mean(slice);
            let local_std = std_dev(slice);
            MovingAveragePoint {
                index: points[i].index,
                timestamp: points[i].timestamp,
                moving_avg: local_mean,
                deviation: values[i] - local_mean,
                upper_bound: local_mean + 2.0 * local_std,
                lower_bound: local_mean - 2.0 * local_std,
            }
        })
        .collect()
}

/// Z-score anomalies versus the whole-series mean.
///
/// `sensitivity` is the flagging threshold in σ; severity escalates at
/// 1.5× and 2× that threshold.
pub fn detect_anomalies(points: &[TrendPoint], sensitivity: f64) -> Vec<Anomaly> {
    let values: Vec<f64> = points.iter().map(|p| p.value).collect();
    let m = mean(&values);
    let sd = std_dev(&values);
    if sd == 0.0 {
        return Vec::new();
    }

    points
        .iter()
        .filter_map(|point| {
            let z = ((point.value - m) / sd).abs();
            if z <= sensitivity {
                return None;
            }
            let severity = if z >= 2.0 * sensitivity {
                AnomalySeverity::Severe
            } else if z >= 1.5 * sensitivity {
                AnomalySeverity::Moderate
            } else {
                AnomalySeverity::Mild
            };
            Some(Anomaly {
                index: point.index,
                timestamp: point.timestamp,
                value: point.value,
                deviation_score: z,
                severity,
            })
        })
        .collect()
}

/// Level change points: pre/post windows of `CHANGE_POINT_WINDOW` samples
/// whose means differ by more than twice the pooled standard deviation.
pub fn detect_change_points(points: &[TrendPoint]) -> Vec<ChangePoint> {
    let window = CHANGE_POINT_WINDOW;
    if points.len() < 2 * window {
        return Vec::new();
    }
    let values: Vec<f64> = points.iter().map(|p| p.value).collect();

    let mut change_points = Vec::new();
    let mut i = window;
    while i + window <= values.len() {
        let pre = &values[i - window..i];
        let post = &values[i..i + window];
        let pre_mean = mean(pre);
        let post_mean = mean(post);
        let pooled = ((std_dev(pre).powi(2) + std_dev(post).powi(2)) / 2.0).sqrt();

        let delta = (post_mean - pre_mean).abs();
        if pooled > 0.0 && delta > 2.0 * pooled {
            let magnitude_pct = if pre_mean.abs() < f64::EPSILON {
                0.0
            } else {
                (post_mean - pre_mean) / pre_mean * 100.0
            };
            change_points.push(ChangePoint {
                index: points[i].index,
                timestamp: points[i].timestamp,
                change_type: ChangePointType::Level,
                magnitude_pct,
                confidence: (delta / (4.0 * pooled)).min(1.0),
            });
            // Skip past this shift; adjacent windows would re-report it.
            i += window;
        } else {
            i += 1;
        }
    }
    change_points
}

/// Project the regression line `horizon` points forward.
///
/// The prediction interval is 1.96·residual σ with the classical leverage
/// correction; validation metrics cover the training window.
pub fn forecast(values: &[f64], horizon: usize) -> Option<Forecast> {
    let n = values.len();
    if n < 3 || horizon == 0 {
        return None;
    }
    let (slope, intercept, _) = linear_regression(values);

    let n_f = n as f64;
    let x_mean = (n_f - 1.0) / 2.0;
    let sxx: f64 = (0..n).map(|i| (i as f64 - x_mean).powi(2)).sum();

    let residuals: Vec<f64> = values
        .iter()
        .enumerate()
        .map(|(i, y)| y - (intercept + slope * i as f64))
        .collect();
    let residual_var = residuals.iter().map(|r| r * r).sum::<f64>() / (n_f - 2.0);
    let residual_std = residual_var.sqrt();

    let points = (0..horizon)
        .map(|k| {
            let x = (n + k) as f64;
            let predicted = intercept + slope * x;
            let leverage = (1.0 + 1.0 / n_f + (x - x_mean).powi(2) / sxx).sqrt();
            let margin = 1.96 * residual_std * leverage;
            ForecastPoint {
                index: n + k,
                predicted,
                lower_bound: predicted - margin,
                upper_bound: predicted + margin,
            }
        })
        .collect();

    let mae = residuals.iter().map(|r| r.abs()).sum::<f64>() / n_f;
    let rmse = (residuals.iter().map(|r| r * r).sum::<f64>() / n_f).sqrt();
    let mape = {
        let terms: Vec<f64> = values
            .iter()
            .zip(&residuals)
            .filter(|(y, _)| y.abs() > f64::EPSILON)
            .map(|(y, r)| (r / y).abs())
            .collect();
        if terms.is_empty() {
            0.0
        } else {
            mean(&terms) * 100.0
        }
    };

    Some(Forecast {
        points,
        validation: ForecastValidation { mae, rmse, mape },
    })
}

/// Lag-1..k autocorrelation normalized by lag 0, clipped to [-1, 1].
pub fn autocorrelation(values: &[f64], max_lag: usize) -> Vec<f64> {
    let n = values.len();
    if n < 2 {
        return Vec::new();
    }
    let m = mean(values);
    let c0: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    if c0 == 0.0 {
        return Vec::new();
    }

    let max_lag = max_lag.min(n - 1);
    (1..=max_lag)
        .map(|lag| {
            let ck: f64 = (0..n - lag)
                .map(|t| (values[t] - m) * (values[t + lag] - m))
                .sum();
            (ck / c0).clamp(-1.0, 1.0)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn points_from(values: &[f64]) -> Vec<TrendPoint> {
        let start = Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(index, value)| TrendPoint {
                index,
                timestamp: start + Duration::hours(index as i64),
                run_id: format!("run-{index}"),
                value: *value,
            })
            .collect()
    }

    #[test]
    fn test_linear_regression_perfect_line() {
        // y = -5x + 200: the improving-latency series from 200 down to 155.
        let values: Vec<f64> = (0..10).map(|i| 200.0 - 5.0 * i as f64).collect();
        let (slope, intercept, r_squared) = linear_regression(&values);
        assert!((slope + 5.0).abs() < 1e-9);
        assert!((intercept - 200.0).abs() < 1e-9);
        assert!((r_squared - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_constant_series_convention() {
        let values = vec![42.0; 12];
        let (slope, _, r_squared) = linear_regression(&values);
        assert_eq!(slope, 0.0);
        assert_eq!(r_squared, 0.0);
        let stats = compute_statistics(&values);
        assert!(!stats.heuristic_significant);
        assert_eq!(stats.volatility, 0.0);
    }

    #[test]
    fn test_volatility_is_cv() {
        let values = vec![10.0, 12.0, 8.0, 10.0];
        let expected = std_dev(&values) / 10.0;
        assert!((volatility(&values) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_moving_average_window() {
        let points = points_from(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let ma = moving_average(&points, 3);
        assert_eq!(ma.len(), 3);
        assert!((ma[0].moving_avg - 2.0).abs() < 1e-9);
        assert!((ma[2].moving_avg - 4.0).abs() < 1e-9);
        assert!((ma[2].deviation - 1.0).abs() < 1e-9);
        assert!(ma[0].upper_bound > ma[0].moving_avg);

        // Shorter than the window: undefined.
        assert!(moving_average(&points[..2], 3).is_empty());
    }

    #[test]
    fn test_anomaly_injection_scenario() {
        // 20 samples around 150 with one spike at index 10.
        let mut values = vec![150.0; 20];
        values[10] = 1000.0;
        let points = points_from(&values);

        let anomalies = detect_anomalies(&points, 2.0);
        assert_eq!(anomalies.len(), 1);
        let spike = &anomalies[0];
        assert_eq!(spike.index, 10);
        assert!(spike.deviation_score > 2.0);
        assert!(spike.severity >= AnomalySeverity::Moderate);
    }

    #[test]
    fn test_no_anomalies_in_flat_series() {
        let points = points_from(&[5.0; 15]);
        assert!(detect_anomalies(&points, 2.0).is_empty());
    }

    #[test]
    fn test_change_point_on_level_shift() {
        // 15 samples near 100 then 15 near 200, with mild jitter so the
        // pooled deviation is nonzero.
        let mut values = Vec::new();
        for i in 0..15 {
            values.push(100.0 + (i % 3) as f64);
        }
        for i in 0..15 {
            values.push(200.0 + (i % 3) as f64);
        }
        let points = points_from(&values);

        let change_points = detect_change_points(&points);
        assert_eq!(change_points.len(), 1);
        let cp = &change_points[0];
        assert_eq!(cp.change_type, ChangePointType::Level);
        assert!(cp.index >= 10 && cp.index <= 20);
        assert!(cp.magnitude_pct > 50.0);
        assert!(cp.confidence > 0.5);
        assert!(cp.confidence <= 1.0);
    }

    #[test]
    fn test_no_change_point_in_short_series() {
        let points = points_from(&[1.0; 15]);
        assert!(detect_change_points(&points).is_empty());
    }

    #[test]
    fn test_forecast_projects_trend() {
        let values: Vec<f64> = (0..12).map(|i| 100.0 + 2.0 * i as f64).collect();
        let forecast = forecast(&values, 3).unwrap();
        assert_eq!(forecast.points.len(), 3);
        // Next point continues the line: 100 + 2*12 = 124.
        assert!((forecast.points[0].predicted - 124.0).abs() < 1e-6);
        assert!(forecast.points[0].lower_bound <= forecast.points[0].predicted);
        assert!(forecast.points[0].upper_bound >= forecast.points[0].predicted);
        // A perfect fit validates perfectly.
        assert!(forecast.validation.mae < 1e-9);
        assert!(forecast.validation.rmse < 1e-9);
    }

    #[test]
    fn test_forecast_intervals_widen_with_horizon() {
        let values: Vec<f64> = (0..20)
            .map(|i| 100.0 + 2.0 * i as f64 + if i % 2 == 0 { 3.0 } else { -3.0 })
            .collect();
        let forecast = forecast(&values, 5).unwrap();
        let width =
            |p: &ForecastPoint| p.upper_bound - p.lower_bound;
        assert!(width(&forecast.points[4]) > width(&forecast.points[0]));
    }

    #[test]
    fn test_autocorrelation_bounds_and_lags() {
        let values: Vec<f64> = (0..30).map(|i| (i as f64 * 0.7).sin() * 10.0).collect();
        let acf = autocorrelation(&values, MAX_AUTOCORRELATION_LAG);
        assert_eq!(acf.len(), MAX_AUTOCORRELATION_LAG);
        assert!(acf.iter().all(|r| (-1.0..=1.0).contains(r)));
        // Lag 1 of a smooth series is strongly positive.
        assert!(acf[0] > 0.5);
    }

    #[test]
    fn test_autocorrelation_of_constant_series_is_empty() {
        assert!(autocorrelation(&[7.0; 20], 10).is_empty());
    }
}
