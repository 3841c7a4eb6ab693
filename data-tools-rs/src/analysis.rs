//! Analysis operations over tabular data.
//!
//! These are the derived-value computations the pipeline's analysis stage
//! runs: threshold counts, earliest-match lookups, Pearson correlation and
//! least-squares regression slope. All are pure functions of the table; the
//! caller decides what to do when they fail.

use serde_json::{json, Value};

use crate::error::{Result, ToolError};
use crate::table::TabularData;

/// Correlation and slope values are reported to this many decimals
const REPORT_DECIMALS: i32 = 6;

/// One analysis operation, fully parameterized
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOp {
    /// Count rows where `value_column > threshold`, optionally restricted to
    /// rows where `year_column < before_year`
    CountOver {
        value_column: String,
        threshold: f64,
        year_column: Option<String>,
        before_year: Option<f64>,
    },
    /// The `label_column` of the lowest-`order_column` row whose
    /// `value_column` exceeds `threshold`
    EarliestOver {
        value_column: String,
        threshold: f64,
        label_column: String,
        order_column: String,
    },
    /// Pearson correlation coefficient between two numeric columns
    Correlation { x: String, y: String },
    /// Least-squares regression slope of y on x
    RegressionSlope { x: String, y: String },
    /// Total number of rows in the table
    RowCount,
}

/// Run one operation against a table.
pub fn run_operation(data: &TabularData, op: &AnalysisOp) -> Result<Value> {
    if data.is_empty() {
        return Err(ToolError::empty_data("table has no rows"));
    }
    match op {
        AnalysisOp::CountOver {
            value_column,
            threshold,
            year_column,
            before_year,
        } => {
            let values = data.numeric_column(value_column)?;
            let years = match year_column {
                Some(col) => Some(data.numeric_column(col)?),
                None => None,
            };
            let count = values
                .iter()
                .enumerate()
                .filter(|(i, v)| {
                    let over = v.map(|v| v > *threshold).unwrap_or(false);
                    let in_window = match (&years, before_year) {
                        (Some(years), Some(cutoff)) => years
                            .get(*i)
                            .and_then(|y| *y)
                            .map(|y| y < *cutoff)
                            .unwrap_or(false),
                        _ => true,
                    };
                    over && in_window
                })
                .count();
            Ok(json!(count))
        }
        AnalysisOp::EarliestOver {
            value_column,
            threshold,
            label_column,
            order_column,
        } => {
            let values = data.numeric_column(value_column)?;
            let order = data.numeric_column(order_column)?;
            let earliest = values
                .iter()
                .zip(order.iter())
                .enumerate()
                .filter_map(|(i, (v, o))| match (v, o) {
                    (Some(v), Some(o)) if *v > *threshold => Some((i, *o)),
                    _ => None,
                })
                .min_by(|a, b| a.1.total_cmp(&b.1));
            match earliest {
                Some((row, _)) => {
                    let label = data
                        .text_cell(row, label_column)
                        .ok_or_else(|| ToolError::parsing(format!("no column named {:?}", label_column)))?;
                    Ok(json!(label))
                }
                None => Err(ToolError::empty_data(format!(
                    "no row has {} > {}",
                    value_column, threshold
                ))),
            }
        }
        AnalysisOp::Correlation { x, y } => {
            let pairs = data.paired_numeric(x, y)?;
            Ok(json!(round_report(pearson(&pairs)?)))
        }
        AnalysisOp::RegressionSlope { x, y } => {
            let pairs = data.paired_numeric(x, y)?;
            Ok(json!(round_report(slope(&pairs)?)))
        }
        AnalysisOp::RowCount => Ok(json!(data.len())),
    }
}

/// Pearson correlation coefficient over (x, y) pairs.
pub fn pearson(pairs: &[(f64, f64)]) -> Result<f64> {
    if pairs.len() < 2 {
        return Err(ToolError::empty_data("correlation needs at least 2 points"));
    }
    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    let denom = (var_x * var_y).sqrt();
    if denom == 0.0 {
        return Err(ToolError::empty_data("zero variance in correlation input"));
    }
    Ok(cov / denom)
}

/// Least-squares slope of y on x.
pub fn slope(pairs: &[(f64, f64)]) -> Result<f64> {
    if pairs.len() < 2 {
        return Err(ToolError::empty_data("regression needs at least 2 points"));
    }
    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let mut cov = 0.0;
    let mut var_x = 0.0;
    for (x, y) in pairs {
        let dx = x - mean_x;
        cov += dx * (y - mean_y);
        var_x += dx * dx;
    }
    if var_x == 0.0 {
        return Err(ToolError::empty_data("zero variance in regression input"));
    }
    Ok(cov / var_x)
}

fn round_report(value: f64) -> f64 {
    let factor = 10f64.powi(REPORT_DECIMALS);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn films() -> TabularData {
        let mut t = TabularData::new(vec![
            "Rank".into(),
            "Peak".into(),
            "Title".into(),
            "Worldwide gross".into(),
            "Year".into(),
        ]);
        let rows = [
            (1, 1, "Avatar", 2.923, 2009),
            (2, 1, "Avengers: Endgame", 2.798, 2019),
            (3, 2, "Titanic", 2.257, 1997),
            (4, 5, "Star Wars: The Force Awakens", 2.071, 2015),
            (5, 3, "Jurassic World", 1.672, 2015),
        ];
        for (rank, peak, title, gross, year) in rows {
            t.push_row(vec![
                json!(rank),
                json!(peak),
                json!(title),
                json!(gross),
                json!(year),
            ])
            .unwrap();
        }
        t
    }

    #[test]
    fn count_over_with_year_window() {
        let op = AnalysisOp::CountOver {
            value_column: "Worldwide gross".into(),
            threshold: 2.0,
            year_column: Some("Year".into()),
            before_year: Some(2000.0),
        };
        assert_eq!(run_operation(&films(), &op).unwrap(), json!(1));
    }

    #[test]
    fn earliest_over_returns_label_of_lowest_year() {
        let op = AnalysisOp::EarliestOver {
            value_column: "Worldwide gross".into(),
            threshold: 1.5,
            label_column: "Title".into(),
            order_column: "Year".into(),
        };
        assert_eq!(run_operation(&films(), &op).unwrap(), json!("Titanic"));
    }

    #[test]
    fn perfect_linear_data_correlates_to_one() {
        let pairs = vec![(1.0, 2.0), (2.0, 4.0), (3.0, 6.0)];
        let r = pearson(&pairs).unwrap();
        assert!((r - 1.0).abs() < 1e-9);
    }

    #[test]
    fn known_slope_is_recovered() {
        // y = 3x + 1
        let pairs = vec![(0.0, 1.0), (1.0, 4.0), (2.0, 7.0), (3.0, 10.0)];
        let m = slope(&pairs).unwrap();
        assert!((m - 3.0).abs() < 1e-9);
    }

    #[test]
    fn zero_variance_is_an_error_not_a_nan() {
        let pairs = vec![(1.0, 5.0), (1.0, 6.0)];
        assert!(pearson(&pairs).is_err());
        assert!(slope(&pairs).is_err());
    }

    #[test]
    fn empty_table_is_rejected() {
        let t = TabularData::new(vec!["x".into()]);
        assert!(run_operation(&t, &AnalysisOp::RowCount).is_err());
    }

    #[test]
    fn operations_are_deterministic_across_runs() {
        let op = AnalysisOp::Correlation {
            x: "Rank".into(),
            y: "Peak".into(),
        };
        let first = run_operation(&films(), &op).unwrap();
        let second = run_operation(&films(), &op).unwrap();
        assert_eq!(first, second);
    }
}
