//! Statistic kernels for windowed aggregation
//!
//! Every kernel rejects empty input with [`Error::Computation`]; the
//! geometric and harmonic means also reject non-positive values. Variance and
//! standard deviation are population statistics.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Statistic computed over the values of one window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StatisticOperation {
    ArithmeticMean,
    GeometricMean,
    HarmonicMean,
    Max,
    Median,
    Min,
    Mode,
    RootMeanSquare,
    StandardDeviation,
    Sum,
    Variance,
}

impl StatisticOperation {
    pub const ALL: [StatisticOperation; 11] = [
        StatisticOperation::ArithmeticMean,
        StatisticOperation::GeometricMean,
        StatisticOperation::HarmonicMean,
        StatisticOperation::Max,
        StatisticOperation::Median,
        StatisticOperation::Min,
        StatisticOperation::Mode,
        StatisticOperation::RootMeanSquare,
        StatisticOperation::StandardDeviation,
        StatisticOperation::Sum,
        StatisticOperation::Variance,
    ];

    /// Name as used in requests
    pub fn as_str(&self) -> &'static str {
        match self {
            StatisticOperation::ArithmeticMean => "arithmeticMean",
            StatisticOperation::GeometricMean => "geometricMean",
            StatisticOperation::HarmonicMean => "harmonicMean",
            StatisticOperation::Max => "max",
            StatisticOperation::Median => "median",
            StatisticOperation::Min => "min",
            StatisticOperation::Mode => "mode",
            StatisticOperation::RootMeanSquare => "rootMeanSquare",
            StatisticOperation::StandardDeviation => "standardDeviation",
            StatisticOperation::Sum => "sum",
            StatisticOperation::Variance => "variance",
        }
    }

    /// Compute the statistic over `values`
    pub fn compute(&self, values: &[f64]) -> Result<f64> {
        if values.is_empty() {
            return Err(Error::computation(format!(
                "{} of an empty window is undefined",
                self.as_str()
            )));
        }

        let count = values.len() as f64;

        let result = match self {
            StatisticOperation::ArithmeticMean => mean(values),
            StatisticOperation::GeometricMean => {
                require_positive(*self, values)?;
                (values.iter().map(|v| v.ln()).sum::<f64>() / count).exp()
            }
            StatisticOperation::HarmonicMean => {
                require_positive(*self, values)?;
                count / values.iter().map(|v| 1.0 / v).sum::<f64>()
            }
            StatisticOperation::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            StatisticOperation::Median => median(values).unwrap_or(f64::NAN),
            StatisticOperation::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            StatisticOperation::Mode => mode(values),
            StatisticOperation::RootMeanSquare => {
                (values.iter().map(|v| v * v).sum::<f64>() / count).sqrt()
            }
            StatisticOperation::StandardDeviation => variance(values).sqrt(),
            StatisticOperation::Sum => values.iter().sum(),
            StatisticOperation::Variance => variance(values),
        };

        if !result.is_finite() {
            return Err(Error::computation(format!(
                "{} is not finite for the given values",
                self.as_str()
            )));
        }

        Ok(result)
    }
}

impl FromStr for StatisticOperation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        StatisticOperation::ALL
            .into_iter()
            .find(|operation| operation.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                Error::configuration(format!(
                    "Unknown operation '{s}'. Valid operations: {}",
                    StatisticOperation::ALL.map(|op| op.as_str()).join(", ")
                ))
            })
    }
}

impl fmt::Display for StatisticOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Median of `values`, `None` when empty
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn variance(values: &[f64]) -> f64 {
    let mean = mean(values);
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64
}

/// Most frequent value; ties go to the smallest
fn mode(values: &[f64]) -> f64 {
    let mut counts: BTreeMap<u64, (f64, usize)> = BTreeMap::new();
    for value in values {
        counts.entry(value.to_bits()).or_insert((*value, 0)).1 += 1;
    }

    counts
        .into_values()
        .fold(None::<(f64, usize)>, |best, (value, count)| match best {
            Some((best_value, best_count))
                if best_count > count || (best_count == count && best_value <= value) =>
            {
                Some((best_value, best_count))
            }
            _ => Some((value, count)),
        })
        .map(|(value, _)| value)
        .unwrap_or(f64::NAN)
}

fn require_positive(operation: StatisticOperation, values: &[f64]) -> Result<()> {
    match values.iter().find(|v| **v <= 0.0) {
        Some(value) => Err(Error::computation(format!(
            "{operation} requires positive values, got {value}"
        ))),
        None => Ok(()),
    }
}
