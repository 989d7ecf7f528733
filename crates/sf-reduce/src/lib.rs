#![forbid(unsafe_code)]

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use sf_types::{NullKind, Scalar, TypeError};
use thiserror::Error;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ReducerId {
    Sum,
    Mean,
    Min,
    Max,
    Count,
    Range,
    First,
    Last,
    FirstNotNull,
    LastNotNull,
    DistinctCount,
    Variance,
    StdDev,
}

/// Descriptor surfaced to hosts that let users pick reducers by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReducerInfo {
    pub id: ReducerId,
    pub name: &'static str,
    pub description: &'static str,
}

const REGISTRY: &[ReducerInfo] = &[
    ReducerInfo {
        id: ReducerId::Sum,
        name: "Total",
        description: "Sum of all non-missing values",
    },
    ReducerInfo {
        id: ReducerId::Mean,
        name: "Mean",
        description: "Average of all non-missing values",
    },
    ReducerInfo {
        id: ReducerId::Min,
        name: "Min",
        description: "Smallest value",
    },
    ReducerInfo {
        id: ReducerId::Max,
        name: "Max",
        description: "Largest value",
    },
    ReducerInfo {
        id: ReducerId::Count,
        name: "Count",
        description: "Number of non-missing values",
    },
    ReducerInfo {
        id: ReducerId::Range,
        name: "Range",
        description: "Difference between largest and smallest value",
    },
    ReducerInfo {
        id: ReducerId::First,
        name: "First",
        description: "First value",
    },
    ReducerInfo {
        id: ReducerId::Last,
        name: "Last",
        description: "Last value",
    },
    ReducerInfo {
        id: ReducerId::FirstNotNull,
        name: "First (not null)",
        description: "First non-missing value",
    },
    ReducerInfo {
        id: ReducerId::LastNotNull,
        name: "Last (not null)",
        description: "Last non-missing value",
    },
    ReducerInfo {
        id: ReducerId::DistinctCount,
        name: "Distinct count",
        description: "Number of distinct non-missing values",
    },
    ReducerInfo {
        id: ReducerId::Variance,
        name: "Variance",
        description: "Population variance of non-missing values",
    },
    ReducerInfo {
        id: ReducerId::StdDev,
        name: "StdDev",
        description: "Population standard deviation of non-missing values",
    },
];

#[must_use]
pub fn reducers() -> &'static [ReducerInfo] {
    REGISTRY
}

#[must_use]
pub fn info(id: ReducerId) -> &'static ReducerInfo {
    REGISTRY
        .iter()
        .find(|entry| entry.id == id)
        .expect("registry lists every reducer id")
}

/// Descriptors for the requested ids, in request order.
#[must_use]
pub fn list(ids: &[ReducerId]) -> Vec<&'static ReducerInfo> {
    ids.iter().map(|id| info(*id)).collect()
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ReduceError {
    #[error(transparent)]
    Type(#[from] TypeError),
}

/// Compute every requested reducer over `values`.
///
/// Numeric reducers skip missing values and fail on non-numeric input;
/// `first`/`last` return the literal boundary value. Duplicate ids are
/// computed once.
pub fn reduce(
    values: &[Scalar],
    ids: &[ReducerId],
) -> Result<BTreeMap<ReducerId, Scalar>, ReduceError> {
    let mut out = BTreeMap::new();
    for &id in ids {
        if out.contains_key(&id) {
            continue;
        }
        out.insert(id, compute(id, values)?);
    }
    Ok(out)
}

fn compute(id: ReducerId, values: &[Scalar]) -> Result<Scalar, ReduceError> {
    let out = match id {
        ReducerId::Count => {
            let count = values.iter().filter(|value| !value.is_missing()).count();
            Scalar::Int64(count as i64)
        }
        ReducerId::DistinctCount => {
            let distinct: HashSet<ValueKey<'_>> = values
                .iter()
                .filter(|value| !value.is_missing())
                .filter_map(ValueKey::from_scalar)
                .collect();
            Scalar::Int64(distinct.len() as i64)
        }
        ReducerId::First => values.first().cloned().unwrap_or(Scalar::Null(NullKind::Null)),
        ReducerId::Last => values.last().cloned().unwrap_or(Scalar::Null(NullKind::Null)),
        ReducerId::FirstNotNull => values
            .iter()
            .find(|value| !value.is_missing())
            .cloned()
            .unwrap_or(Scalar::Null(NullKind::Null)),
        ReducerId::LastNotNull => values
            .iter()
            .rev()
            .find(|value| !value.is_missing())
            .cloned()
            .unwrap_or(Scalar::Null(NullKind::Null)),
        ReducerId::Sum
        | ReducerId::Mean
        | ReducerId::Min
        | ReducerId::Max
        | ReducerId::Range
        | ReducerId::Variance
        | ReducerId::StdDev => numeric_stat(id, &numeric_sample(values)?),
    };
    Ok(out)
}

fn numeric_sample(values: &[Scalar]) -> Result<Vec<f64>, ReduceError> {
    let mut sample = Vec::with_capacity(values.len());
    for value in values {
        if value.is_missing() {
            continue;
        }
        sample.push(value.to_f64()?);
    }
    Ok(sample)
}

fn numeric_stat(id: ReducerId, sample: &[f64]) -> Scalar {
    if sample.is_empty() {
        // Sum of nothing is zero; everything else has no defined value.
        return match id {
            ReducerId::Sum => Scalar::Float64(0.0),
            _ => Scalar::Null(NullKind::NaN),
        };
    }

    let len = sample.len() as f64;
    let sum: f64 = sample.iter().sum();
    let min = sample.iter().copied().fold(f64::INFINITY, f64::min);
    let max = sample.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mean = sum / len;
    let variance = sample.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / len;

    let value = match id {
        ReducerId::Sum => sum,
        ReducerId::Mean => mean,
        ReducerId::Min => min,
        ReducerId::Max => max,
        ReducerId::Range => max - min,
        ReducerId::Variance => variance,
        ReducerId::StdDev => variance.sqrt(),
        _ => return Scalar::Null(NullKind::NaN),
    };

    Scalar::Float64(value)
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
enum ValueKey<'a> {
    Bool(bool),
    Int64(i64),
    FloatBits(u64),
    Utf8(&'a str),
    Time(i64),
}

impl<'a> ValueKey<'a> {
    fn from_scalar(value: &'a Scalar) -> Option<Self> {
        match value {
            Scalar::Bool(v) => Some(Self::Bool(*v)),
            Scalar::Int64(v) => Some(Self::Int64(*v)),
            Scalar::Float64(v) => Some(Self::FloatBits(v.to_bits())),
            Scalar::Utf8(v) => Some(Self::Utf8(v.as_str())),
            Scalar::Time(v) => Some(Self::Time(*v)),
            Scalar::Null(_) => None,
        }
    }
}
