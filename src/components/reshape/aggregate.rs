use itertools::Itertools;
use log::info;
use ndarray::{ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};

use crate::{
    components::{dataset::Dataset, layer::Layer},
    errors::{RasterCanvasError, Result},
};

/// Reductions available to [aggregate]. NaN values are skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggFunc {
    All,
    Any,
    Argmax,
    Argmin,
    Max,
    Mean,
    Median,
    Min,
    Prod,
    Sum,
    Std,
    Var,
}

impl AggFunc {
    pub const ALL: [AggFunc; 12] = [
        AggFunc::All,
        AggFunc::Any,
        AggFunc::Argmax,
        AggFunc::Argmin,
        AggFunc::Max,
        AggFunc::Mean,
        AggFunc::Median,
        AggFunc::Min,
        AggFunc::Prod,
        AggFunc::Sum,
        AggFunc::Std,
        AggFunc::Var,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            AggFunc::All => "all",
            AggFunc::Any => "any",
            AggFunc::Argmax => "argmax",
            AggFunc::Argmin => "argmin",
            AggFunc::Max => "max",
            AggFunc::Mean => "mean",
            AggFunc::Median => "median",
            AggFunc::Min => "min",
            AggFunc::Prod => "prod",
            AggFunc::Sum => "sum",
            AggFunc::Std => "std",
            AggFunc::Var => "var",
        }
    }

    /// Reduces one lane.
    pub fn reduce(&self, lane: ArrayView1<f64>) -> f64 {
        let valid = lane.iter().copied().filter(|value| !value.is_nan()).collect_vec();
        let count = valid.len() as f64;
        let mean = || valid.iter().sum::<f64>() / count;
        let variance = || {
            let mean = mean();
            valid.iter().map(|value| (value - mean).powi(2)).sum::<f64>() / count
        };
        let position = |ordering: std::cmp::Ordering| {
            lane.iter()
                .enumerate()
                .filter(|(_, value)| !value.is_nan())
                .fold(None, |best: Option<(usize, f64)>, (idx, value)| match best {
                    Some((_, current)) if value.total_cmp(&current) != ordering => best,
                    _ => Some((idx, *value)),
                })
                .map(|(idx, _)| idx as f64)
                .unwrap_or(f64::NAN)
        };
        let flag = |truth: bool| if truth { 1. } else { 0. };
        if valid.is_empty() {
            return match self {
                AggFunc::Sum => 0.,
                AggFunc::Prod => 1.,
                AggFunc::All => flag(lane.iter().all(|value| *value != 0.)),
                AggFunc::Any => flag(lane.iter().any(|value| *value != 0.)),
                _ => f64::NAN,
            };
        }
        match self {
            AggFunc::All => flag(lane.iter().all(|value| *value != 0.)),
            AggFunc::Any => flag(lane.iter().any(|value| *value != 0.)),
            AggFunc::Argmax => position(std::cmp::Ordering::Greater),
            AggFunc::Argmin => position(std::cmp::Ordering::Less),
            AggFunc::Max => valid.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            AggFunc::Min => valid.iter().copied().fold(f64::INFINITY, f64::min),
            AggFunc::Mean => mean(),
            AggFunc::Median => {
                let sorted = valid.iter().copied().sorted_by(f64::total_cmp).collect_vec();
                let mid = sorted.len() / 2;
                if sorted.len() % 2 == 0 {
                    (sorted[mid - 1] + sorted[mid]) / 2.
                } else {
                    sorted[mid]
                }
            }
            AggFunc::Prod => valid.iter().product(),
            AggFunc::Sum => valid.iter().sum(),
            AggFunc::Std => variance().sqrt(),
            AggFunc::Var => variance(),
        }
    }
}

impl Display for AggFunc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AggFunc {
    type Err = RasterCanvasError;
    fn from_str(s: &str) -> Result<Self> {
        AggFunc::ALL
            .into_iter()
            .find(|func| func.name() == s)
            .ok_or_else(|| RasterCanvasError::UnknownAggregation(s.to_string()))
    }
}

/// Axis to reduce, by dim name or by index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Along {
    Dim(String),
    Axis(usize),
}

impl Along {
    fn resolve(&self, layer: &Layer) -> Result<usize> {
        match self {
            Along::Dim(dim) => layer.axis_of(dim),
            Along::Axis(axis) if *axis < layer.dims().len() => Ok(*axis),
            Along::Axis(axis) => Err(RasterCanvasError::DimResolution {
                dim: format!("axis {axis}"),
                available: layer.dims().to_vec(),
            }),
        }
    }
}

/// Reduces every layer along the same axis.
///
/// A canvas survives the loss of a z or time axis, not of a spatial one.
pub fn aggregate(dataset: &Dataset, func: AggFunc, along: &Along) -> Result<Dataset> {
    let axes = dataset
        .layers()
        .iter()
        .map(|layer| along.resolve(layer))
        .collect::<Result<Vec<_>>>()?;
    let axis = match axes.iter().all_equal_value() {
        Ok(axis) => *axis,
        Err(None) => return Ok(dataset.clone()),
        Err(Some(_)) => {
            return Err(RasterCanvasError::ShapeMismatch(format!(
                "{along:?} resolves to axes {axes:?} across layers {:?}",
                dataset.layer_order()
            )))
        }
    };
    info!("Aggregating {:?} with {func} along axis {axis}", dataset.layer_order());
    dataset.try_map_layers(|layer| {
        let values = layer.values().map_axis(Axis(axis), |lane| func.reduce(lane));
        let removed = &layer.dims()[axis];
        let dims = layer
            .dims()
            .iter()
            .filter(|dim| *dim != removed)
            .cloned()
            .collect();
        let canvas = layer.canvas().and_then(|canvas| canvas.without_dim(removed));
        layer.with_values(values, dims, canvas)
    })
}
