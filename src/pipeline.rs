use log::{debug, info};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{
    components::{
        dataset::{FlatDataset, Frame},
        layer_ops::{layer_operation, LayerOp, LayerOpSpec},
        reshape::{aggregate, drop_na_rows_with, select_canvas_of, transpose, AggFunc, Along, DropHow},
    },
    errors::{RasterCanvasError, Result},
};

/// Features with optional row aligned targets and weights.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub x: Frame,
    pub y: Option<Array1<f64>>,
    pub sample_weight: Option<Array1<f64>>,
}

fn check_aligned(flat: &FlatDataset, name: &str, vector: Option<&Array1<f64>>) -> Result<()> {
    match vector {
        Some(vector) if vector.len() != flat.num_rows() => Err(RasterCanvasError::ShapeMismatch(
            format!("{name} has {} rows, x has {}", vector.len(), flat.num_rows()),
        )),
        _ => Ok(()),
    }
}

impl Sample {
    pub fn new(x: impl Into<Frame>) -> Self {
        Self {
            x: x.into(),
            y: None,
            sample_weight: None,
        }
    }

    pub fn with_y(self, y: Array1<f64>) -> Self {
        Self { y: Some(y), ..self }
    }

    pub fn with_sample_weight(self, sample_weight: Array1<f64>) -> Self {
        Self {
            sample_weight: Some(sample_weight),
            ..self
        }
    }

    fn with_x(self, x: impl Into<Frame>) -> Self {
        Self { x: x.into(), ..self }
    }

    /// Matrix of `x` (flattened when needed) with the targets and weights.
    pub fn into_matrix(self) -> Result<(Array2<f64>, Option<Array1<f64>>, Option<Array1<f64>>)> {
        let flat = self.x.flatten()?;
        check_aligned(&flat, "y", self.y.as_ref())?;
        check_aligned(&flat, "sample_weight", self.sample_weight.as_ref())?;
        Ok((flat.flat, self.y, self.sample_weight))
    }
}

/// Caller supplied sample transform.
pub type SampleStep = fn(Sample) -> Result<Sample>;

/// Named [SampleStep]s for [ReshapeStep::ModifySample].
#[derive(Debug, Clone, Default)]
pub struct StepRegistry(BTreeMap<String, SampleStep>);

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, name: &str, step: SampleStep) -> Self {
        self.0.insert(name.to_string(), step);
        self
    }

    pub fn get(&self, name: &str) -> Result<SampleStep> {
        self.0
            .get(name)
            .copied()
            .ok_or_else(|| RasterCanvasError::UnknownStep(name.to_string()))
    }
}

/// One step of a [Pipeline].
///
/// Steps over layers invert a flat frame first, [ReshapeStep::DropNaRows]
/// flattens a layered one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum ReshapeStep {
    SelectCanvas {
        layer: String,
    },
    Flatten,
    DropNaRows {
        #[serde(default)]
        how: DropHow,
    },
    InverseFlatten,
    Transpose {
        dims: Vec<String>,
    },
    Agg {
        func: AggFunc,
        along: Along,
    },
    LayerOp {
        op: LayerOp,
        spec: LayerOpSpec,
    },
    ModifySample {
        name: String,
    },
}

impl ReshapeStep {
    pub fn apply(&self, sample: Sample, registry: &StepRegistry) -> Result<Sample> {
        match self {
            ReshapeStep::SelectCanvas { layer } => {
                let dataset = select_canvas_of(&sample.x.inverse_flatten()?, layer)?;
                Ok(sample.with_x(dataset))
            }
            ReshapeStep::Flatten => {
                let flat = sample.x.flatten()?;
                Ok(sample.with_x(flat))
            }
            ReshapeStep::DropNaRows { how } => {
                let flat = sample.x.flatten()?;
                let aligned = [sample.y.as_ref(), sample.sample_weight.as_ref()];
                let (flat, sliced) =
                    drop_na_rows_with(&flat, *how, &aligned.iter().flatten().copied().collect::<Vec<_>>())?;
                let mut sliced = sliced.into_iter();
                let y = sample.y.as_ref().and_then(|_| sliced.next());
                let sample_weight = sample.sample_weight.as_ref().and_then(|_| sliced.next());
                Ok(Sample {
                    x: flat.into(),
                    y,
                    sample_weight,
                })
            }
            ReshapeStep::InverseFlatten => {
                let dataset = sample.x.inverse_flatten()?;
                Ok(sample.with_x(dataset))
            }
            ReshapeStep::Transpose { dims } => {
                let dataset = transpose(&sample.x.inverse_flatten()?, dims)?;
                Ok(sample.with_x(dataset))
            }
            ReshapeStep::Agg { func, along } => {
                let dataset = aggregate(&sample.x.inverse_flatten()?, *func, along)?;
                Ok(sample.with_x(dataset))
            }
            ReshapeStep::LayerOp { op, spec } => {
                let dataset = layer_operation(&sample.x.inverse_flatten()?, *op, spec)?;
                Ok(sample.with_x(dataset))
            }
            ReshapeStep::ModifySample { name } => registry.get(name)?(sample),
        }
    }
}

/// Ordered [ReshapeStep]s threaded over a [Sample].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pipeline {
    pub steps: Vec<ReshapeStep>,
}

impl Pipeline {
    pub fn new(steps: Vec<ReshapeStep>) -> Self {
        Self { steps }
    }

    pub fn run(&self, sample: Sample, registry: &StepRegistry) -> Result<Sample> {
        info!("Running {} steps", self.steps.len());
        self.steps.iter().enumerate().try_fold(sample, |sample, (idx, step)| {
            debug!("Step {idx}: {step:?}");
            step.apply(sample, registry)
        })
    }
}
