use log::info;
use ndarray::Zip;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{
    components::{dataset::Dataset, layer::Layer},
    errors::{RasterCanvasError, Result},
};

/// Cell-wise combination of two layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerOp {
    /// `(a - b) / (a + b)`, e.g. NDVI.
    NormedDiff,
    Diff,
    Sum,
    Ratio,
}

impl LayerOp {
    pub fn apply(&self, a: f64, b: f64) -> f64 {
        match self {
            LayerOp::NormedDiff => (a - b) / (a + b),
            LayerOp::Diff => a - b,
            LayerOp::Sum => a + b,
            LayerOp::Ratio => a / b,
        }
    }
}

/// New layer name mapped to the `(a, b)` layers it is computed from.
pub type LayerOpSpec = BTreeMap<String, (String, String)>;

fn combine(op: LayerOp, name: &str, a: &Layer, b: &Layer) -> Result<Layer> {
    if a.shape() != b.shape() {
        return Err(RasterCanvasError::ShapeMismatch(format!(
            "{:?} has shape {:?} and {:?} has shape {:?}",
            a.name(),
            a.shape(),
            b.name(),
            b.shape()
        )));
    }
    let values = Zip::from(a.values())
        .and(b.values())
        .map_collect(|a, b| op.apply(*a, *b));
    Ok(a
        .with_values(values, a.dims().to_vec(), a.canvas().cloned())?
        .renamed(name))
}

/// Appends one layer per `spec` entry, in name order.
///
/// New layers take the canvas and attrs of their first operand.
pub fn layer_operation(dataset: &Dataset, op: LayerOp, spec: &LayerOpSpec) -> Result<Dataset> {
    let layers = spec
        .iter()
        .map(|(name, (a, b))| combine(op, name, dataset.get(a)?, dataset.get(b)?))
        .collect::<Result<Vec<_>>>()?;
    info!("Added {:?} with {op:?}", spec.keys().collect::<Vec<_>>());
    dataset.with_layers(layers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{dataset::tests::{dataset, layer}, metadata::{HasAttrs, MetaValue}};
    use approx::assert_abs_diff_eq;
    use rstest::rstest;

    fn spec(entries: &[(&str, &str, &str)]) -> LayerOpSpec {
        entries
            .iter()
            .map(|(name, a, b)| (name.to_string(), (a.to_string(), b.to_string())))
            .collect()
    }

    #[rstest]
    #[case(LayerOp::NormedDiff, 3., 1., 0.5)]
    #[case(LayerOp::Diff, 3., 1., 2.)]
    #[case(LayerOp::Sum, 3., 1., 4.)]
    #[case(LayerOp::Ratio, 3., 1., 3.)]
    fn ops(#[case] op: LayerOp, #[case] a: f64, #[case] b: f64, #[case] expected: f64) {
        assert_abs_diff_eq!(op.apply(a, b), expected);
    }

    #[test]
    fn appends_in_name_order() {
        let dataset = dataset(&["red", "nir"], 2, 2);
        let combined = layer_operation(
            &dataset,
            LayerOp::Diff,
            &spec(&[("z_diff", "nir", "red"), ("a_diff", "red", "nir")]),
        )
        .unwrap();
        assert_eq!(combined.layer_order(), vec!["red", "nir", "a_diff", "z_diff"]);
        let z_diff = combined.get("z_diff").unwrap();
        assert!(z_diff.values().iter().all(|value| *value == 100.));
        assert_eq!(z_diff.attr("source"), Some(&MetaValue::from("nir")));
        assert_eq!(z_diff.canvas(), dataset.get("nir").unwrap().canvas());
    }

    #[test]
    fn operands_must_exist_and_match() {
        let dataset = dataset(&["red"], 2, 2);
        assert!(matches!(
            layer_operation(&dataset, LayerOp::Sum, &spec(&[("s", "red", "blue")])),
            Err(RasterCanvasError::MissingLayer(_))
        ));
        let mixed = dataset.with_layers([layer("small", 1, 2, 0.)]).unwrap();
        assert!(matches!(
            layer_operation(&mixed, LayerOp::Sum, &spec(&[("s", "red", "small")])),
            Err(RasterCanvasError::ShapeMismatch(_))
        ));
    }
}
