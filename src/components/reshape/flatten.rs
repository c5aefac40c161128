use log::{debug, info};
use ndarray::{Array2, IxDyn};

use crate::{
    components::{
        dataset::{Dataset, FlatDataset, Frame},
        layer::Layer,
        metadata::HasAttrs,
    },
    errors::{RasterCanvasError, Result},
};

/// Ravels every layer into one column of a `(space, layer)` matrix, columns
/// in layer order.
///
/// All layers must share one canvas.
pub fn flatten(dataset: &Dataset) -> Result<FlatDataset> {
    let canvas = dataset.require_shared_canvas()?.cloned();
    let num_cells = dataset
        .layers()
        .first()
        .map(|layer| layer.values().len())
        .unwrap_or(0);
    if let Some(layer) = dataset
        .layers()
        .iter()
        .find(|layer| layer.values().len() != num_cells)
    {
        return Err(RasterCanvasError::ShapeMismatch(format!(
            "layer {:?} has {} cells, expected {num_cells}",
            layer.name(),
            layer.values().len()
        )));
    }
    let mut flat = Array2::zeros((num_cells, dataset.len()));
    for (mut column, layer) in flat.columns_mut().into_iter().zip(dataset.layers()) {
        // logical iteration order is row-major whatever the memory layout
        column
            .iter_mut()
            .zip(layer.values().iter())
            .for_each(|(cell, value)| *cell = *value);
    }
    let old_coords = dataset
        .layers()
        .iter()
        .map(Layer::coords)
        .collect::<Result<Vec<_>>>()?;
    info!(
        "Flattened {} layers into shape {:?}",
        dataset.len(),
        flat.shape()
    );
    Ok(FlatDataset {
        flat,
        layer_order: dataset.layer_order().into_iter().map(str::to_string).collect(),
        canvas,
        old_canvases: dataset.layers().iter().map(|layer| layer.canvas().cloned()).collect(),
        old_dims: dataset.layers().iter().map(|layer| layer.dims().to_vec()).collect(),
        old_coords,
        old_attrs: dataset.layers().iter().map(|layer| layer.attrs().clone()).collect(),
        dropped: None,
        attrs: dataset.attrs().clone(),
    })
}

impl Frame {
    /// Flat form of the frame, unchanged when already flat.
    pub fn flatten(&self) -> Result<FlatDataset> {
        match self {
            Frame::Layers(dataset) => flatten(dataset),
            Frame::Flat(flat) => Ok(flat.clone()),
        }
    }

    /// Layered form of the frame, unchanged when not flat.
    pub fn inverse_flatten(&self) -> Result<Dataset> {
        match self {
            Frame::Layers(dataset) => Ok(dataset.clone()),
            Frame::Flat(flat) => inverse_flatten(flat),
        }
    }
}

/// Full size matrix with dropped rows filled with NaN.
fn restore_rows(flat: &FlatDataset) -> Array2<f64> {
    let Some(dropped) = flat.dropped() else {
        return flat.values().clone();
    };
    let mut restored = Array2::from_elem(
        (dropped.shape_before_drop_na_rows, flat.values().ncols()),
        f64::NAN,
    );
    for (row, original) in flat.values().rows().into_iter().zip(&dropped.retained) {
        restored.row_mut(*original).assign(&row);
    }
    debug!(
        "Restored {} rows to {}",
        dropped.retained.len(),
        dropped.shape_before_drop_na_rows
    );
    restored
}

/// Rebuilds layers from a flat dataset.
///
/// Dropped rows come back as NaN. Layer shapes come from the shared canvas,
/// or from the coordinates recorded at flatten time when it was lost.
pub fn inverse_flatten(flat: &FlatDataset) -> Result<Dataset> {
    let restored = restore_rows(flat);
    let num_layers = restored.ncols().min(flat.old_dims().len());
    let layers = (0..num_layers)
        .map(|idx| {
            let dims = flat.old_dims()[idx].clone();
            let shape = match flat.canvas() {
                Some(canvas) => canvas.with_dims(dims.clone())?.shape()?,
                None => flat.old_coords()[idx].shape_of(&dims)?,
            };
            let values = restored
                .column(idx)
                .to_owned()
                .into_shape_with_order(IxDyn(&shape))?;
            let canvas = match flat.canvas() {
                Some(canvas) => Some(canvas.with_dims(dims.clone())?),
                None => flat.old_canvases().get(idx).cloned().flatten(),
            };
            let attrs = flat.old_attrs().get(idx).cloned().unwrap_or_default();
            Layer::new(&flat.layer_order()[idx], values, dims, canvas, attrs)
        })
        .collect::<Result<Vec<_>>>()?;
    info!("Rebuilt {} layers from shape {:?}", layers.len(), restored.shape());
    Dataset::new(layers, flat.attrs().clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{
        canvas::{AxisExtent, Canvas},
        dataset::tests::{canvas, dataset, layer},
        metadata::{Attrs, HasAttrs, MetaValue},
        transforms::GeoTransform,
    };
    use ndarray::{array, Array};
    use rstest::rstest;

    #[rstest]
    #[case(&["a"])]
    #[case(&["a", "b"])]
    #[case(&["c", "a", "b", "d"])]
    fn round_trip_without_drops(#[case] names: &[&str]) {
        let dataset = dataset(names, 3, 4);
        let flat = flatten(&dataset).unwrap();
        assert_eq!(flat.values().shape(), &[12, names.len()]);
        assert_eq!(flat.layer_order(), names);
        let restored = inverse_flatten(&flat).unwrap();
        assert_eq!(restored, dataset);
    }

    #[test]
    fn columns_are_row_major_ravels() {
        let flat = flatten(&dataset(&["a", "b"], 2, 3)).unwrap();
        assert_eq!(flat.values().column(0).to_vec(), vec![0., 1., 2., 3., 4., 5.]);
        assert_eq!(flat.values()[[4, 1]], 104.);
        assert_eq!(flat.canvas(), Some(&canvas(3, 2)));
        assert_eq!(flat.old_dims()[1], vec!["y".to_string(), "x".to_string()]);
        assert_eq!(flat.old_attrs().len(), 2);
        assert_eq!(flat.old_attrs()[1].attr("source"), Some(&MetaValue::from("b")));
    }

    #[test]
    fn flatten_is_idempotent() {
        let frame = Frame::from(dataset(&["a", "b"], 2, 3));
        let once = frame.flatten().unwrap();
        let twice = Frame::from(once.clone()).flatten().unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn requires_shared_canvas() {
        let mixed = dataset(&["a"], 2, 3)
            .with_layers([layer("b", 3, 2, 0.)])
            .unwrap();
        assert!(matches!(
            flatten(&mixed),
            Err(RasterCanvasError::CanvasMismatch { layer }) if layer == "b"
        ));
    }

    #[test]
    fn round_trip_with_level_axis() {
        let canvas = Canvas::new(
            GeoTransform::new(0., 1., 0., 2., 0., -1.),
            3,
            2,
            vec!["y".to_string(), "level".to_string(), "x".to_string()],
            Some(AxisExtent::indexed(4)),
            None,
        )
        .unwrap();
        let values = Array::from_shape_fn(IxDyn(&[2, 4, 3]), |idx| (idx[0] * 100 + idx[1] * 10 + idx[2]) as f64);
        let stack = Layer::on_canvas("stack", values, canvas, Attrs::default()).unwrap();
        let dataset = Dataset::new(vec![stack], Attrs::default()).unwrap();
        let flat = flatten(&dataset).unwrap();
        assert_eq!(flat.values().shape(), &[24, 1]);
        assert_eq!(flat.values()[[5, 0]], 12.);
        assert_eq!(inverse_flatten(&flat).unwrap(), dataset);
    }

    #[test]
    fn replaced_values_rebuild_from_old_coords() {
        let flat = flatten(&dataset(&["a", "b"], 2, 3)).unwrap();
        let scaled = flat.values().mapv(|value| value * 2.);
        let replaced = flat
            .with_values(scaled, vec!["a2".to_string(), "b2".to_string()])
            .unwrap();
        assert_eq!(replaced.canvas(), None);
        let rebuilt = inverse_flatten(&replaced).unwrap();
        assert_eq!(rebuilt.layer_order(), vec!["a2", "b2"]);
        assert_eq!(
            rebuilt.get("b2").unwrap().values(),
            &array![[200., 202., 204.], [206., 208., 210.]].into_dyn()
        );
        assert_eq!(rebuilt.get("a2").unwrap().canvas(), Some(&canvas(3, 2)));

        let single = flat
            .with_values(Array2::zeros((6, 1)), vec!["first".to_string()])
            .unwrap();
        assert_eq!(inverse_flatten(&single).unwrap().len(), 1);
        assert!(flat.with_values(Array2::zeros((5, 2)), vec!["a".to_string(), "b".to_string()]).is_err());
    }
}
