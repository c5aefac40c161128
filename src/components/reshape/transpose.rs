use itertools::Itertools;
use log::info;

use crate::{
    components::{dataset::Dataset, layer::Layer},
    errors::{RasterCanvasError, Result},
};

fn transpose_layer(layer: &Layer, dims: &[String]) -> Result<Layer> {
    if dims.len() != layer.dims().len() || !dims.iter().all_unique() {
        return Err(RasterCanvasError::ShapeMismatch(format!(
            "cannot order dims {:?} of layer {:?} as {dims:?}",
            layer.dims(),
            layer.name()
        )));
    }
    let axes = dims
        .iter()
        .map(|dim| layer.axis_of(dim))
        .collect::<Result<Vec<_>>>()?;
    let values = layer
        .values()
        .view()
        .permuted_axes(axes)
        .as_standard_layout()
        .into_owned();
    let canvas = layer
        .canvas()
        .map(|canvas| canvas.with_dims(dims.to_vec()))
        .transpose()?;
    layer.with_values(values, dims.to_vec(), canvas)
}

/// Reorders the axes of every layer, canvases following.
pub fn transpose(dataset: &Dataset, dims: &[String]) -> Result<Dataset> {
    info!("Transposing {:?} to {dims:?}", dataset.layer_order());
    dataset.try_map_layers(|layer| transpose_layer(layer, dims))
}
