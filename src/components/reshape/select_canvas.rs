use itertools::Itertools;
use log::{debug, info, warn};
use ndarray::{Array1, ArrayD, Axis};

use crate::{
    components::{
        canvas::{canvas_to_coords, Canvas},
        dataset::Dataset,
        layer::Layer,
    },
    errors::{RasterCanvasError, Result},
};

fn direction(coords: &[f64]) -> Option<bool> {
    let ascending = coords.windows(2).all(|pair| pair[0] <= pair[1]);
    let descending = coords.windows(2).all(|pair| pair[0] >= pair[1]);
    match (ascending, descending) {
        (true, _) => Some(true),
        (false, true) => Some(false),
        (false, false) => None,
    }
}

/// Position in `source` nearest to each of `target`, the lower position on ties.
fn nearest_indices(source: &Array1<f64>, target: &Array1<f64>) -> Result<Vec<usize>> {
    let source = source.to_vec();
    if source.is_empty() {
        return Err(RasterCanvasError::ShapeMismatch(
            "cannot resample from an empty axis".to_string(),
        ));
    }
    let distance = |idx: usize, value: f64| (source[idx] - value).abs();
    let closer = |lower: usize, upper: usize, value: f64| {
        if distance(upper, value) < distance(lower, value) {
            upper
        } else {
            lower
        }
    };
    let direction = direction(&source);
    Ok(target
        .iter()
        .map(|value| {
            let value = *value;
            let split = match direction {
                Some(true) => source.partition_point(|coord| *coord < value),
                Some(false) => source.partition_point(|coord| *coord > value),
                None => {
                    return (0..source.len())
                        .min_by(|lhs, rhs| distance(*lhs, value).total_cmp(&distance(*rhs, value)))
                        .unwrap_or(0)
                }
            };
            match split {
                0 => 0,
                split if split == source.len() => split - 1,
                split => closer(split - 1, split, value),
            }
        })
        .collect())
}

fn resample_layer(layer: &Layer, canvas: &Canvas) -> Result<Layer> {
    let own = layer.canvas().ok_or_else(|| RasterCanvasError::MissingCanvas {
        layer: layer.name().to_string(),
    })?;
    let missing = canvas
        .dims()
        .iter()
        .filter(|dim| !layer.dims().contains(*dim))
        .chain(layer.dims().iter().filter(|dim| !canvas.dims().contains(*dim)))
        .next();
    if let Some(dim) = missing {
        return Err(RasterCanvasError::DimResolution {
            dim: dim.clone(),
            available: layer.dims().to_vec(),
        });
    }
    if !own.bounds().overlaps(canvas.bounds()) {
        warn!(
            "Layer {:?} bounds {:?} do not overlap the target {:?}",
            layer.name(),
            own.bounds(),
            canvas.bounds()
        );
    }
    let source = layer.coords()?;
    let target = canvas_to_coords(canvas)?;
    let axes = canvas
        .dims()
        .iter()
        .map(|dim| layer.axis_of(dim))
        .collect::<Result<Vec<_>>>()?;
    let mut values: ArrayD<f64> = layer.values().view().permuted_axes(axes).to_owned();
    for (axis, (dim, coords)) in target.iter().enumerate() {
        let source_coords = source.get(dim).ok_or_else(|| RasterCanvasError::DimResolution {
            dim: dim.clone(),
            available: source.dims().map(str::to_string).collect(),
        })?;
        let indices = nearest_indices(source_coords, coords)?;
        values = values.select(Axis(axis), &indices);
    }
    debug!(
        "Resampled {:?} from {:?} to {:?}",
        layer.name(),
        layer.shape(),
        values.shape()
    );
    layer.with_values(values, canvas.dims().to_vec(), Some(canvas.clone()))
}

/// Puts every layer on `canvas` by nearest neighbour lookup.
///
/// Layers already on `canvas` are kept as they are.
pub fn select_canvas(dataset: &Dataset, canvas: &Canvas) -> Result<Dataset> {
    let resampled = dataset
        .layers()
        .iter()
        .filter(|layer| layer.canvas() != Some(canvas))
        .map(Layer::name)
        .collect_vec();
    info!("Resampling layers {resampled:?} to {:?}", canvas.bounds());
    dataset.try_map_layers(|layer| match layer.canvas() {
        Some(own) if own == canvas => Ok(layer.clone()),
        _ => resample_layer(layer, canvas),
    })
}

/// [select_canvas] onto the canvas of the named layer.
pub fn select_canvas_of(dataset: &Dataset, layer: &str) -> Result<Dataset> {
    let canvas = dataset
        .get(layer)?
        .canvas()
        .cloned()
        .ok_or_else(|| RasterCanvasError::MissingCanvas {
            layer: layer.to_string(),
        })?;
    select_canvas(dataset, &canvas)
}
