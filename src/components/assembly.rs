use log::{debug, info};
use ndarray::{ArrayD, Axis};
use num_traits::AsPrimitive;
use serde::{Deserialize, Serialize};

use crate::{
    components::{
        bounds::ReadWindow,
        canvas::{AxisExtent, AxisKind, Canvas},
        grid_header::{take_geo_transform_from_meta, GeoTransformStrategies},
        layer::Layer,
        layer_spec::{selector_name, LayerSelector, LayerSpec},
        metadata::{Attrs, MetaValue, Metadata},
        transforms::GeoTransform,
    },
    errors::{RasterCanvasError, Result},
};

pub const DEFAULT_COORDS_ORDER: [&str; 2] = ["y", "x"];
/// Name given to the stack axis of rank 3 reads.
pub const EXTRA_DIM: &str = "level";

/// Window and output size a reader applied to a read.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ReadParams {
    /// Full (width, height) of the source grid.
    pub native_size: Option<(usize, usize)>,
    pub window: Option<ReadWindow>,
    pub buf_xsize: Option<usize>,
    pub buf_ysize: Option<usize>,
}

impl ReadParams {
    pub fn from_spec(spec: Option<&LayerSpec>, native_size: Option<(usize, usize)>) -> Self {
        Self {
            native_size,
            window: spec.and_then(|spec| spec.window),
            buf_xsize: spec.and_then(|spec| spec.buf_xsize),
            buf_ysize: spec.and_then(|spec| spec.buf_ysize),
        }
    }

    /// Output (width, height) of a read, from the buffer size or the window
    /// or the native size, in that order.
    pub fn output_size(&self) -> Option<(usize, usize)> {
        let window = self.window.map(|window| window.shape());
        let native = self.native_size;
        let width = self
            .buf_xsize
            .or(window.map(|shape| shape.0))
            .or(native.map(|shape| shape.0))?;
        let height = self
            .buf_ysize
            .or(window.map(|shape| shape.1))
            .or(native.map(|shape| shape.1))?;
        Some((width, height))
    }

    fn to_attrs(self) -> Vec<(String, MetaValue)> {
        let mut attrs = Vec::new();
        if let Some(window) = self.window {
            let (rows, cols) = (window.rows(), window.cols());
            attrs.push((
                "window".to_string(),
                MetaValue::List(vec![
                    MetaValue::from(vec![rows.0 as f64, rows.1 as f64]),
                    MetaValue::from(vec![cols.0 as f64, cols.1 as f64]),
                ]),
            ));
        }
        if let Some((width, height)) = self.native_size {
            attrs.push(("width".to_string(), MetaValue::from(width)));
            attrs.push(("height".to_string(), MetaValue::from(height)));
        }
        attrs
    }
}

/// Removes singleton axes while more than two axes remain.
fn squeeze<T>(mut values: ArrayD<T>) -> ArrayD<T> {
    while values.ndim() > 2 {
        match values.shape().iter().position(|size| *size == 1) {
            Some(axis) => values = values.remove_axis(Axis(axis)),
            None => break,
        }
    }
    values
}

/// Dims of an array read with `stored_coords_order`, with a `level` axis at
/// the position of the smallest extent for rank 3 arrays.
fn infer_dims(shape: &[usize], stored_coords_order: &[String]) -> Result<(Vec<String>, Option<usize>)> {
    let y_first = stored_coords_order
        .first()
        .map(|dim| AxisKind::of(dim) == Some(AxisKind::Y))
        .unwrap_or(true);
    let spatial = if y_first { ["y", "x"] } else { ["x", "y"] };
    let mut dims: Vec<String> = spatial.iter().map(|dim| dim.to_string()).collect();
    match shape.len() {
        2 => Ok((dims, None)),
        3 => {
            let extra = shape
                .iter()
                .enumerate()
                .min_by_key(|(_, size)| **size)
                .map(|(axis, _)| axis)
                .unwrap_or(0);
            dims.insert(extra, EXTRA_DIM.to_string());
            Ok((dims, Some(extra)))
        }
        rank => Err(RasterCanvasError::InvalidRank {
            rank,
            shape: shape.to_vec(),
        }),
    }
}

/// Builds a layer from a raw read.
///
/// The transform is the reader's own when given, otherwise it comes from
/// `metadata`. The windowed read rescale is applied here and only here.
pub fn assemble_layer<T: AsPrimitive<f64>>(
    values: ArrayD<T>,
    selector: &LayerSelector,
    read: &ReadParams,
    metadata: &Metadata,
    geo_transform: Option<GeoTransform>,
    strategies: &GeoTransformStrategies,
) -> Result<Layer> {
    let spec = selector.as_ref().left();
    let name = selector_name(selector);
    let values = squeeze(values);
    let stored_coords_order = spec
        .and_then(|spec| spec.stored_coords_order.clone())
        .unwrap_or_else(|| DEFAULT_COORDS_ORDER.iter().map(|dim| dim.to_string()).collect());
    let (dims, extra) = infer_dims(values.shape(), &stored_coords_order)?;
    let size_of = |dim: &str| {
        dims.iter()
            .position(|own| own == dim)
            .map(|axis| values.shape()[axis])
            .unwrap_or(1)
    };
    let (size_x, size_y) = (size_of("x"), size_of("y"));

    let geo_transform = match geo_transform {
        Some(geo_transform) => geo_transform,
        None => take_geo_transform_from_meta(spec, metadata, strategies, true)?.ok_or_else(|| {
            RasterCanvasError::GeoTransformUnresolved(format!("no transform for layer {name:?}"))
        })?,
    };
    let native_size = read
        .native_size
        .or(read.window.map(|window| (window.cols().1, window.rows().1)))
        .unwrap_or((size_x, size_y));
    let geo_transform = geo_transform.for_read(native_size, read.window.as_ref(), (size_x, size_y))?;
    debug!("Layer {name:?} read {read:?} rescaled to {geo_transform:?}");

    let z = extra.map(|axis| AxisExtent::indexed(values.shape()[axis]));
    let canvas = Canvas::new(geo_transform, size_x, size_y, dims, z, None)?;
    let attrs = Attrs::from(metadata.clone()).merged(read.to_attrs());
    info!(
        "Assembled layer {name:?} with dims {:?} and shape {:?}",
        canvas.dims(),
        values.shape()
    );
    Layer::on_canvas(name, values.mapv(|value| value.as_()), canvas, attrs)
}
