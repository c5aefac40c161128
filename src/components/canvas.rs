use itertools::Itertools;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::{
    components::{
        bounds::Bounds,
        metadata::MetaValue,
        transforms::{geotransform_to_bounds, geotransform_to_coords, GeoTransform},
    },
    errors::{RasterCanvasError, Result},
};

// Compared lower-cased.
pub const VALID_X_NAMES: &[&str] = &["lon", "longitude", "x"];
pub const VALID_Y_NAMES: &[&str] = &["lat", "latitude", "y"];
pub const VALID_Z_NAMES: &[&str] = &[
    "depth",
    "pressure",
    "height",
    "altitude",
    "elevation",
    "z",
    "level",
    "band",
];
pub const VALID_TIME_NAMES: &[&str] = &["t", "time", "datetime", "date"];

/// Only row-major ravels are produced.
pub const RAVEL_ORDER: &str = "C";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AxisKind {
    X,
    Y,
    Z,
    T,
}

impl AxisKind {
    /// Resolves a dim name through the alias tables.
    pub fn of(dim: &str) -> Option<Self> {
        let dim = dim.to_lowercase();
        let dim = dim.as_str();
        if VALID_X_NAMES.contains(&dim) {
            Some(AxisKind::X)
        } else if VALID_Y_NAMES.contains(&dim) {
            Some(AxisKind::Y)
        } else if VALID_Z_NAMES.contains(&dim) {
            Some(AxisKind::Z)
        } else if VALID_TIME_NAMES.contains(&dim) {
            Some(AxisKind::T)
        } else {
            None
        }
    }

    pub fn is_spatial(&self) -> bool {
        matches!(self, AxisKind::X | AxisKind::Y)
    }
}

/// Extent of a non spatial axis, sampled evenly between its bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisExtent {
    pub bounds: (f64, f64),
    pub size: usize,
}

impl AxisExtent {
    pub fn new(bounds: (f64, f64), size: usize) -> Self {
        Self { bounds, size }
    }

    /// Extent of a stack axis indexed `0..size`.
    pub fn indexed(size: usize) -> Self {
        Self::new((0., size.saturating_sub(1) as f64), size)
    }

    pub fn coords(&self) -> Array1<f64> {
        let (start, end) = self.bounds;
        let size = self.size;
        Array1::from_iter((0..size).map(|idx| {
            if size > 1 {
                start + (end - start) * idx as f64 / (size - 1) as f64
            } else {
                start
            }
        }))
    }
}

/// Immutable description of a sampling grid.
///
/// Any change of grid produces a new canvas. `bounds` is derived from
/// `geo_transform` and the size and is recomputed on every construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CanvasParts")]
pub struct Canvas {
    geo_transform: GeoTransform,
    size_x: usize,
    size_y: usize,
    dims: Vec<String>,
    z: Option<AxisExtent>,
    t: Option<AxisExtent>,
    bounds: Bounds,
}

#[derive(Deserialize)]
struct CanvasParts {
    geo_transform: GeoTransform,
    size_x: usize,
    size_y: usize,
    dims: Vec<String>,
    #[serde(default)]
    z: Option<AxisExtent>,
    #[serde(default)]
    t: Option<AxisExtent>,
}

impl TryFrom<CanvasParts> for Canvas {
    type Error = RasterCanvasError;
    fn try_from(parts: CanvasParts) -> Result<Self> {
        Canvas::new(
            parts.geo_transform,
            parts.size_x,
            parts.size_y,
            parts.dims,
            parts.z,
            parts.t,
        )
    }
}

impl Canvas {
    pub fn new(
        geo_transform: GeoTransform,
        size_x: usize,
        size_y: usize,
        dims: Vec<String>,
        z: Option<AxisExtent>,
        t: Option<AxisExtent>,
    ) -> Result<Self> {
        let kinds = dims
            .iter()
            .map(|dim| {
                AxisKind::of(dim).ok_or_else(|| RasterCanvasError::DimResolution {
                    dim: dim.clone(),
                    available: dims.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let counts = kinds.iter().copied().counts();
        for (kind, name) in [(AxisKind::X, "x"), (AxisKind::Y, "y")] {
            if counts.get(&kind) != Some(&1) {
                return Err(RasterCanvasError::DimResolution {
                    dim: name.to_string(),
                    available: dims,
                });
            }
        }
        for (kind, extent, name) in [(AxisKind::Z, &z, "z"), (AxisKind::T, &t, "t")] {
            let count = counts.get(&kind).copied().unwrap_or(0);
            if count > 1 || (count == 1 && extent.is_none()) {
                return Err(RasterCanvasError::DimResolution {
                    dim: name.to_string(),
                    available: dims,
                });
            }
        }
        let bounds = geotransform_to_bounds(size_x, size_y, &geo_transform);
        Ok(Self {
            geo_transform,
            size_x,
            size_y,
            dims,
            z,
            t,
            bounds,
        })
    }

    /// North-up 2-D grid with dims `("y", "x")`.
    pub fn grid(geo_transform: GeoTransform, size_x: usize, size_y: usize) -> Self {
        let bounds = geotransform_to_bounds(size_x, size_y, &geo_transform);
        Self {
            geo_transform,
            size_x,
            size_y,
            dims: vec!["y".to_string(), "x".to_string()],
            z: None,
            t: None,
            bounds,
        }
    }

    pub fn geo_transform(&self) -> &GeoTransform {
        &self.geo_transform
    }

    pub fn size_x(&self) -> usize {
        self.size_x
    }

    pub fn size_y(&self) -> usize {
        self.size_y
    }

    pub fn dims(&self) -> &[String] {
        &self.dims
    }

    pub fn z(&self) -> Option<&AxisExtent> {
        self.z.as_ref()
    }

    pub fn t(&self) -> Option<&AxisExtent> {
        self.t.as_ref()
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    pub fn ravel_order(&self) -> &'static str {
        RAVEL_ORDER
    }

    /// Extent along `dim`.
    pub fn dim_size(&self, dim: &str) -> Result<usize> {
        let extent = |extent: Option<&AxisExtent>| extent.map(|extent| extent.size);
        match AxisKind::of(dim) {
            Some(AxisKind::X) => Some(self.size_x),
            Some(AxisKind::Y) => Some(self.size_y),
            Some(AxisKind::Z) => extent(self.z()),
            Some(AxisKind::T) => extent(self.t()),
            None => None,
        }
        .filter(|_| self.dims.iter().any(|own| own == dim))
        .ok_or_else(|| RasterCanvasError::DimResolution {
            dim: dim.to_string(),
            available: self.dims.clone(),
        })
    }

    /// Array shape in `dims` order.
    pub fn shape(&self) -> Result<Vec<usize>> {
        self.dims.iter().map(|dim| self.dim_size(dim)).collect()
    }

    pub fn num_cells(&self) -> usize {
        self.shape()
            .map(|shape| shape.iter().product())
            .unwrap_or(self.size_x * self.size_y)
    }

    /// Same grid with axes reordered.
    pub fn with_dims(&self, dims: Vec<String>) -> Result<Self> {
        Self::new(
            self.geo_transform,
            self.size_x,
            self.size_y,
            dims,
            self.z,
            self.t,
        )
    }

    /// Canvas left after reducing away `dim`, `None` once a spatial axis is gone.
    pub fn without_dim(&self, dim: &str) -> Option<Self> {
        let kind = AxisKind::of(dim)?;
        if kind.is_spatial() {
            return None;
        }
        let dims = self.dims.iter().filter(|own| *own != dim).cloned().collect();
        let z = self.z.filter(|_| kind != AxisKind::Z);
        let t = self.t.filter(|_| kind != AxisKind::T);
        Self::new(self.geo_transform, self.size_x, self.size_y, dims, z, t).ok()
    }

    /// Keys [Canvas::to_attrs] writes besides `dims`.
    pub const ATTR_KEYS: [&'static str; 5] =
        ["geo_transform", "bounds", "ravel_order", "buf_xsize", "buf_ysize"];

    /// Attribute entries describing this canvas on a layer.
    pub fn to_attrs(&self) -> Vec<(String, MetaValue)> {
        let bounds = self.bounds;
        vec![
            (
                "geo_transform".to_string(),
                MetaValue::from(self.geo_transform.coefficients().to_vec()),
            ),
            (
                "bounds".to_string(),
                MetaValue::from(vec![bounds.left, bounds.bottom, bounds.right, bounds.top]),
            ),
            ("dims".to_string(), MetaValue::from(self.dims.clone())),
            ("ravel_order".to_string(), MetaValue::from(RAVEL_ORDER)),
            ("buf_xsize".to_string(), MetaValue::from(self.size_x)),
            ("buf_ysize".to_string(), MetaValue::from(self.size_y)),
        ]
    }
}

/// Coordinate arrays keyed by dim name, in dim order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Coords(Vec<(String, Array1<f64>)>);

impl Coords {
    pub fn get(&self, dim: &str) -> Option<&Array1<f64>> {
        self.0
            .iter()
            .find(|(name, _)| name == dim)
            .map(|(_, coords)| coords)
    }

    pub fn dims(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, Array1<f64>)> {
        self.0.iter()
    }

    /// Lengths along `dims`.
    pub fn shape_of(&self, dims: &[String]) -> Result<Vec<usize>> {
        dims.iter()
            .map(|dim| {
                self.get(dim)
                    .map(Array1::len)
                    .ok_or_else(|| RasterCanvasError::DimResolution {
                        dim: dim.clone(),
                        available: self.dims().map(str::to_string).collect(),
                    })
            })
            .collect()
    }
}

impl FromIterator<(String, Array1<f64>)> for Coords {
    fn from_iter<I: IntoIterator<Item = (String, Array1<f64>)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Coordinates for each of the canvas dims.
///
/// `x`/`y` aliases come from the geo transform, `z`/`t` axes are
/// filled evenly between their bounds.
pub fn canvas_to_coords(canvas: &Canvas) -> Result<Coords> {
    let (xs, ys) = geotransform_to_coords(canvas.size_x, canvas.size_y, &canvas.geo_transform);
    let unresolved = |dim: &String| RasterCanvasError::DimResolution {
        dim: dim.clone(),
        available: canvas.dims.clone(),
    };
    canvas
        .dims
        .iter()
        .map(|dim| {
            let coords = match AxisKind::of(dim) {
                Some(AxisKind::X) => xs.clone(),
                Some(AxisKind::Y) => ys.clone(),
                Some(AxisKind::Z) => canvas.z.ok_or_else(|| unresolved(dim))?.coords(),
                Some(AxisKind::T) => canvas.t.ok_or_else(|| unresolved(dim))?.coords(),
                None => return Err(unresolved(dim)),
            };
            Ok((dim.clone(), coords))
        })
        .collect::<Result<Vec<_>>>()
        .map(Coords)
}
