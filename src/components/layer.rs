use ndarray::{Array1, ArrayD};

use crate::{
    components::{
        canvas::{canvas_to_coords, Canvas, Coords},
        metadata::{ambassador_impl_HasAttrs, Attrs, HasAttrs, MetaValue},
    },
    errors::{RasterCanvasError, Result},
};

/// A named grid of values with its canvas and source attributes.
///
/// When a canvas is present its dims and shape agree with the array.
#[derive(ambassador::Delegate, Debug, Clone, PartialEq)]
#[delegate(HasAttrs, target = "attrs")]
pub struct Layer {
    name: String,
    values: ArrayD<f64>,
    dims: Vec<String>,
    canvas: Option<Canvas>,
    attrs: Attrs,
}

impl Layer {
    pub fn new(
        name: &str,
        values: ArrayD<f64>,
        dims: Vec<String>,
        canvas: Option<Canvas>,
        attrs: Attrs,
    ) -> Result<Self> {
        if values.ndim() != dims.len() {
            return Err(RasterCanvasError::ShapeMismatch(format!(
                "layer {name:?} has shape {:?} but dims {dims:?}",
                values.shape()
            )));
        }
        if let Some(canvas) = &canvas {
            if canvas.dims() != dims.as_slice() || canvas.shape()? != values.shape() {
                return Err(RasterCanvasError::ShapeMismatch(format!(
                    "layer {name:?} with dims {dims:?} and shape {:?} does not fit canvas dims {:?}",
                    values.shape(),
                    canvas.dims()
                )));
            }
        }
        Ok(Self {
            name: name.to_string(),
            values,
            dims,
            canvas,
            attrs,
        })
    }

    /// Layer on `canvas`, dims taken from the canvas and canvas attributes
    /// recorded in attrs.
    pub fn on_canvas(name: &str, values: ArrayD<f64>, canvas: Canvas, attrs: Attrs) -> Result<Self> {
        let attrs = attrs.merged(canvas.to_attrs());
        Self::new(name, values, canvas.dims().to_vec(), Some(canvas), attrs)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &ArrayD<f64> {
        &self.values
    }

    pub fn dims(&self) -> &[String] {
        &self.dims
    }

    pub fn canvas(&self) -> Option<&Canvas> {
        self.canvas.as_ref()
    }

    pub fn shape(&self) -> &[usize] {
        self.values.shape()
    }

    pub fn axis_of(&self, dim: &str) -> Result<usize> {
        self.dims
            .iter()
            .position(|own| own == dim)
            .ok_or_else(|| RasterCanvasError::DimResolution {
                dim: dim.to_string(),
                available: self.dims.clone(),
            })
    }

    /// Coordinates from the canvas, or positional indices without one.
    pub fn coords(&self) -> Result<Coords> {
        match &self.canvas {
            Some(canvas) => canvas_to_coords(canvas),
            None => Ok(Coords::from_iter(self.dims.iter().zip(self.shape()).map(
                |(dim, size)| (dim.clone(), Array1::range(0., *size as f64, 1.)),
            ))),
        }
    }

    pub fn renamed(self, name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..self
        }
    }

    /// Same layer with new values, dims and canvas, attrs carried over.
    ///
    /// Canvas describing attributes are refreshed or dropped with the canvas.
    pub fn with_values(
        &self,
        values: ArrayD<f64>,
        dims: Vec<String>,
        canvas: Option<Canvas>,
    ) -> Result<Self> {
        let attrs = match &canvas {
            Some(canvas) => self.attrs.merged(canvas.to_attrs()),
            None => self
                .attrs
                .without(&Canvas::ATTR_KEYS)
                .merged([("dims".to_string(), MetaValue::from(dims.clone()))]),
        };
        Self::new(&self.name, values, dims, canvas, attrs)
    }

    pub fn with_attrs(self, attrs: Attrs) -> Self {
        Self { attrs, ..self }
    }

    pub fn into_values(self) -> ArrayD<f64> {
        self.values
    }
}
