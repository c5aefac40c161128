use itertools::Itertools;
use ndarray::{Array2, Axis};

use crate::{
    components::{
        canvas::{Canvas, Coords},
        layer::Layer,
        metadata::{ambassador_impl_HasAttrs, Attrs, HasAttrs},
    },
    errors::{RasterCanvasError, Result},
};

/// Name of the single layer of a flat dataset.
pub const FLAT_NAME: &str = "flat";
pub const FLAT_DIMS: [&str; 2] = ["space", "layer"];

/// Ordered collection of named layers.
///
/// Layer order is the order of the inner vector, names are unique.
#[derive(ambassador::Delegate, Debug, Clone, PartialEq, Default)]
#[delegate(HasAttrs, target = "attrs")]
pub struct Dataset {
    layers: Vec<Layer>,
    attrs: Attrs,
}

impl Dataset {
    pub fn new(layers: Vec<Layer>, attrs: Attrs) -> Result<Self> {
        if let Some(name) = layers.iter().map(Layer::name).duplicates().next() {
            return Err(RasterCanvasError::DuplicateLayer(name.to_string()));
        }
        Ok(Self { layers, attrs })
    }

    pub fn layer_order(&self) -> Vec<&str> {
        self.layers.iter().map(Layer::name).collect()
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn get(&self, name: &str) -> Result<&Layer> {
        self.layers
            .iter()
            .find(|layer| layer.name() == name)
            .ok_or_else(|| RasterCanvasError::MissingLayer(name.to_string()))
    }

    /// Canvas shared by every layer, if they all agree.
    pub fn canvas(&self) -> Option<&Canvas> {
        let first = self.layers.first()?.canvas()?;
        self.layers
            .iter()
            .all(|layer| layer.canvas() == Some(first))
            .then_some(first)
    }

    /// The shared canvas, or the first layer not on the first layer's canvas.
    pub fn require_shared_canvas(&self) -> Result<Option<&Canvas>> {
        let Some(first) = self.layers.first() else {
            return Ok(None);
        };
        match self
            .layers
            .iter()
            .find(|layer| layer.canvas() != first.canvas())
        {
            Some(layer) => Err(RasterCanvasError::CanvasMismatch {
                layer: layer.name().to_string(),
            }),
            None => Ok(first.canvas()),
        }
    }

    /// New dataset with every layer mapped, attrs kept.
    pub fn try_map_layers<F>(&self, f: F) -> Result<Self>
    where
        F: Fn(&Layer) -> Result<Layer>,
    {
        Self::new(
            self.layers.iter().map(f).collect::<Result<Vec<_>>>()?,
            self.attrs.clone(),
        )
    }

    /// New dataset with `layers` appended.
    pub fn with_layers(&self, layers: impl IntoIterator<Item = Layer>) -> Result<Self> {
        Self::new(
            self.layers.iter().cloned().chain(layers).collect(),
            self.attrs.clone(),
        )
    }

    pub fn with_attrs(self, attrs: Attrs) -> Self {
        Self { attrs, ..self }
    }

    pub fn into_layers(self) -> Vec<Layer> {
        self.layers
    }
}

/// Rows removed by row dropping, against the row count before any drop.
#[derive(Debug, Clone, PartialEq)]
pub struct DroppedRows {
    pub shape_before_drop_na_rows: usize,
    pub retained: Vec<usize>,
}

/// Layers raveled into one `(space, layer)` matrix, with what is needed to
/// rebuild them.
#[derive(ambassador::Delegate, Debug, Clone, PartialEq)]
#[delegate(HasAttrs, target = "attrs")]
pub struct FlatDataset {
    pub(crate) flat: Array2<f64>,
    pub(crate) layer_order: Vec<String>,
    pub(crate) canvas: Option<Canvas>,
    pub(crate) old_canvases: Vec<Option<Canvas>>,
    pub(crate) old_dims: Vec<Vec<String>>,
    pub(crate) old_coords: Vec<Coords>,
    pub(crate) old_attrs: Vec<Attrs>,
    pub(crate) dropped: Option<DroppedRows>,
    pub(crate) attrs: Attrs,
}

impl FlatDataset {
    pub fn values(&self) -> &Array2<f64> {
        &self.flat
    }

    pub fn layer_order(&self) -> &[String] {
        &self.layer_order
    }

    pub fn canvas(&self) -> Option<&Canvas> {
        self.canvas.as_ref()
    }

    pub fn old_canvases(&self) -> &[Option<Canvas>] {
        &self.old_canvases
    }

    pub fn old_dims(&self) -> &[Vec<String>] {
        &self.old_dims
    }

    pub fn old_coords(&self) -> &[Coords] {
        &self.old_coords
    }

    pub fn old_attrs(&self) -> &[Attrs] {
        &self.old_attrs
    }

    pub fn dropped(&self) -> Option<&DroppedRows> {
        self.dropped.as_ref()
    }

    pub fn num_rows(&self) -> usize {
        self.flat.len_of(Axis(0))
    }

    /// Same provenance over a new matrix of the same row count, as left by a
    /// column transform. The shared canvas is not kept.
    pub fn with_values(&self, values: Array2<f64>, layer_order: Vec<String>) -> Result<Self> {
        if values.nrows() != self.num_rows() || values.ncols() != layer_order.len() {
            return Err(RasterCanvasError::ShapeMismatch(format!(
                "expected {} rows and {} named columns, found shape {:?}",
                self.num_rows(),
                layer_order.len(),
                values.shape()
            )));
        }
        Ok(Self {
            flat: values,
            layer_order,
            canvas: None,
            ..self.clone()
        })
    }

    /// The matrix as a single layer named `flat`.
    pub fn to_layer(&self) -> Result<Layer> {
        Layer::new(
            FLAT_NAME,
            self.flat.clone().into_dyn(),
            FLAT_DIMS.iter().map(|dim| dim.to_string()).collect(),
            None,
            self.attrs.clone(),
        )
    }
}

/// Either side of the flatten boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Layers(Dataset),
    Flat(FlatDataset),
}

impl Frame {
    pub fn is_flat(&self) -> bool {
        matches!(self, Frame::Flat(_))
    }

    pub fn check_is_flat(&self) -> Result<&FlatDataset> {
        match self {
            Frame::Flat(flat) => Ok(flat),
            Frame::Layers(_) => Err(RasterCanvasError::NotFlat),
        }
    }
}

impl From<Dataset> for Frame {
    fn from(value: Dataset) -> Self {
        Frame::Layers(value)
    }
}

impl From<FlatDataset> for Frame {
    fn from(value: FlatDataset) -> Self {
        Frame::Flat(value)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::components::{metadata::MetaValue, transforms::GeoTransform};
    use ndarray::{Array, ArrayD, IxDyn};

    pub(crate) fn canvas(size_x: usize, size_y: usize) -> Canvas {
        Canvas::grid(GeoTransform::new(-180., 1., 0., 90., 0., -1.), size_x, size_y)
    }

    /// Layer on a `(rows, cols)` grid filled with `offset + cell index`.
    pub(crate) fn layer(name: &str, rows: usize, cols: usize, offset: f64) -> Layer {
        let values: ArrayD<f64> =
            Array::from_shape_fn(IxDyn(&[rows, cols]), |idx| offset + (idx[0] * cols + idx[1]) as f64);
        let attrs = Attrs::default().merged([("source".to_string(), MetaValue::from(name))]);
        Layer::on_canvas(name, values, canvas(cols, rows), attrs).unwrap()
    }

    pub(crate) fn dataset(names: &[&str], rows: usize, cols: usize) -> Dataset {
        Dataset::new(
            names
                .iter()
                .enumerate()
                .map(|(idx, name)| layer(name, rows, cols, 100. * idx as f64))
                .collect(),
            Attrs::default(),
        )
        .unwrap()
    }

    #[test]
    fn order_and_lookup() {
        let dataset = dataset(&["b", "a", "c"], 2, 3);
        assert_eq!(dataset.layer_order(), vec!["b", "a", "c"]);
        assert_eq!(dataset.get("a").unwrap().values()[[1, 2]], 105.);
        assert!(matches!(dataset.get("z"), Err(RasterCanvasError::MissingLayer(_))));
        assert_eq!(dataset.canvas(), Some(&canvas(3, 2)));
    }

    #[test]
    fn duplicate_names_rejected() {
        let layers = vec![layer("a", 2, 2, 0.), layer("a", 2, 2, 1.)];
        assert!(matches!(
            Dataset::new(layers, Attrs::default()),
            Err(RasterCanvasError::DuplicateLayer(_))
        ));
    }

    #[test]
    fn mismatched_canvas_is_reported() {
        let dataset = dataset(&["a"], 2, 3)
            .with_layers([layer("small", 1, 3, 0.)])
            .unwrap();
        assert_eq!(dataset.canvas(), None);
        assert!(matches!(
            dataset.require_shared_canvas(),
            Err(RasterCanvasError::CanvasMismatch { layer }) if layer == "small"
        ));
    }

    #[test]
    fn frame_flatness() {
        let frame = Frame::from(dataset(&["a"], 2, 2));
        assert!(!frame.is_flat());
        assert!(matches!(frame.check_is_flat(), Err(RasterCanvasError::NotFlat)));
        let flat = Frame::from(frame.flatten().unwrap());
        assert!(flat.is_flat());
        let layer = flat.check_is_flat().unwrap().to_layer().unwrap();
        assert_eq!(layer.name(), FLAT_NAME);
        assert_eq!(layer.dims(), &FLAT_DIMS);
        assert_eq!(layer.shape(), &[4, 1]);
    }

    #[test]
    fn attrs_follow_through_flatten() {
        let attrs = Attrs::default().merged([("description".to_string(), MetaValue::from("scene"))]);
        let dataset = dataset(&["a", "b"], 2, 2).with_attrs(attrs.clone());
        assert_eq!(dataset.attrs(), &attrs);
        let flat = Frame::from(dataset).flatten().unwrap();
        assert_eq!(flat.attr("description"), Some(&MetaValue::from("scene")));
        assert_eq!(flat.old_attrs()[0].attr("source"), Some(&MetaValue::from("a")));
    }
}
