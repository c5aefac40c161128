pub mod assembly;
pub mod backends;
pub mod bounds;
pub mod canvas;
pub mod dataset;
pub mod files;
pub mod formats;
pub mod grid_header;
pub mod layer;
pub mod layer_ops;
pub mod layer_spec;
pub mod metadata;
pub mod na;
pub mod reshape;
pub mod transforms;

pub use assembly::{assemble_layer, ReadParams};
pub use bounds::{Bounds, ReadOffsets, ReadWindow};
pub use canvas::{AxisExtent, Canvas, Coords};
pub use dataset::{Dataset, FlatDataset, Frame};
pub use files::{load_layers, load_many, MemoryLayer, MemorySource, RasterSource};
pub use formats::{detect_format, FormatKind};
pub use grid_header::GeoTransformStrategies;
pub use layer::Layer;
pub use layer_ops::{layer_operation, LayerOp, LayerOpSpec};
pub use layer_spec::{LayerSelector, LayerSpec, MatchPolicy};
pub use metadata::{Attrs, HasAttrs, MetaValue, Metadata};
pub use transforms::GeoTransform;

#[cfg(feature = "gdal")]
pub use backends::gdal_backend::GdalSource;
