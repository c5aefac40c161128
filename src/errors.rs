pub type Result<T> = std::result::Result<T, RasterCanvasError>;

#[derive(thiserror::Error, Debug)]
pub enum RasterCanvasError {
    #[error(transparent)]
    NdarrayError(#[from] ndarray::ShapeError),
    #[error(transparent)]
    RegexError(#[from] regex::Error),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[cfg(feature = "gdal")]
    #[error(transparent)]
    GdalError(#[from] gdal::errors::GdalError),
    #[error("Found {found} layers matching layer specs, expected {expected}")]
    SpecMismatch { expected: usize, found: usize },
    #[error("Layer {layer:?} does not share the canvas of the other layers, call select_canvas first")]
    CanvasMismatch { layer: String },
    #[error("Layer {layer:?} has no canvas to resample from or onto")]
    MissingCanvas { layer: String },
    #[error("Dimension {dim:?} not found among {available:?}")]
    DimResolution { dim: String, available: Vec<String> },
    #[error("Could not resolve a geo transform: {0}")]
    GeoTransformUnresolved(String),
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),
    #[error("Expected an array of rank 2 or 3, found rank {rank} with shape {shape:?}")]
    InvalidRank { rank: usize, shape: Vec<usize> },
    #[error("Expected a flat dataset with dims (space, layer)")]
    NotFlat,
    #[error("Expected an aggregation among all any argmax argmin max mean median min prod sum std var, found {0:?}")]
    UnknownAggregation(String),
    #[error("No geo transform strategy registered as {0:?}")]
    UnknownStrategy(String),
    #[error("No sample step registered as {0:?}")]
    UnknownStep(String),
    #[error("No format probe matched {0:?}")]
    UnknownFormat(String),
    #[error("Layer {0:?} not found")]
    MissingLayer(String),
    #[error("Layer {0:?} appears more than once")]
    DuplicateLayer(String),
    #[error("There is no intersection between windows")]
    NoIntersection,
}
