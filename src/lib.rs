mod components;
mod errors;
pub mod pipeline;

pub use components::*;
pub use errors::{RasterCanvasError, Result};
