use geo::{AffineTransform, Coord};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use shrinkwraprs::Shrinkwrap;

use crate::{
    components::bounds::{Bounds, ReadWindow},
    errors::{RasterCanvasError, Result},
};

/// Transform used when a reader provides nothing better, a 0.1 degree global grid.
pub const DEFAULT_GEO_TRANSFORM: GeoTransform = GeoTransform([-180., 0.1, 0., 90., 0., -0.1]);

/// Affine pixel to coordinate transform in GDAL order:
/// `(x_origin, pixel_width, x_rotation, y_origin, y_rotation, pixel_height)`.
///
/// North-up grids have a negative `pixel_height`.
#[derive(Shrinkwrap, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform([f64; 6]);

impl From<[f64; 6]> for GeoTransform {
    fn from(value: [f64; 6]) -> Self {
        Self(value)
    }
}

impl TryFrom<&[f64]> for GeoTransform {
    type Error = RasterCanvasError;
    fn try_from(value: &[f64]) -> Result<Self> {
        <[f64; 6]>::try_from(value).map(Self).map_err(|_| {
            RasterCanvasError::GeoTransformUnresolved(format!(
                "expected 6 coefficients, found {}",
                value.len()
            ))
        })
    }
}

impl GeoTransform {
    pub const fn new(
        x_origin: f64,
        pixel_width: f64,
        x_rotation: f64,
        y_origin: f64,
        y_rotation: f64,
        pixel_height: f64,
    ) -> Self {
        Self([
            x_origin,
            pixel_width,
            x_rotation,
            y_origin,
            y_rotation,
            pixel_height,
        ])
    }

    pub fn coefficients(&self) -> [f64; 6] {
        self.0
    }

    pub fn pixel_size(&self) -> (f64, f64) {
        (self.0[1], self.0[5])
    }

    /// Same transform as a [geo::AffineTransform], for use with geo algorithms.
    pub fn to_affine(&self) -> AffineTransform {
        let [xoff, a, b, yoff, d, e] = self.0;
        AffineTransform::new(a, b, xoff, d, e, yoff)
    }

    /// Upper left corner of the cell at `(row, col)`.
    pub fn row_col_to_xy(&self, row: f64, col: f64) -> Coord {
        Coord {
            x: col * self.0[1] + self.0[0],
            y: row * self.0[5] + self.0[3],
        }
    }

    /// Cell whose upper left corner is at or before `xy`, truncated toward zero.
    pub fn xy_to_row_col(&self, xy: Coord) -> (i64, i64) {
        let col = (xy.x - self.0[0]) / self.0[1];
        let row = (xy.y - self.0[3]) / self.0[5];
        (row.trunc() as i64, col.trunc() as i64)
    }

    /// Transform of a read covering `window` of a grid of `native_size` (width, height)
    /// into an output buffer of `buffer_size` (width, height).
    ///
    /// The origin moves to the window's first cell and the pixel terms scale by
    /// `window_size / buffer_size`. Apply once per read.
    pub fn for_read(
        &self,
        native_size: (usize, usize),
        window: Option<&ReadWindow>,
        buffer_size: (usize, usize),
    ) -> Result<Self> {
        let offsets = match window {
            Some(window) => window.clip(native_size)?.to_offsets(),
            None => ReadWindow::full(native_size).to_offsets(),
        };
        if buffer_size.0 == 0 || buffer_size.1 == 0 {
            return Err(RasterCanvasError::ShapeMismatch(format!(
                "cannot read into an empty buffer {buffer_size:?}"
            )));
        }
        let [x0, a, b, y0, d, e] = self.0;
        let (xoff, yoff) = (offsets.xoff as f64, offsets.yoff as f64);
        let x_origin = x0 + xoff * a + yoff * b;
        let y_origin = y0 + xoff * d + yoff * e;
        let mult_x = offsets.xsize as f64 / buffer_size.0 as f64;
        let mult_y = offsets.ysize as f64 / buffer_size.1 as f64;
        Ok(Self([
            x_origin,
            a * mult_x,
            b * mult_y,
            y_origin,
            d * mult_x,
            e * mult_y,
        ]))
    }
}

/// Coordinates of every column `0..size_x` and row `0..size_y`, as `(xs, ys)`.
pub fn geotransform_to_coords(
    size_x: usize,
    size_y: usize,
    geo_transform: &GeoTransform,
) -> (Array1<f64>, Array1<f64>) {
    let xs = Array1::from_iter((0..size_x).map(|col| geo_transform.row_col_to_xy(0., col as f64).x));
    let ys = Array1::from_iter((0..size_y).map(|row| geo_transform.row_col_to_xy(row as f64, 0.).y));
    (xs, ys)
}

/// Bounds spanned by the upper left corners of the first and last cells.
///
/// `top` is always the first row and `bottom` the last, so a north-up
/// transform gives `bottom < top`.
pub fn geotransform_to_bounds(size_x: usize, size_y: usize, geo_transform: &GeoTransform) -> Bounds {
    let first = geo_transform.row_col_to_xy(0., 0.);
    let last = geo_transform.row_col_to_xy(
        size_y.saturating_sub(1) as f64,
        size_x.saturating_sub(1) as f64,
    );
    Bounds {
        left: first.x,
        bottom: last.y,
        right: last.x,
        top: first.y,
    }
}
