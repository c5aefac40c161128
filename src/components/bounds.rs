use geo::{Coord, CoordNum, Intersects, Rect};
use serde::{Deserialize, Serialize};
use shrinkwraprs::Shrinkwrap;

use crate::errors::{RasterCanvasError, Result};

/// Real world extent of a grid as `(left, bottom, right, top)`.
///
/// `top` belongs to the first row and `bottom` to the last row,
/// whatever the sign of the pixel height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
    pub top: f64,
}

impl Bounds {
    /// Normalised rectangle, min/max ordered.
    pub fn rect(&self) -> Rect {
        Rect::new(
            Coord {
                x: self.left,
                y: self.bottom,
            },
            Coord {
                x: self.right,
                y: self.top,
            },
        )
    }

    pub fn overlaps(&self, other: &Bounds) -> bool {
        self.rect().intersects(&other.rect())
    }
}

pub trait Intersection: Sized {
    fn intersection(&self, rhs: &Self) -> Result<Self>;
}

impl<T: CoordNum> Intersection for Rect<T> {
    fn intersection(&self, rhs: &Self) -> Result<Rect<T>> {
        let (lhs_min, lhs_max) = (self.min(), self.max());
        let (rhs_min, rhs_max) = (rhs.min(), rhs.max());
        if (lhs_max.x <= rhs_min.x) | (lhs_max.y <= rhs_min.y) {
            return Err(RasterCanvasError::NoIntersection);
        }
        if (lhs_min.x >= rhs_max.x) | (lhs_min.y >= rhs_max.y) {
            return Err(RasterCanvasError::NoIntersection);
        }
        let pick = |lhs: T, rhs: T, larger: bool| {
            if (lhs > rhs) == larger {
                lhs
            } else {
                rhs
            }
        };
        let min = Coord {
            x: pick(lhs_min.x, rhs_min.x, true),
            y: pick(lhs_min.y, rhs_min.y, true),
        };
        let max = Coord {
            x: pick(lhs_max.x, rhs_max.x, false),
            y: pick(lhs_max.y, rhs_max.y, false),
        };
        Ok(Rect::new(min, max))
    }
}

/// Pixel window of a read, `((row_min, row_max), (col_min, col_max))`,
/// max exclusive.
///
/// In the underlying rect `x` runs over columns and `y` over rows.
#[derive(Shrinkwrap, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadWindow(Rect<usize>);

/// Offset and size form of a [ReadWindow], as GDAL style readers take it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadOffsets {
    pub xoff: usize,
    pub yoff: usize,
    pub xsize: usize,
    pub ysize: usize,
}

impl ReadWindow {
    pub fn new(rows: (usize, usize), cols: (usize, usize)) -> Self {
        Self(Rect::new((cols.0, rows.0), (cols.1, rows.1)))
    }

    /// Window over a whole grid of `size` (width, height).
    pub fn full(size: (usize, usize)) -> Self {
        Self::new((0, size.1), (0, size.0))
    }

    pub fn rows(&self) -> (usize, usize) {
        (self.0.min().y, self.0.max().y)
    }

    pub fn cols(&self) -> (usize, usize) {
        (self.0.min().x, self.0.max().x)
    }

    /// (width, height)
    pub fn shape(&self) -> (usize, usize) {
        (self.0.width(), self.0.height())
    }

    pub fn to_offsets(&self) -> ReadOffsets {
        let (xsize, ysize) = self.shape();
        ReadOffsets {
            xoff: self.0.min().x,
            yoff: self.0.min().y,
            xsize,
            ysize,
        }
    }

    /// Part of the window inside a grid of `size` (width, height).
    pub fn clip(&self, size: (usize, usize)) -> Result<Self> {
        self.0.intersection(&Self::full(size).0).map(Self)
    }
}

impl From<((usize, usize), (usize, usize))> for ReadWindow {
    fn from(value: ((usize, usize), (usize, usize))) -> Self {
        Self::new(value.0, value.1)
    }
}

impl From<ReadOffsets> for ReadWindow {
    fn from(value: ReadOffsets) -> Self {
        Self::new(
            (value.yoff, value.yoff + value.ysize),
            (value.xoff, value.xoff + value.xsize),
        )
    }
}

impl Serialize for ReadWindow {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        (self.rows(), self.cols()).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ReadWindow {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        <((usize, usize), (usize, usize))>::deserialize(deserializer).map(Self::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_to_offsets() {
        let window = ReadWindow::from(((10, 200), (210, 400)));
        assert_eq!(
            window.to_offsets(),
            ReadOffsets {
                xoff: 210,
                yoff: 10,
                xsize: 190,
                ysize: 190
            }
        );
        assert_eq!(ReadWindow::from(window.to_offsets()), window);
    }

    #[test]
    fn clip_to_grid() {
        let window = ReadWindow::new((10, 200), (300, 400));
        let clipped = window.clip((360, 180)).unwrap();
        assert_eq!(clipped.rows(), (10, 180));
        assert_eq!(clipped.cols(), (300, 360));
        assert!(matches!(
            ReadWindow::new((0, 10), (400, 410)).clip((360, 180)),
            Err(RasterCanvasError::NoIntersection)
        ));
    }

    #[test]
    fn window_serde_shape() {
        let window = ReadWindow::new((1, 2), (3, 4));
        let json = serde_json::to_string(&window).unwrap();
        assert_eq!(json, "[[1,2],[3,4]]");
        assert_eq!(serde_json::from_str::<ReadWindow>(&json).unwrap(), window);
    }

    #[test]
    fn bounds_overlap() {
        let north_up = Bounds {
            left: 0.,
            bottom: 0.,
            right: 10.,
            top: 10.,
        };
        let south_up = Bounds {
            left: 5.,
            bottom: 20.,
            right: 15.,
            top: 5.,
        };
        assert!(north_up.overlaps(&south_up));
        let far = Bounds {
            left: 50.,
            bottom: 50.,
            right: 60.,
            top: 60.,
        };
        assert!(!north_up.overlaps(&far));
    }
}
