//! Pure reshaping steps over datasets. Every step returns a new value.

pub mod aggregate;
pub mod drop_na;
pub mod flatten;
pub mod select_canvas;
pub mod transpose;

pub use aggregate::{aggregate, AggFunc, Along};
pub use drop_na::{drop_na_rows, drop_na_rows_with, DropHow};
pub use flatten::{flatten, inverse_flatten};
pub use select_canvas::{select_canvas, select_canvas_of};
pub use transpose::transpose;
