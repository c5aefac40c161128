use criterion::{criterion_group, criterion_main, Criterion};
use ndarray::{Array, IxDyn};
use rastercanvas::{
    reshape::{drop_na_rows, flatten, inverse_flatten, DropHow},
    Attrs, Canvas, Dataset, GeoTransform, Layer,
};

const SIZE: (usize, usize) = (1800, 3600);
const LAYERS: [&str; 3] = ["precipitation", "brightness", "quality"];

fn dataset() -> Dataset {
    let canvas = Canvas::grid(GeoTransform::new(-180., 0.1, 0., 90., 0., -0.1), SIZE.1, SIZE.0);
    let layers = LAYERS
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let values = Array::from_shape_fn(IxDyn(&[SIZE.0, SIZE.1]), |cell| {
                if (cell[0] + cell[1] + idx) % 7 == 0 {
                    f64::NAN
                } else {
                    (cell[0] * SIZE.1 + cell[1]) as f64
                }
            });
            Layer::on_canvas(*name, values, canvas.clone(), Attrs::default()).unwrap()
        })
        .collect();
    Dataset::new(layers, Attrs::default()).unwrap()
}

fn bench_flatten(c: &mut Criterion) {
    let dataset = dataset();
    c.bench_function("flatten", |b| b.iter(|| flatten(&dataset)));
}

fn bench_drop_and_restore(c: &mut Criterion) {
    let flat = flatten(&dataset()).unwrap();
    c.bench_function("drop_na_rows_inverse_flatten", |b| {
        b.iter(|| inverse_flatten(&drop_na_rows(&flat, DropHow::Any)))
    });
}

criterion_group!(benches, bench_flatten, bench_drop_and_restore);
criterion_main!(benches);
