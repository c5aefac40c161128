use either::Either;
use log::info;
use ndarray::{ArrayD, Axis, Slice};
use rayon::prelude::*;
use std::fmt::Debug;

use crate::{
    components::{
        assembly::{assemble_layer, ReadParams},
        bounds::ReadWindow,
        dataset::Dataset,
        grid_header::{take_geo_transform_from_meta, GeoTransformStrategies},
        layer_spec::{select_layers, LayerSelector, LayerSpec, MatchPolicy},
        metadata::{meta_strings_to_dict, Attrs, MetaValue, Metadata},
        transforms::GeoTransform,
    },
    errors::{RasterCanvasError, Result},
};

/// A file (or group of files) holding raster layers.
///
/// Implementations decode one container format. Any handle opened for a read
/// is released before `read` returns.
pub trait RasterSource: Debug + Send + Sync {
    fn description(&self) -> String;
    /// File level metadata.
    fn metadata(&self) -> Metadata;
    /// One record per readable layer, in native order.
    fn layer_metadata(&self) -> Result<Vec<Metadata>>;
    /// Native (width, height) of a layer.
    fn size(&self, index: usize) -> Result<(usize, usize)>;
    /// Transform stored with a layer, if the format has one.
    fn geo_transform(&self, index: usize) -> Result<Option<GeoTransform>>;
    fn read(&self, index: usize, read: &ReadParams) -> Result<ArrayD<f64>>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemoryLayer {
    pub metadata: Metadata,
    /// Rows and columns are the last two axes.
    pub values: ArrayD<f64>,
    pub geo_transform: Option<GeoTransform>,
}

/// Source over arrays already in memory.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MemorySource {
    pub description: String,
    pub metadata: Metadata,
    pub layers: Vec<MemoryLayer>,
}

impl MemorySource {
    fn layer(&self, index: usize) -> Result<&MemoryLayer> {
        self.layers
            .get(index)
            .ok_or_else(|| RasterCanvasError::MissingLayer(format!("{}[{index}]", self.description)))
    }
}

/// Nearest sample positions of `size` cells over `0..native`.
fn decimate(native: usize, size: usize) -> Vec<usize> {
    (0..size).map(|idx| idx * native / size).collect()
}

impl RasterSource for MemorySource {
    fn description(&self) -> String {
        self.description.clone()
    }

    fn metadata(&self) -> Metadata {
        self.metadata.clone()
    }

    fn layer_metadata(&self) -> Result<Vec<Metadata>> {
        Ok(self.layers.iter().map(|layer| layer.metadata.clone()).collect())
    }

    fn size(&self, index: usize) -> Result<(usize, usize)> {
        let shape = self.layer(index)?.values.shape();
        match shape {
            [.., rows, cols] => Ok((*cols, *rows)),
            _ => Err(RasterCanvasError::InvalidRank {
                rank: shape.len(),
                shape: shape.to_vec(),
            }),
        }
    }

    fn geo_transform(&self, index: usize) -> Result<Option<GeoTransform>> {
        Ok(self.layer(index)?.geo_transform)
    }

    fn read(&self, index: usize, read: &ReadParams) -> Result<ArrayD<f64>> {
        let values = self.layer(index)?.values.view();
        let (width, height) = self.size(index)?;
        let (row_axis, col_axis) = (Axis(values.ndim() - 2), Axis(values.ndim() - 1));
        let window = match read.window {
            Some(window) => window.clip((width, height))?,
            None => ReadWindow::full((width, height)),
        };
        let (rows, cols) = (window.rows(), window.cols());
        let mut windowed = values;
        windowed.slice_axis_inplace(row_axis, Slice::from(rows.0..rows.1));
        windowed.slice_axis_inplace(col_axis, Slice::from(cols.0..cols.1));
        let (window_width, window_height) = window.shape();
        let out_width = read.buf_xsize.unwrap_or(window_width);
        let out_height = read.buf_ysize.unwrap_or(window_height);
        Ok(windowed
            .select(row_axis, &decimate(window_height, out_height))
            .select(col_axis, &decimate(window_width, out_width)))
    }
}

fn selector_of(spec: Option<&LayerSpec>, name: &str) -> LayerSelector {
    match spec {
        Some(spec) => Either::Left(spec.clone()),
        None => Either::Right(name.to_string()),
    }
}

/// Selects, reads and assembles the layers of one source.
///
/// Metadata goes through [meta_strings_to_dict] before matching.
/// Transforms not stored with a layer are inferred from the layer record
/// over the file metadata. Layers carry their own record as attrs, the
/// dataset carries the file metadata.
pub fn load_layers(
    source: &impl RasterSource,
    selectors: &[LayerSelector],
    policy: MatchPolicy,
    strategies: &GeoTransformStrategies,
) -> Result<Dataset> {
    let file_metadata = meta_strings_to_dict(&source.metadata());
    let records = source
        .layer_metadata()?
        .iter()
        .map(meta_strings_to_dict)
        .collect::<Vec<_>>();
    let selected = select_layers(&records, selectors, policy)?;
    let layers = selected
        .iter()
        .map(|selected| {
            let record = &records[selected.record];
            let read = ReadParams::from_spec(selected.spec, Some(source.size(selected.record)?));
            let values = source.read(selected.record, &read)?;
            let geo_transform = match source.geo_transform(selected.record)? {
                Some(geo_transform) => Some(geo_transform),
                None => {
                    let mut lookup = file_metadata.clone();
                    lookup.extend(record.clone());
                    take_geo_transform_from_meta(selected.spec, &lookup, strategies, true)?
                }
            };
            assemble_layer(
                values,
                &selector_of(selected.spec, &selected.name),
                &read,
                record,
                geo_transform,
                strategies,
            )
        })
        .collect::<Result<Vec<_>>>()?;
    info!("Loaded {} layers from {}", layers.len(), source.description());
    let attrs = Attrs::from(file_metadata).merged([(
        "description".to_string(),
        MetaValue::from(source.description()),
    )]);
    Dataset::new(layers, attrs)
}

/// [load_layers] over independent sources in parallel, results in source order.
pub fn load_many<S: RasterSource>(
    sources: &[S],
    selectors: &[LayerSelector],
    policy: MatchPolicy,
    strategies: &GeoTransformStrategies,
) -> Result<Vec<Dataset>> {
    sources
        .par_iter()
        .map(|source| load_layers(source, selectors, policy, strategies))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{metadata::HasAttrs, reshape::flatten::flatten};
    use ndarray::{Array, IxDyn};

    fn source(description: &str) -> MemorySource {
        let grid = |offset: f64| {
            Array::from_shape_fn(IxDyn(&[180, 360]), move |idx| offset + (idx[0] * 360 + idx[1]) as f64)
        };
        let record = |name: &str| -> Metadata {
            [(
                "long_name".to_string(),
                MetaValue::from(name),
            )]
            .into_iter()
            .collect()
        };
        MemorySource {
            description: description.to_string(),
            metadata: [(
                "FileHeader".to_string(),
                MetaValue::from(
                    "LatitudeResolution=1;LongitudeResolution=1;NorthBoundingCoordinate=90;\
                     SouthBoundingCoordinate=-90;EastBoundingCoordinate=180;WestBoundingCoordinate=-180;",
                ),
            )]
            .into_iter()
            .collect(),
            layers: vec![
                MemoryLayer {
                    metadata: record("brightness"),
                    values: grid(0.),
                    geo_transform: None,
                },
                MemoryLayer {
                    metadata: record("precipitation"),
                    values: grid(1.),
                    geo_transform: None,
                },
            ],
        }
    }

    #[test]
    fn memory_reads_window_and_buffer() {
        let source = source("mem");
        let read = ReadParams {
            window: Some(ReadWindow::new((10, 20), (100, 120))),
            buf_xsize: Some(10),
            buf_ysize: Some(5),
            ..Default::default()
        };
        let values = source.read(0, &read).unwrap();
        assert_eq!(values.shape(), &[5, 10]);
        assert_eq!(values[[0, 0]], (10 * 360 + 100) as f64);
        assert_eq!(values[[1, 1]], (12 * 360 + 102) as f64);
    }

    #[test_log::test]
    fn loads_selected_layers_with_inferred_transform() {
        let selectors = vec![
            Either::Left(LayerSpec::new("long_name", "precip", "precip").with_buf_size(180, 90)),
            Either::Left(LayerSpec::new("long_name", "bright", "bright").with_buf_size(180, 90)),
        ];
        let dataset = load_layers(
            &source("mem"),
            &selectors,
            MatchPolicy::Strict,
            &GeoTransformStrategies::new(),
        )
        .unwrap();
        assert_eq!(dataset.layer_order(), vec!["precip", "bright"]);
        let precip = dataset.get("precip").unwrap();
        assert_eq!(precip.shape(), &[90, 180]);
        assert_eq!(precip.canvas().unwrap().geo_transform().pixel_size(), (2., -2.));
        assert_eq!(precip.attr("long_name"), Some(&MetaValue::from("precipitation")));
        assert!(precip.attr("FileHeader").is_none());
        assert!(dataset.attr("FileHeader").unwrap().as_map().is_some());
        assert!(flatten(&dataset).is_ok());
    }

    #[test]
    fn loads_many_sources() {
        let sources = vec![source("first"), source("second"), source("third")];
        let datasets = load_many(&sources, &[], MatchPolicy::Strict, &GeoTransformStrategies::new()).unwrap();
        assert_eq!(datasets.len(), 3);
        assert_eq!(
            datasets[1].attr("description"),
            Some(&MetaValue::from("second"))
        );
        assert_eq!(datasets[2].layer_order(), vec!["layer_0", "layer_1"]);
    }
}
