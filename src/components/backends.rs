use itertools::Itertools;

use crate::components::metadata::{MetaValue, Metadata};

/// Splits GDAL `SUBDATASET_<n>_NAME=...` / `SUBDATASET_<n>_DESC=...` entries
/// into one record per subdataset, in subdataset order.
pub fn subdataset_records(entries: &[String]) -> Vec<Metadata> {
    entries
        .iter()
        .filter_map(|entry| {
            let (key, value) = entry.split_once('=')?;
            let rest = key.strip_prefix("SUBDATASET_")?;
            let (index, field) = rest.split_once('_')?;
            let field = match field {
                "NAME" => "sub_dataset_name",
                "DESC" => "description",
                _ => return None,
            };
            Some((index.parse::<usize>().ok()?, field, value))
        })
        .into_group_map_by(|(index, _, _)| *index)
        .into_iter()
        .sorted_by_key(|(index, _)| *index)
        .map(|(_, fields)| {
            fields
                .into_iter()
                .map(|(_, field, value)| (field.to_string(), MetaValue::from(value)))
                .collect()
        })
        .collect()
}

/// Implementations for gdal
#[cfg(feature = "gdal")]
pub mod gdal_backend {
    use super::*;
    use gdal::{
        Dataset as GdalDataset, Metadata as GdalMetadata, MetadataEntry as GdalMetadataEntry,
    };
    use log::debug;
    use ndarray::{ArrayD, IxDyn};
    use std::path::Path;

    use crate::{
        components::{
            assembly::ReadParams, bounds::ReadWindow, files::RasterSource,
            transforms::GeoTransform,
        },
        errors::{RasterCanvasError, Result},
    };

    fn filter_metadata_gdal(metadata: &impl GdalMetadata) -> Metadata {
        GdalMetadata::metadata(metadata)
            .filter_map(|GdalMetadataEntry { domain, key, value }| {
                if domain.eq("") {
                    Some((key, MetaValue::from(value)))
                } else {
                    None
                }
            })
            .collect()
    }

    /// GDAL reports a default transform with an error when none is stored.
    fn stored_geo_transform(dataset: &GdalDataset) -> Option<GeoTransform> {
        dataset.geo_transform().ok().map(GeoTransform::from)
    }

    #[derive(Debug, Clone)]
    struct GdalLayer {
        /// Path GDAL opens for this layer, a subdataset name for containers.
        path: String,
        /// 1-based bands read together, more than one gives a rank 3 read.
        bands: Vec<usize>,
        metadata: Metadata,
        size: (usize, usize),
        geo_transform: Option<GeoTransform>,
    }

    /// Raster source backed by GDAL.
    ///
    /// Containers with subdatasets expose one layer per subdataset, other
    /// files one layer per band. No GDAL handle outlives a call.
    #[derive(Debug, Clone)]
    pub struct GdalSource {
        description: String,
        metadata: Metadata,
        layers: Vec<GdalLayer>,
    }

    impl GdalSource {
        pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
            let path = path.as_ref().to_string_lossy().to_string();
            let dataset = GdalDataset::open(&path)?;
            let description = GdalMetadata::description(&dataset)?;
            let metadata = filter_metadata_gdal(&dataset);
            let subdatasets = subdataset_records(
                &GdalMetadata::metadata_domain(&dataset, "SUBDATASETS").unwrap_or_default(),
            );
            let layers = if subdatasets.is_empty() {
                band_layers(&path, &dataset)?
            } else {
                subdatasets
                    .into_iter()
                    .map(subdataset_layer)
                    .collect::<Result<Vec<_>>>()?
            };
            debug!("Opened {path:?} with {} layers", layers.len());
            Ok(Self {
                description,
                metadata,
                layers,
            })
        }

        fn layer(&self, index: usize) -> Result<&GdalLayer> {
            self.layers
                .get(index)
                .ok_or_else(|| RasterCanvasError::MissingLayer(format!("{}[{index}]", self.description)))
        }
    }

    fn band_layers(path: &str, dataset: &GdalDataset) -> Result<Vec<GdalLayer>> {
        let geo_transform = stored_geo_transform(dataset);
        (1..=dataset.raster_count())
            .map(|band_index| {
                let band = dataset.rasterband(band_index)?;
                let mut metadata = filter_metadata_gdal(&band);
                metadata.insert("name".to_string(), MetaValue::from(band.description()?));
                metadata.insert("band".to_string(), MetaValue::from(band_index));
                Ok(GdalLayer {
                    path: path.to_string(),
                    bands: vec![band_index],
                    metadata,
                    size: band.size(),
                    geo_transform,
                })
            })
            .collect()
    }

    fn subdataset_layer(record: Metadata) -> Result<GdalLayer> {
        let path = record
            .get("sub_dataset_name")
            .map(|name| name.to_string())
            .unwrap_or_default();
        let dataset = GdalDataset::open(&path)?;
        let mut metadata = filter_metadata_gdal(&dataset);
        metadata.extend(record);
        Ok(GdalLayer {
            bands: (1..=dataset.raster_count()).collect(),
            size: dataset.raster_size(),
            geo_transform: stored_geo_transform(&dataset),
            path,
            metadata,
        })
    }

    impl RasterSource for GdalSource {
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
            Ok(self.layer(index)?.size)
        }

        fn geo_transform(&self, index: usize) -> Result<Option<GeoTransform>> {
            Ok(self.layer(index)?.geo_transform)
        }

        fn read(&self, index: usize, read: &ReadParams) -> Result<ArrayD<f64>> {
            let layer = self.layer(index)?;
            let window = match read.window {
                Some(window) => window.clip(layer.size)?,
                None => ReadWindow::full(layer.size),
            };
            let offsets = window.to_offsets();
            let out_size = (
                read.buf_xsize.unwrap_or(offsets.xsize),
                read.buf_ysize.unwrap_or(offsets.ysize),
            );
            let dataset = GdalDataset::open(&layer.path)?;
            let mut data = Vec::with_capacity(layer.bands.len() * out_size.0 * out_size.1);
            for band_index in &layer.bands {
                let buffer = dataset.rasterband(*band_index)?.read_as::<f64>(
                    (offsets.xoff as isize, offsets.yoff as isize),
                    (offsets.xsize, offsets.ysize),
                    out_size,
                    None,
                )?;
                data.extend_from_slice(buffer.data());
            }
            let shape = match layer.bands.len() {
                1 => vec![out_size.1, out_size.0],
                bands => vec![bands, out_size.1, out_size.0],
            };
            Ok(ArrayD::from_shape_vec(IxDyn(&shape), data)?)
        }
    }
}
