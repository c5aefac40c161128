use log::debug;
use std::collections::BTreeMap;

use crate::{
    components::{
        layer_spec::LayerSpec,
        metadata::{MetaValue, Metadata},
        transforms::{GeoTransform, DEFAULT_GEO_TRANSFORM},
    },
    errors::{RasterCanvasError, Result},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum HeaderWord {
    LatitudeResolution,
    LongitudeResolution,
    North,
    South,
    East,
    West,
    Origin,
}

/// Upper-cased substrings recognised for each grid header field.
const HEADER_WORDS: &[(HeaderWord, &[&str])] = &[
    (HeaderWord::LatitudeResolution, &["LATITUDERESOLUTION"]),
    (HeaderWord::LongitudeResolution, &["LONGITUDERESOLUTION"]),
    (HeaderWord::North, &["NORTHBOUNDINGCOORD", "NORTHERNMOSTLAT"]),
    (HeaderWord::South, &["SOUTHBOUNDINGCOORD", "SOUTHERNMOSTLAT"]),
    (HeaderWord::East, &["EASTBOUNDINGCOORD", "EASTERNMOSTLON"]),
    (HeaderWord::West, &["WESTBOUNDINGCOORD", "WESTERNMOSTLON"]),
    (HeaderWord::Origin, &["ORIGIN"]),
];

fn header_word(key: &str) -> Option<HeaderWord> {
    let key = key.to_uppercase();
    HEADER_WORDS
        .iter()
        .find(|(_, words)| words.iter().any(|word| key.contains(word)))
        .map(|(header_word, _)| *header_word)
}

fn transform_from_level(metadata: &Metadata) -> Result<Option<GeoTransform>> {
    let mut numbers = BTreeMap::new();
    let mut origin = None;
    for (key, value) in metadata {
        match header_word(key) {
            Some(HeaderWord::Origin) => origin = Some(value.to_string().trim().to_uppercase()),
            Some(word) => {
                if let Some(number) = value.as_f64() {
                    numbers.insert(word, number);
                }
            }
            None => (),
        }
    }
    let field = |word| numbers.get(&word).copied();
    let (Some(lat_res), Some(lon_res), Some(north), Some(south), Some(west), Some(_east)) = (
        field(HeaderWord::LatitudeResolution),
        field(HeaderWord::LongitudeResolution),
        field(HeaderWord::North),
        field(HeaderWord::South),
        field(HeaderWord::West),
        field(HeaderWord::East),
    ) else {
        return Ok(None);
    };
    let origin = origin.unwrap_or_else(|| "NORTHWEST".to_string());
    debug!("Grid header with origin {origin}");
    match origin.as_str() {
        "NORTHWEST" => Ok(Some(GeoTransform::new(west, lon_res, 0., north, 0., -lat_res))),
        "SOUTHWEST" => Ok(Some(GeoTransform::new(west, lon_res, 0., south, 0., lat_res))),
        other => Err(RasterCanvasError::GeoTransformUnresolved(format!(
            "unexpected grid header origin {other:?}"
        ))),
    }
}

/// Builds a transform from bounding coordinate and resolution fields
/// found anywhere in `metadata`.
///
/// The current level is tried first, then nested maps in key order.
/// `Ok(None)` when no level holds all six fields.
pub fn grid_header_to_geo_transform(metadata: &Metadata) -> Result<Option<GeoTransform>> {
    if let Some(geo_transform) = transform_from_level(metadata)? {
        return Ok(Some(geo_transform));
    }
    for nested in metadata.values().filter_map(MetaValue::as_map) {
        if let Some(geo_transform) = grid_header_to_geo_transform(nested)? {
            return Ok(Some(geo_transform));
        }
    }
    Ok(None)
}

/// Named geo transform derivation.
pub type GeoTransformStrategy = fn(&Metadata) -> Option<Vec<f64>>;

/// Registered by [GeoTransformStrategies::new], gives [DEFAULT_GEO_TRANSFORM].
pub const DEFAULT_STRATEGY: &str = "default";

fn default_geo_transform(_: &Metadata) -> Option<Vec<f64>> {
    Some(DEFAULT_GEO_TRANSFORM.coefficients().to_vec())
}

/// Strategies a [LayerSpec] may name in `meta_to_geotransform`.
#[derive(Debug, Clone, Default)]
pub struct GeoTransformStrategies(BTreeMap<String, GeoTransformStrategy>);

impl GeoTransformStrategies {
    pub fn new() -> Self {
        Self::default().register(DEFAULT_STRATEGY, default_geo_transform)
    }

    pub fn register(mut self, name: &str, strategy: GeoTransformStrategy) -> Self {
        self.0.insert(name.to_string(), strategy);
        self
    }

    pub fn get(&self, name: &str) -> Result<GeoTransformStrategy> {
        self.0
            .get(name)
            .copied()
            .ok_or_else(|| RasterCanvasError::UnknownStrategy(name.to_string()))
    }
}

/// Resolves a transform from metadata, through the layer spec's named strategy
/// when it has one and the grid header fields otherwise.
///
/// With `required` unset a missing grid header gives `Ok(None)`.
pub fn take_geo_transform_from_meta(
    spec: Option<&LayerSpec>,
    metadata: &Metadata,
    strategies: &GeoTransformStrategies,
    required: bool,
) -> Result<Option<GeoTransform>> {
    if let Some(name) = spec.and_then(|spec| spec.meta_to_geotransform.as_deref()) {
        let strategy = strategies.get(name)?;
        let coefficients = strategy(metadata).ok_or_else(|| {
            RasterCanvasError::GeoTransformUnresolved(format!("strategy {name:?} returned nothing"))
        })?;
        return GeoTransform::try_from(coefficients.as_slice()).map(Some);
    }
    match grid_header_to_geo_transform(metadata)? {
        Some(geo_transform) => Ok(Some(geo_transform)),
        None if required => Err(RasterCanvasError::GeoTransformUnresolved(
            "no grid header fields in metadata".to_string(),
        )),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn header(origin: Option<&str>) -> Metadata {
        let mut header: Metadata = [
            ("LatitudeResolution", "0.1"),
            ("LongitudeResolution", "0.1"),
            ("NorthBoundingCoordinate", "90"),
            ("SouthBoundingCoordinate", "-90"),
            ("EastBoundingCoordinate", "180"),
            ("WestBoundingCoordinate", "-180"),
            ("Registration", "CENTER"),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), MetaValue::from(value)))
        .collect();
        if let Some(origin) = origin {
            header.insert("Origin".to_string(), MetaValue::from(origin));
        }
        header
    }

    #[rstest]
    #[case(None, [-180., 0.1, 0., 90., 0., -0.1])]
    #[case(Some("NORTHWEST"), [-180., 0.1, 0., 90., 0., -0.1])]
    #[case(Some("SOUTHWEST"), [-180., 0.1, 0., -90., 0., 0.1])]
    fn header_origins(#[case] origin: Option<&str>, #[case] expected: [f64; 6]) {
        let geo_transform = grid_header_to_geo_transform(&header(origin)).unwrap();
        assert_eq!(geo_transform, Some(GeoTransform::from(expected)));
    }

    #[test]
    fn unknown_origin_is_rejected() {
        assert!(matches!(
            grid_header_to_geo_transform(&header(Some("CENTER"))),
            Err(RasterCanvasError::GeoTransformUnresolved(_))
        ));
    }

    #[test]
    fn searches_nested_levels() {
        let mut partial = header(None);
        partial.remove("WestBoundingCoordinate");
        let mut metadata = Metadata::new();
        metadata.insert("a_partial".to_string(), MetaValue::Map(partial));
        metadata.insert(
            "b_group".to_string(),
            MetaValue::Map(
                [("GridHeader".to_string(), MetaValue::Map(header(None)))]
                    .into_iter()
                    .collect(),
            ),
        );
        metadata.insert("units".to_string(), MetaValue::from("K"));
        let geo_transform = grid_header_to_geo_transform(&metadata).unwrap();
        assert_eq!(geo_transform.map(|gt| gt[3]), Some(90.));
        assert_eq!(grid_header_to_geo_transform(&Metadata::new()).unwrap(), None);
    }

    fn fixed(_: &Metadata) -> Option<Vec<f64>> {
        Some(vec![0., 1., 0., 0., 0., -1.])
    }

    fn too_short(_: &Metadata) -> Option<Vec<f64>> {
        Some(vec![0., 1.])
    }

    #[test]
    fn named_strategies() {
        let strategies = GeoTransformStrategies::new()
            .register("fixed", fixed)
            .register("too_short", too_short);
        let spec = LayerSpec::new("k", "v", "n").with_meta_to_geotransform("fixed");
        let geo_transform =
            take_geo_transform_from_meta(Some(&spec), &header(None), &strategies, true).unwrap();
        assert_eq!(geo_transform, Some(GeoTransform::new(0., 1., 0., 0., 0., -1.)));

        let spec = spec.with_meta_to_geotransform("too_short");
        assert!(matches!(
            take_geo_transform_from_meta(Some(&spec), &header(None), &strategies, true),
            Err(RasterCanvasError::GeoTransformUnresolved(_))
        ));
        let spec = spec.with_meta_to_geotransform(DEFAULT_STRATEGY);
        assert_eq!(
            take_geo_transform_from_meta(Some(&spec), &Metadata::new(), &strategies, true).unwrap(),
            Some(DEFAULT_GEO_TRANSFORM)
        );
        let spec = spec.with_meta_to_geotransform("missing");
        assert!(matches!(
            take_geo_transform_from_meta(Some(&spec), &header(None), &strategies, true),
            Err(RasterCanvasError::UnknownStrategy(_))
        ));
    }

    #[test]
    fn required_header() {
        let strategies = GeoTransformStrategies::new();
        assert!(take_geo_transform_from_meta(None, &Metadata::new(), &strategies, false)
            .unwrap()
            .is_none());
        assert!(take_geo_transform_from_meta(None, &Metadata::new(), &strategies, true).is_err());
    }
}
