use log::{debug, info};
use regex::{Regex, RegexBuilder};

use crate::{
    components::{
        dataset::Dataset,
        layer::Layer,
        metadata::{HasAttrs, MetaValue, Metadata},
    },
    errors::Result,
};

const VALID_RANGE_WORDS: &[&str] = &[r"^valid[\s\-_]*range"];
const INVALID_RANGE_WORDS: &[&str] = &[r"invalid[\s\-_]*range"];
const MISSING_VALUE_WORDS: &[&str] = &[r"missing[\s\-_]*value", r"invalid[\s\-_]*value"];

fn patterns(words: &[&str]) -> Result<Vec<Regex>> {
    words
        .iter()
        .map(|word| Ok(RegexBuilder::new(word).case_insensitive(true).build()?))
        .collect()
}

/// First value under a key matching one of `patterns`, searching nested maps
/// when a key does not match.
fn lookup(metadata: &Metadata, patterns: &[Regex]) -> Option<Vec<f64>> {
    for (key, value) in metadata {
        if patterns.iter().any(|pattern| pattern.is_match(key)) {
            return value.as_floats();
        }
        if let MetaValue::Map(nested) = value {
            if let Some(found) = lookup(nested, patterns) {
                return Some(found);
            }
        }
    }
    None
}

fn mask_layer(layer: &Layer, words: &MaskWords) -> Result<Layer> {
    let attrs = layer.attrs();
    let mut values = layer.values().clone();
    if let Some(invalid) = lookup(attrs, &words.invalid_range) {
        debug!("Invalid range {invalid:?} on {:?}", layer.name());
        match invalid.as_slice() {
            [low, high] => values.mapv_inplace(|value| {
                if value > *low && value < *high {
                    f64::NAN
                } else {
                    value
                }
            }),
            invalid => values.mapv_inplace(|value| {
                if invalid.contains(&value) {
                    f64::NAN
                } else {
                    value
                }
            }),
        }
    }
    if let Some(valid) = lookup(attrs, &words.valid_range) {
        debug!("Valid range {valid:?} on {:?}", layer.name());
        match valid.as_slice() {
            [low, high] => values.mapv_inplace(|value| {
                if value >= *low && value <= *high {
                    value
                } else {
                    f64::NAN
                }
            }),
            _ => info!("Ignoring valid range {valid:?}, it does not have two values"),
        }
    }
    if let Some(missing) = lookup(attrs, &words.missing_value) {
        debug!("Missing value {missing:?} on {:?}", layer.name());
        if let Some(missing) = missing.first() {
            values.mapv_inplace(|value| if value == *missing { f64::NAN } else { value });
        }
    }
    layer.with_values(values, layer.dims().to_vec(), layer.canvas().cloned())
}

struct MaskWords {
    valid_range: Vec<Regex>,
    invalid_range: Vec<Regex>,
    missing_value: Vec<Regex>,
}

/// Sets NaN where a layer's attrs declare values invalid or missing.
///
/// Keys loosely matching `invalid_range`, `valid_range` and `missing_value`
/// are searched, nested maps included.
pub fn set_na_from_meta(dataset: &Dataset) -> Result<Dataset> {
    let words = MaskWords {
        valid_range: patterns(VALID_RANGE_WORDS)?,
        invalid_range: patterns(INVALID_RANGE_WORDS)?,
        missing_value: patterns(MISSING_VALUE_WORDS)?,
    };
    dataset.try_map_layers(|layer| mask_layer(layer, &words))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{dataset::Dataset, metadata::Attrs};
    use ndarray::{array, ArrayD};
    use rstest::rstest;

    fn masked(attrs: &[(&str, MetaValue)]) -> ArrayD<f64> {
        let attrs: Metadata = attrs
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect();
        let layer = Layer::new(
            "a",
            array![-1., 0., 5., 10., 255.].into_dyn(),
            vec!["x".to_string()],
            None,
            Attrs::from(attrs),
        )
        .unwrap();
        let dataset = Dataset::new(vec![layer], Attrs::default()).unwrap();
        set_na_from_meta(&dataset)
            .unwrap()
            .get("a")
            .unwrap()
            .values()
            .clone()
    }

    fn nan_mask(values: &ArrayD<f64>) -> Vec<bool> {
        values.iter().map(|value| value.is_nan()).collect()
    }

    #[rstest]
    #[case(&[("valid_range", MetaValue::from("0, 10"))], [true, false, false, false, true])]
    #[case(&[("Valid Range", MetaValue::from(vec![0., 5.]))], [true, false, false, true, true])]
    #[case(&[("invalid-range", MetaValue::from("0 10"))], [false, false, true, false, false])]
    #[case(&[("_FillValue_missing_value", MetaValue::Number(255.))], [false, false, false, false, true])]
    #[case(&[("valid_range", MetaValue::from("0"))], [false, false, false, false, false])]
    #[case(&[("units", MetaValue::from("K"))], [false, false, false, false, false])]
    fn masks(#[case] attrs: &[(&str, MetaValue)], #[case] expected: [bool; 5]) {
        assert_eq!(nan_mask(&masked(attrs)), expected);
    }

    #[test_log::test]
    fn nested_attrs_are_searched() {
        let nested: Metadata = [("MISSING_VALUE".to_string(), MetaValue::from("-1"))]
            .into_iter()
            .collect();
        let values = masked(&[
            ("group", MetaValue::Map(nested)),
            ("not_valid_range", MetaValue::from("0 5")),
        ]);
        assert_eq!(nan_mask(&values), [true, false, false, false, false]);
    }
}
