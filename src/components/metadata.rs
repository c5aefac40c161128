use itertools::Itertools;
use serde::{Deserialize, Serialize};
use shrinkwraprs::Shrinkwrap;
use std::{collections::BTreeMap, fmt::Display};

/// Free-form metadata record as produced by format readers.
pub type Metadata = BTreeMap<String, MetaValue>;

/// A single metadata value.
///
/// Readers hand over strings, numbers and nested groups;
/// lists appear when a reader already split a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Null,
    Number(f64),
    Text(String),
    List(Vec<MetaValue>),
    Map(Metadata),
}

impl MetaValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MetaValue::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Metadata> {
        match self {
            MetaValue::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Numbers as is, text parsed as a float.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetaValue::Number(number) => Some(*number),
            MetaValue::Text(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    /// Flattens a number, a list of numbers or a `,`/whitespace separated
    /// text into floats. `None` if any piece does not parse.
    pub fn as_floats(&self) -> Option<Vec<f64>> {
        match self {
            MetaValue::Number(number) => Some(vec![*number]),
            MetaValue::Text(text) => {
                let pieces: Vec<&str> = if text.contains(',') {
                    text.split(',').collect()
                } else {
                    text.split_whitespace().collect()
                };
                pieces
                    .into_iter()
                    .map(|piece| piece.trim().parse::<f64>().ok())
                    .collect()
            }
            MetaValue::List(items) => items.iter().map(MetaValue::as_f64).collect(),
            MetaValue::Map(_) | MetaValue::Null => None,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            MetaValue::Null => false,
            MetaValue::Number(number) => *number != 0.,
            MetaValue::Text(text) => {
                let text = text.trim().to_lowercase();
                !matches!(text.as_str(), "" | "0" | "false" | "no" | "n")
            }
            MetaValue::List(items) => !items.is_empty(),
            MetaValue::Map(map) => !map.is_empty(),
        }
    }
}

impl Display for MetaValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetaValue::Null => Ok(()),
            MetaValue::Number(number) => write!(f, "{number}"),
            MetaValue::Text(text) => f.write_str(text),
            MetaValue::List(items) => write!(f, "{}", items.iter().join(",")),
            MetaValue::Map(map) => write!(
                f,
                "{{{}}}",
                map.iter().map(|(key, value)| format!("{key}={value}")).join(";")
            ),
        }
    }
}

impl From<&str> for MetaValue {
    fn from(value: &str) -> Self {
        MetaValue::Text(value.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(value: String) -> Self {
        MetaValue::Text(value)
    }
}

impl From<f64> for MetaValue {
    fn from(value: f64) -> Self {
        MetaValue::Number(value)
    }
}

impl From<usize> for MetaValue {
    fn from(value: usize) -> Self {
        MetaValue::Number(value as f64)
    }
}

impl From<Vec<f64>> for MetaValue {
    fn from(value: Vec<f64>) -> Self {
        MetaValue::List(value.into_iter().map(MetaValue::Number).collect())
    }
}

impl From<Vec<String>> for MetaValue {
    fn from(value: Vec<String>) -> Self {
        MetaValue::List(value.into_iter().map(MetaValue::Text).collect())
    }
}

impl From<Metadata> for MetaValue {
    fn from(value: Metadata) -> Self {
        MetaValue::Map(value)
    }
}

/// Attribute mapping carried by layers and datasets.
#[derive(Shrinkwrap, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attrs(Metadata);

impl From<Metadata> for Attrs {
    fn from(value: Metadata) -> Self {
        Self(value)
    }
}

impl Attrs {
    /// New attrs with `delta` layered over `self`.
    pub fn merged(&self, delta: impl IntoIterator<Item = (String, MetaValue)>) -> Self {
        let mut merged = self.0.clone();
        merged.extend(delta);
        Self(merged)
    }

    /// New attrs without the given keys.
    pub fn without(&self, keys: &[&str]) -> Self {
        Self(
            self.0
                .iter()
                .filter(|(key, _)| !keys.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        )
    }

    pub fn into_inner(self) -> Metadata {
        self.0
    }
}

#[ambassador::delegatable_trait]
pub trait HasAttrs {
    fn attrs(&self) -> &crate::components::metadata::Attrs;
    fn attr(&self, key: &str) -> Option<&crate::components::metadata::MetaValue>;
}

impl HasAttrs for Attrs {
    fn attrs(&self) -> &Attrs {
        self
    }

    fn attr(&self, key: &str) -> Option<&MetaValue> {
        self.0.get(key)
    }
}

fn split_key_value_text(text: &str) -> Option<Metadata> {
    let (equals, semicolon) = (text.find('=')?, text.find(';')?);
    if equals > semicolon {
        return None;
    }
    Some(
        text.split(';')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(|item| match item.split_once('=') {
                Some((key, value)) if !value.trim().is_empty() => {
                    (key.trim().to_string(), MetaValue::from(value.trim()))
                }
                Some((key, _)) => (key.trim().to_string(), MetaValue::Null),
                None => (item.to_string(), MetaValue::Null),
            })
            .collect(),
    )
}

fn split_meta_value(value: &MetaValue) -> MetaValue {
    match value {
        MetaValue::Text(text) => split_key_value_text(text)
            .map(MetaValue::Map)
            .unwrap_or_else(|| value.clone()),
        MetaValue::Map(map) => MetaValue::Map(meta_strings_to_dict(map)),
        MetaValue::List(items) => MetaValue::List(items.iter().map(split_meta_value).collect()),
        other => other.clone(),
    }
}

/// Splits `;` delimited `key=value` text values into nested maps.
///
/// `"DOI=Realtime;\nDOIshortName=3IMERGHH;\n"` becomes
/// `{DOI: Realtime, DOIshortName: 3IMERGHH}`.
/// Text is only split when its first `=` comes before its first `;`.
pub fn meta_strings_to_dict(metadata: &Metadata) -> Metadata {
    metadata
        .iter()
        .map(|(key, value)| (key.clone(), split_meta_value(value)))
        .collect()
}

fn strip_key(key: &str) -> String {
    key.to_lowercase()
        .chars()
        .filter(|c| !matches!(c, '.' | '_' | '-' | ' '))
        .collect()
}

/// Looks for day/night flags in (nested) metadata.
pub fn meta_is_day(metadata: &Metadata) -> bool {
    let mut nested = Vec::new();
    for (key, value) in metadata {
        if let MetaValue::Map(map) = value {
            nested.push(map);
            continue;
        }
        let key = strip_key(key);
        match (key.contains("day"), key.contains("night")) {
            (true, true) => return strip_key(&value.to_string()).contains("day"),
            (true, false) => return value.is_truthy(),
            (false, true) => return !value.is_truthy(),
            (false, false) => (),
        }
    }
    nested.into_iter().any(meta_is_day)
}
