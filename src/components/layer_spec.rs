use either::Either;
use itertools::Itertools;
use log::{debug, info};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::{
    components::{bounds::ReadWindow, metadata::Metadata},
    errors::{RasterCanvasError, Result},
};

/// Keys a bare layer name is looked up in.
const NAME_KEYS: &[&str] = &["name", "sub_dataset_name", "path"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegexFlag {
    #[serde(alias = "I")]
    IgnoreCase,
    #[serde(alias = "M")]
    Multiline,
    #[serde(alias = "S")]
    DotAll,
    #[serde(alias = "X")]
    Verbose,
}

fn build_regex(pattern: &str, flags: &[RegexFlag]) -> Result<Regex> {
    let mut builder = RegexBuilder::new(pattern);
    for flag in flags {
        match flag {
            RegexFlag::IgnoreCase => builder.case_insensitive(true),
            RegexFlag::Multiline => builder.multi_line(true),
            RegexFlag::DotAll => builder.dot_matches_new_line(true),
            RegexFlag::Verbose => builder.ignore_whitespace(true),
        };
    }
    Ok(builder.build()?)
}

/// Rule selecting one layer out of per-file metadata records and naming it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerSpec {
    pub search_key: String,
    pub search_value: String,
    pub name: String,
    pub key_re_flags: Vec<RegexFlag>,
    pub value_re_flags: Vec<RegexFlag>,
    pub window: Option<ReadWindow>,
    pub buf_xsize: Option<usize>,
    pub buf_ysize: Option<usize>,
    /// Name of a registered geo transform strategy.
    pub meta_to_geotransform: Option<String>,
    pub stored_coords_order: Option<Vec<String>>,
}

impl LayerSpec {
    pub fn new(search_key: &str, search_value: &str, name: &str) -> Self {
        Self {
            search_key: search_key.to_string(),
            search_value: search_value.to_string(),
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_flags(mut self, key_re_flags: Vec<RegexFlag>, value_re_flags: Vec<RegexFlag>) -> Self {
        self.key_re_flags = key_re_flags;
        self.value_re_flags = value_re_flags;
        self
    }

    pub fn with_window(mut self, window: ReadWindow) -> Self {
        self.window = Some(window);
        self
    }

    pub fn with_buf_size(mut self, buf_xsize: usize, buf_ysize: usize) -> Self {
        self.buf_xsize = Some(buf_xsize);
        self.buf_ysize = Some(buf_ysize);
        self
    }

    pub fn with_meta_to_geotransform(mut self, strategy: &str) -> Self {
        self.meta_to_geotransform = Some(strategy.to_string());
        self
    }

    pub fn with_stored_coords_order(mut self, order: &[&str]) -> Self {
        self.stored_coords_order = Some(order.iter().map(|dim| dim.to_string()).collect());
        self
    }

    fn compile(&self) -> Result<CompiledSpec> {
        Ok(CompiledSpec {
            key: build_regex(&self.search_key, &self.key_re_flags)?,
            value: build_regex(&self.search_value, &self.value_re_flags)?,
        })
    }

    /// True on the first key matching `search_key` whose value matches `search_value`.
    pub fn matches(&self, record: &Metadata) -> Result<bool> {
        Ok(self.compile()?.matches(record))
    }
}

struct CompiledSpec {
    key: Regex,
    value: Regex,
}

impl CompiledSpec {
    fn matches(&self, record: &Metadata) -> bool {
        record
            .iter()
            .filter(|(key, _)| self.key.is_match(key))
            .any(|(_, value)| self.value.is_match(&value.to_string()))
    }
}

/// A layer is selected either by a full [LayerSpec] or by a bare name.
pub type LayerSelector = Either<LayerSpec, String>;

pub fn selector_name(selector: &LayerSelector) -> &str {
    selector.as_ref().either(|spec| spec.name.as_str(), String::as_str)
}

fn name_matches(name: &str, record: &Metadata) -> bool {
    NAME_KEYS
        .iter()
        .filter_map(|key| record.get(*key))
        .filter_map(|value| value.as_text())
        .any(|text| text.contains(name))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MatchPolicy {
    /// One match per selector.
    #[default]
    Strict,
    AtLeastOne,
}

/// A record picked by a selector.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerMatch<'a> {
    pub record: usize,
    pub name: String,
    pub spec: Option<&'a LayerSpec>,
}

/// Assigns records to selectors.
///
/// Records are scanned in order and each goes to the first selector that
/// matches it. The result follows selector order. Without selectors every
/// record is kept as `layer_<index>`.
pub fn select_layers<'a>(
    records: &[Metadata],
    selectors: &'a [LayerSelector],
    policy: MatchPolicy,
) -> Result<Vec<LayerMatch<'a>>> {
    if selectors.is_empty() {
        return Ok((0..records.len())
            .map(|record| LayerMatch {
                record,
                name: format!("layer_{record}"),
                spec: None,
            })
            .collect());
    }
    let compiled = selectors
        .iter()
        .map(|selector| selector.as_ref().left().map(LayerSpec::compile).transpose())
        .collect::<Result<Vec<_>>>()?;
    let matches = records
        .iter()
        .enumerate()
        .filter_map(|(record_idx, record)| {
            selectors
                .iter()
                .zip(compiled.iter())
                .position(|(selector, compiled)| match (selector, compiled) {
                    (Either::Left(_), Some(compiled)) => compiled.matches(record),
                    (Either::Right(name), _) => name_matches(name, record),
                    (Either::Left(_), None) => false,
                })
                .map(|selector_idx| (selector_idx, record_idx))
        })
        .sorted_by_key(|(selector_idx, _)| *selector_idx)
        .map(|(selector_idx, record)| {
            let selector = &selectors[selector_idx];
            debug!("Record {record} matched {:?}", selector_name(selector));
            LayerMatch {
                record,
                name: selector_name(selector).to_string(),
                spec: selector.as_ref().left(),
            }
        })
        .collect_vec();
    let mismatch = match policy {
        MatchPolicy::Strict => matches.len() != selectors.len(),
        MatchPolicy::AtLeastOne => matches.is_empty(),
    };
    if mismatch {
        return Err(RasterCanvasError::SpecMismatch {
            expected: selectors.len(),
            found: matches.len(),
        });
    }
    info!(
        "Selected layers {:?}",
        matches.iter().map(|layer| layer.name.as_str()).collect_vec()
    );
    Ok(matches)
}
