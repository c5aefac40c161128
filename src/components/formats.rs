use log::debug;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::{RasterCanvasError, Result};

/// Container formats a path can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormatKind {
    NetCdf,
    Hdf5,
    Hdf4,
    /// HDF of unspecified version.
    Hdf,
    /// Directory of single layer TIFF files.
    TifDir,
}

/// Extension probes, tried in order after the directory probe.
const EXTENSION_PROBES: &[(FormatKind, &str)] = &[
    (FormatKind::NetCdf, r"^nc\d?$"),
    (FormatKind::Hdf5, r"^(h5|hdf5|hd5)$"),
    (FormatKind::Hdf4, r"^(hdf4|h4|hd4)$"),
    (FormatKind::Hdf, r"^hdf$"),
];

fn extension_probes() -> Result<Vec<(FormatKind, Regex)>> {
    EXTENSION_PROBES
        .iter()
        .map(|(kind, pattern)| {
            Ok((
                *kind,
                RegexBuilder::new(pattern).case_insensitive(true).build()?,
            ))
        })
        .collect()
}

/// Returns the format of the first matching probe.
pub fn detect_format(path: impl AsRef<Path>) -> Result<FormatKind> {
    let path = path.as_ref();
    if path.is_dir() {
        debug!("{path:?} is a directory, reading as {:?}", FormatKind::TifDir);
        return Ok(FormatKind::TifDir);
    }
    let extension = path
        .extension()
        .and_then(|extension| extension.to_str())
        .unwrap_or_default();
    extension_probes()?
        .into_iter()
        .find(|(_, probe)| probe.is_match(extension))
        .map(|(kind, _)| kind)
        .inspect(|kind| debug!("{path:?} matched {kind:?}"))
        .ok_or_else(|| RasterCanvasError::UnknownFormat(path.display().to_string()))
}
