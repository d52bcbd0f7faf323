//! OPNsense product version handling.
//!
//! The running version is read from the firmware's core version file, a JSON
//! document with `product_version` (for example `24.1.4_1`) and
//! `product_series` (`24.1`) keys.

use std::cmp::Ordering;
use std::fmt::{self, Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;

use crate::error::HaError;

/// Default location of the firmware version file on an OPNsense host.
pub const DEFAULT_VERSION_FILE: &str = "/usr/local/opnsense/version/core";

/// A parsed OPNsense release such as `24.1` or `23.7.12_5`.
///
/// Ordering and equality only consider the numeric components; package
/// revision suffixes (`_5`) are kept for display.
#[derive(Debug, Clone)]
pub struct OpnsenseVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    raw: String,
}

impl OpnsenseVersion {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
            raw: if patch == 0 {
                format!("{major}.{minor}")
            } else {
                format!("{major}.{minor}.{patch}")
            },
        }
    }

    /// Release series, e.g. `(24, 1)` for `24.1.4`.
    pub fn series(&self) -> (u32, u32) {
        (self.major, self.minor)
    }

    fn key(&self) -> (u32, u32, u32) {
        (self.major, self.minor, self.patch)
    }
}

impl FromStr for OpnsenseVersion {
    type Err = HaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let numeric = raw
            .split(|c: char| c == '_' || c == '-' || c.is_whitespace())
            .next()
            .unwrap_or_default();

        let mut parts = [0u32; 3];
        let mut count = 0;
        for (idx, segment) in numeric.split('.').enumerate() {
            if idx >= parts.len() {
                break;
            }
            let digits: String = segment.chars().take_while(char::is_ascii_digit).collect();
            if digits.is_empty() {
                break;
            }
            parts[idx] = digits
                .parse()
                .map_err(|_| HaError::VersionUnavailable(format!("invalid version '{raw}'")))?;
            count += 1;
        }

        if count < 2 {
            return Err(HaError::VersionUnavailable(format!(
                "invalid version '{raw}'"
            )));
        }

        Ok(Self {
            major: parts[0],
            minor: parts[1],
            patch: parts[2],
            raw: raw.to_string(),
        })
    }
}

impl PartialEq for OpnsenseVersion {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for OpnsenseVersion {}

impl PartialOrd for OpnsenseVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpnsenseVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl Display for OpnsenseVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[derive(Debug, Deserialize)]
struct CoreVersionFile {
    #[serde(default)]
    product_version: Option<String>,
    #[serde(default)]
    product_series: Option<String>,
}

/// Where the running product version comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSource {
    /// JSON version file written by the firmware.
    File(PathBuf),
    /// Version given explicitly by the operator.
    Fixed(String),
}

impl VersionSource {
    pub fn read(&self) -> Result<OpnsenseVersion, HaError> {
        match self {
            VersionSource::File(path) => read_version_file(path),
            VersionSource::Fixed(value) => value.parse(),
        }
    }
}

/// Read and parse the firmware version file at `path`.
pub fn read_version_file(path: &Path) -> Result<OpnsenseVersion, HaError> {
    let raw = fs::read_to_string(path).map_err(|err| {
        HaError::VersionUnavailable(format!("failed to read {}: {err}", path.display()))
    })?;
    parse_version_json(&raw)
}

/// Extract the product version from the firmware's JSON version document.
pub fn parse_version_json(raw: &str) -> Result<OpnsenseVersion, HaError> {
    let file: CoreVersionFile = serde_json::from_str(raw)
        .map_err(|err| HaError::VersionUnavailable(format!("invalid version file: {err}")))?;

    file.product_version
        .or(file.product_series)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| {
            HaError::VersionUnavailable("version file has no product_version".to_string())
        })?
        .parse()
}
