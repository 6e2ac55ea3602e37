//! Single-file archive of named arrays, scalars and strings.
//!
//! Layout on disk is a `bincode` encoding of [`Archive`]: an 8-byte magic tag,
//! a format version and a map of named entries. Floats are stored as raw IEEE
//! bits, so a save/load round trip is exact.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use bicycler_core::{SimError, SimResult};
use bincode::Options;
use serde::{Deserialize, Serialize};

const MAGIC: [u8; 8] = *b"BICYCLER";
const FORMAT_VERSION: u32 = 1;

/// One named value in an archive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Entry {
    /// Dense row-major array.
    Array { shape: Vec<usize>, values: Vec<f64> },
    Scalar(f64),
    Text(String),
}

impl Entry {
    fn kind(&self) -> &'static str {
        match self {
            Self::Array { .. } => "array",
            Self::Scalar(_) => "scalar",
            Self::Text(_) => "text",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Archive {
    magic: [u8; 8],
    version: u32,
    entries: BTreeMap<String, Entry>,
}

impl Default for Archive {
    fn default() -> Self {
        Self {
            magic: MAGIC,
            version: FORMAT_VERSION,
            entries: BTreeMap::new(),
        }
    }
}

impl Archive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, entry: Entry) {
        self.entries.insert(name.into(), entry);
    }

    pub fn get(&self, name: &str) -> Option<&Entry> {
        self.entries.get(name)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &Entry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Required array entry, returned as `(shape, values)`.
    pub fn array(&self, name: &str) -> SimResult<(&[usize], &[f64])> {
        match self.require(name)? {
            Entry::Array { shape, values } => {
                let expected = shape
                    .iter()
                    .try_fold(1usize, |n, &d| n.checked_mul(d))
                    .ok_or_else(|| {
                        SimError::format(format!(
                            "array \"{name}\" has shape {shape:?}, too many elements"
                        ))
                    })?;
                if expected != values.len() {
                    return Err(SimError::format(format!(
                        "array \"{name}\" has shape {shape:?} but {} values",
                        values.len()
                    )));
                }
                Ok((shape, values))
            }
            other => Err(wrong_kind(name, "array", other)),
        }
    }

    /// Required scalar entry.
    pub fn scalar(&self, name: &str) -> SimResult<f64> {
        match self.require(name)? {
            Entry::Scalar(value) => Ok(*value),
            other => Err(wrong_kind(name, "scalar", other)),
        }
    }

    fn require(&self, name: &str) -> SimResult<&Entry> {
        self.entries
            .get(name)
            .ok_or_else(|| SimError::format(format!("missing required field \"{name}\"")))
    }

    pub fn save(&self, path: &Path) -> SimResult<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        codec(u64::MAX)
            .serialize_into(&mut writer, self)
            .map_err(|e| SimError::serialization(format!("encoding archive failed: {e}")))?;
        writer.flush()?;
        Ok(())
    }

    pub fn load(path: &Path) -> SimResult<Self> {
        let file = File::open(path)?;
        // No length prefix may claim more bytes than the file holds
        let limit = file.metadata()?.len();
        let reader = BufReader::new(file);
        let archive: Self = codec(limit).deserialize_from(reader).map_err(|e| {
            SimError::format(format!("{} is not a bicycler archive: {e}", path.display()))
        })?;
        if archive.magic != MAGIC {
            return Err(SimError::format(format!(
                "{} is not a bicycler archive",
                path.display()
            )));
        }
        if archive.version != FORMAT_VERSION {
            return Err(SimError::format(format!(
                "unsupported archive version {} (expected {FORMAT_VERSION})",
                archive.version
            )));
        }
        Ok(archive)
    }
}

/// Fixed-width little-endian encoding, with every read bounded by `limit` bytes.
fn codec(limit: u64) -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .allow_trailing_bytes()
        .with_limit(limit)
}

fn wrong_kind(name: &str, expected: &str, found: &Entry) -> SimError {
    SimError::format(format!(
        "field \"{name}\" should be {expected}, found {}",
        found.kind()
    ))
}
