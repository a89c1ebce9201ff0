use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::model::RawRecords;

/// Snapshot files the scraper and earlier exports leave behind, in lookup order.
pub const DEFAULT_DATA_FILES: &[&str] = &[
    "res.json",
    "res_detailed.json",
    "files/seLoger1.json",
    "resultats_tries.json",
];

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source unavailable: {}", .path.display())]
    Unavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed JSON in {}", .path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{} does not hold a JSON object of listings", .path.display())]
    NotAnObject { path: PathBuf },
    #[error("no data file found (looked for {})", DEFAULT_DATA_FILES.join(", "))]
    NoDataFile,
}

pub struct DataFile {
    pub path: PathBuf,
    pub entries: usize,
    pub modified: Option<SystemTime>,
}

// ── Loading ──

pub fn load_records(path: &Path) -> Result<RawRecords, SourceError> {
    let text = fs::read_to_string(path).map_err(|source| SourceError::Unavailable {
        path: path.to_path_buf(),
        source,
    })?;
    let value: Value = serde_json::from_str(&text).map_err(|source| SourceError::Malformed {
        path: path.to_path_buf(),
        source,
    })?;
    match value {
        Value::Object(records) => {
            info!("Loaded {} listings from {}", records.len(), path.display());
            Ok(records)
        }
        _ => Err(SourceError::NotAnObject {
            path: path.to_path_buf(),
        }),
    }
}

/// Default data files under `root` that exist and parse as a listing object.
pub fn discover(root: &Path) -> Vec<DataFile> {
    DEFAULT_DATA_FILES
        .iter()
        .map(|name| root.join(name))
        .filter(|p| p.is_file())
        .filter_map(|path| match load_records(&path) {
            Ok(records) => {
                let modified = fs::metadata(&path).and_then(|m| m.modified()).ok();
                Some(DataFile {
                    path,
                    entries: records.len(),
                    modified,
                })
            }
            Err(e) => {
                debug!("Ignoring {}: {}", path.display(), e);
                None
            }
        })
        .collect()
}

/// Explicit path if given, else the first readable default data file.
pub fn resolve_input(input: Option<&Path>, root: &Path) -> Result<PathBuf, SourceError> {
    match input {
        Some(p) => Ok(p.to_path_buf()),
        None => discover(root)
            .into_iter()
            .next()
            .map(|f| f.path)
            .ok_or(SourceError::NoDataFile),
    }
}

// ── Writing ──

/// UTF-8, non-ASCII kept as is, 2-space indent.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let file =
        fs::File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}
