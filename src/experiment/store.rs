//! On-disk experiment record store
//!
//! Records live under `<root>/experiments/` in two layouts:
//!
//! ```text
//! experiments/
//! ├── <sha256-hex>.json            # one versioned blob per record
//! └── <name>/<timestamp>/          # older layout, read-only
//!     ├── config.json
//!     └── metrics.json
//! ```

use crate::config::{mkdirp, Context};
use crate::error::{CkptError, CkptResult};
use crate::experiment::record::{ExperimentRecord, Metadata, Outcome, FORMAT_VERSION};
use crate::experiment::short_hash::ShortHashIndex;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Where a listed record came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordLocation {
    /// `<address>.json`
    Blob(PathBuf),
    /// `<name>/<timestamp>/` directory
    Legacy(PathBuf),
}

/// A record together with its address and location
#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub address: String,
    pub location: RecordLocation,
    pub record: ExperimentRecord,
}

/// Experiment records under one cache root
pub struct ExperimentStore {
    dir: PathBuf,
}

impl ExperimentStore {
    pub fn new(ctx: &Context) -> Self {
        Self {
            dir: ctx.experiments_dir(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn blob_path(&self, address: &str) -> PathBuf {
        self.dir.join(format!("{}.json", address))
    }

    /// Write `record` under its content address, replacing identical content
    pub fn save(&self, record: &ExperimentRecord) -> CkptResult<String> {
        record.validate()?;
        let address = record.content_address()?;
        mkdirp(&self.dir)?;

        let path = self.blob_path(&address);
        if path.exists() {
            debug!("Experiment {} already stored, overwriting", address);
        }

        let content = serde_json::to_vec_pretty(record)?;
        fs::write(&path, content)
            .map_err(|e| CkptError::io(format!("writing experiment {}", path.display()), e))?;

        info!("Saved experiment '{}' as {}", record.name, address);
        Ok(address)
    }

    /// Load a blob record by full address
    pub fn load(&self, address: &str) -> CkptResult<ExperimentRecord> {
        let path = self.blob_path(address);
        if !path.is_file() {
            return Err(CkptError::ExperimentNotFound(address.to_string()));
        }
        read_blob(&path)
    }

    /// All readable records in both layouts, oldest first
    pub fn list(&self) -> CkptResult<Vec<StoredRecord>> {
        if !self.dir.is_dir() {
            return Ok(vec![]);
        }

        let mut records = Vec::new();
        for path in read_dir_sorted(&self.dir)? {
            if path.is_dir() {
                records.extend(list_legacy(&path)?);
            } else if path.extension().is_some_and(|ext| ext == "json") {
                let Some(address) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                match read_blob(&path) {
                    Ok(record) => records.push(StoredRecord {
                        address: address.to_string(),
                        location: RecordLocation::Blob(path.clone()),
                        record,
                    }),
                    Err(e) => warn!("Skipping unreadable experiment {}: {}", path.display(), e),
                }
            }
        }

        records.sort_by(|a, b| {
            a.record
                .metadata
                .start_time
                .cmp(&b.record.metadata.start_time)
                .then_with(|| a.address.cmp(&b.address))
        });
        Ok(records)
    }

    /// Short-hash index over every listed record
    pub fn index(&self, min_len: usize) -> CkptResult<ShortHashIndex> {
        let records = self.list()?;
        Ok(ShortHashIndex::new(
            records.into_iter().map(|r| r.address),
            min_len,
        ))
    }

    /// Resolve a short or full id to exactly one stored record
    pub fn resolve(&self, id: &str) -> CkptResult<StoredRecord> {
        let records = self.list()?;
        let index = ShortHashIndex::new(records.iter().map(|r| r.address.clone()), 0);
        let address = index.resolve(id)?.to_string();

        match records.into_iter().find(|r| r.address == address) {
            Some(stored) => Ok(stored),
            None => Err(CkptError::ExperimentNotFound(address)),
        }
    }

    /// Delete a stored record
    pub fn remove(&self, stored: &StoredRecord) -> CkptResult<()> {
        match &stored.location {
            RecordLocation::Blob(path) => fs::remove_file(path)
                .map_err(|e| CkptError::io(format!("removing {}", path.display()), e))?,
            RecordLocation::Legacy(dir) => {
                fs::remove_dir_all(dir)
                    .map_err(|e| CkptError::io(format!("removing {}", dir.display()), e))?;
                // Drop the per-name directory once its last run is gone
                if let Some(parent) = dir.parent() {
                    let _ = fs::remove_dir(parent);
                }
            }
        }

        info!("Removed experiment {}", stored.address);
        Ok(())
    }
}

fn read_blob(path: &Path) -> CkptResult<ExperimentRecord> {
    let content = fs::read(path)
        .map_err(|e| CkptError::io(format!("reading experiment {}", path.display()), e))?;
    let value: Value = serde_json::from_slice(&content)?;

    let version = value.get("format-version").and_then(Value::as_u64);
    if version != Some(u64::from(FORMAT_VERSION)) {
        return Err(CkptError::UnsupportedFormat(format!(
            "{} has format version {:?}, expected {}",
            path.display(),
            version,
            FORMAT_VERSION
        )));
    }

    Ok(serde_json::from_value(value)?)
}

fn read_dir_sorted(dir: &Path) -> CkptResult<Vec<PathBuf>> {
    let entries =
        fs::read_dir(dir).map_err(|e| CkptError::io(format!("listing {}", dir.display()), e))?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| CkptError::io(format!("listing {}", dir.display()), e))?;
        paths.push(entry.path());
    }
    paths.sort();
    Ok(paths)
}

/// Runs stored as `<name>/<timestamp>/{config,metrics}.json`
fn list_legacy(name_dir: &Path) -> CkptResult<Vec<StoredRecord>> {
    let Some(name) = name_dir.file_name().and_then(|n| n.to_str()) else {
        return Ok(vec![]);
    };

    let mut records = Vec::new();
    for run_dir in read_dir_sorted(name_dir)? {
        if !run_dir.is_dir() {
            continue;
        }

        let record = match read_legacy(name, &run_dir) {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!("Nothing to report in {}", run_dir.display());
                continue;
            }
            Err(e) => {
                warn!("Skipping unreadable experiment {}: {}", run_dir.display(), e);
                continue;
            }
        };

        records.push(StoredRecord {
            address: record.content_address()?,
            location: RecordLocation::Legacy(run_dir),
            record,
        });
    }

    Ok(records)
}

fn read_legacy(name: &str, run_dir: &Path) -> CkptResult<Option<ExperimentRecord>> {
    let metrics_path = run_dir.join("metrics.json");
    let config_path = run_dir.join("config.json");
    if !metrics_path.is_file() || !config_path.is_file() {
        return Ok(None);
    }

    let metrics: Map<String, Value> = read_json(&metrics_path)?;
    let metrics: BTreeMap<String, f64> = metrics
        .into_iter()
        .filter_map(|(k, v)| v.as_f64().map(|v| (k, v)))
        .collect();
    if metrics.is_empty() {
        return Ok(None);
    }

    let configuration: Map<String, Value> = read_json(&config_path)?;
    let start_time = run_dir
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(parse_timestamp)
        .unwrap_or_default();

    let record = ExperimentRecord {
        format_version: FORMAT_VERSION,
        name: name.to_string(),
        configuration,
        metadata: Metadata {
            start_time,
            stop_time: None,
        },
        outcome: Some(Outcome::Metrics { metrics }),
        checkpoints: vec![],
    };
    record.validate()?;
    Ok(Some(record))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> CkptResult<T> {
    let content = fs::read(path)
        .map_err(|e| CkptError::io(format!("reading {}", path.display()), e))?;
    Ok(serde_json::from_slice(&content)?)
}

/// Seconds since the epoch, possibly fractional
fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let secs: f64 = s.parse().ok()?;
    let whole = secs.trunc();
    let nanos = ((secs - whole) * 1e9).round() as u32;
    DateTime::from_timestamp(whole as i64, nanos.min(999_999_999))
}
