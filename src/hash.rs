//! Deterministic hashing of heterogeneous values
//!
//! Every address in ckpt (checkpoint directories, experiment records)
//! is a SHA256 hex digest produced here. Inputs are fed in a fixed
//! order so the digest is a pure function of logical content: config
//! entries are sorted by key, files are read by content.

use crate::error::{CkptError, CkptResult};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

/// Flat key/value parameters, hashed independent of insertion order
pub type ParamMap = serde_json::Map<String, Value>;

/// Streaming SHA256 accumulator
#[derive(Debug, Clone, Default)]
pub struct HashEngine {
    hasher: Sha256,
}

impl HashEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update_bytes(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    pub fn update_str(&mut self, s: &str) {
        self.hasher.update(s.as_bytes());
    }

    /// Feed `key` then `value` for each entry, sorted by key
    pub fn update_params(&mut self, params: &ParamMap) {
        let mut entries: Vec<_> = params.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));

        for (key, value) in entries {
            self.update_str(key);
            self.update_str(&scalar_repr(value));
        }
    }

    /// Feed the full contents of a file
    pub fn update_file(&mut self, path: &Path) -> CkptResult<()> {
        let mut file = File::open(path).map_err(|e| CkptError::dependency(path, e))?;
        io::copy(&mut file, &mut self.hasher).map_err(|e| CkptError::dependency(path, e))?;
        Ok(())
    }

    /// Hex-encoded digest
    pub fn finalize(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}

/// String form of a scalar as fed to the hasher
///
/// Strings are used verbatim (no JSON quotes); everything else uses its
/// JSON rendering.
pub fn scalar_repr(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Digest of any serializable value through its JSON encoding
///
/// Used for opaque inputs such as in-memory training data.
pub fn digest_of<T: Serialize + ?Sized>(value: &T) -> CkptResult<String> {
    let bytes = serde_json::to_vec(value)?;
    let mut engine = HashEngine::new();
    engine.update_bytes(&bytes);
    Ok(engine.finalize())
}

/// All regular files below `dir`, sorted by path
///
/// A missing directory yields an empty listing.
pub fn sorted_files(dir: &Path) -> CkptResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    if dir.is_dir() {
        collect_files(dir, &mut files)?;
    }
    files.sort();
    Ok(files)
}

fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) -> CkptResult<()> {
    let entries = fs::read_dir(dir)
        .map_err(|e| CkptError::io(format!("listing {}", dir.display()), e))?;

    for entry in entries {
        let entry =
            entry.map_err(|e| CkptError::io(format!("listing {}", dir.display()), e))?;
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, files)?;
        } else {
            files.push(path);
        }
    }

    Ok(())
}
