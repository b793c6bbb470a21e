//! A single content-addressed cache slot

use crate::checkpoint::io::{CheckpointReader, CheckpointWriter};
use crate::checkpoint::{CheckpointState, COMPLETE_MARKER};
use crate::config::{mkdirp, Compression, Context};
use crate::error::{CkptError, CkptResult};
use crate::hash::{sorted_files, HashEngine, ParamMap};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::cell::OnceCell;
use std::fmt;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::ops::Deref;
use std::path::PathBuf;
use std::rc::{Rc, Weak};
use tracing::{debug, info, warn};

/// An extra input whose content affects a checkpoint's output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dependency {
    /// A file on disk, hashed by content
    File(PathBuf),
    /// A precomputed digest of an opaque in-memory value
    Digest(String),
}

impl Dependency {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "file:{}", path.display()),
            Self::Digest(digest) => write!(f, "digest:{}", digest),
        }
    }
}

/// One cached stage output, addressed by its logical inputs
///
/// The address is derived from the stage name, its parameters, the
/// content of its dependencies and the files currently materialized by
/// its predecessor. It is computed on first use and memoized, so a
/// checkpoint must not be asked for its address before its predecessor
/// has written its output.
///
/// The directory `<root>/checkpoints/<address>` is only created by the
/// first write.
pub struct Checkpoint {
    name: String,
    params: ParamMap,
    dependencies: Vec<Dependency>,
    predecessor: Option<Weak<Checkpoint>>,
    checkpoints_dir: PathBuf,
    compression: Compression,
    address: OnceCell<String>,
}

impl Checkpoint {
    pub fn new(ctx: &Context, name: impl Into<String>, params: ParamMap) -> Self {
        Self {
            name: name.into(),
            params,
            dependencies: Vec::new(),
            predecessor: None,
            checkpoints_dir: ctx.checkpoints_dir(),
            compression: ctx.config().checkpoints.compression,
            address: OnceCell::new(),
        }
    }

    pub fn with_dependencies(mut self, dependencies: Vec<Dependency>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn with_dependency(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    /// Chain this checkpoint after `predecessor` without owning it
    pub fn after(mut self, predecessor: &Rc<Checkpoint>) -> Self {
        self.predecessor = Some(Rc::downgrade(predecessor));
        self
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &ParamMap {
        &self.params
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    /// Hex SHA256 address, computed once
    pub fn address(&self) -> CkptResult<&str> {
        if let Some(address) = self.address.get() {
            return Ok(address);
        }
        let address = self.compute_address()?;
        Ok(self.address.get_or_init(|| address))
    }

    fn compute_address(&self) -> CkptResult<String> {
        let mut engine = HashEngine::new();
        engine.update_str(&self.name);
        engine.update_params(&self.params);

        for dependency in &self.dependencies {
            match dependency {
                Dependency::File(path) => engine.update_file(path)?,
                Dependency::Digest(digest) => engine.update_str(digest),
            }
        }

        if let Some(predecessor) = &self.predecessor {
            let predecessor = predecessor
                .upgrade()
                .ok_or_else(|| CkptError::PredecessorDropped(self.name.clone()))?;
            for file in predecessor.list_files()? {
                engine.update_file(&file)?;
            }
        }

        let address = engine.finalize();
        debug!("Checkpoint '{}' has address {}", self.name, address);
        Ok(address)
    }

    /// Directory holding this checkpoint's files
    pub fn path(&self) -> CkptResult<PathBuf> {
        Ok(self.checkpoints_dir.join(self.address()?))
    }

    /// Resolve a logical filename inside the checkpoint directory
    pub fn join_path(&self, filename: &str) -> CkptResult<PathBuf> {
        Ok(self.path()?.join(filename))
    }

    /// Payload files, sorted, excluding the completion marker
    pub fn list_files(&self) -> CkptResult<Vec<PathBuf>> {
        let dir = self.path()?;
        let marker = dir.join(COMPLETE_MARKER);
        Ok(sorted_files(&dir)?
            .into_iter()
            .filter(|file| *file != marker)
            .collect())
    }

    /// True iff the directory exists and holds at least one payload file
    pub fn exists(&self) -> CkptResult<bool> {
        Ok(!self.list_files()?.is_empty())
    }

    /// Whether [`Checkpoint::seal`] ran after the payload was written
    pub fn is_sealed(&self) -> CkptResult<bool> {
        Ok(self.join_path(COMPLETE_MARKER)?.is_file())
    }

    pub fn state(&self) -> CkptResult<CheckpointState> {
        if !self.exists()? {
            Ok(CheckpointState::Miss)
        } else if self.is_sealed()? {
            Ok(CheckpointState::Complete)
        } else {
            Ok(CheckpointState::Building)
        }
    }

    /// Enter a scope that removes the directory on exit if it is empty
    ///
    /// Probing never creates the directory.
    pub fn acquire(&self) -> CkptResult<CheckpointScope<'_>> {
        info!("Entering checkpoint '{}'", self.name);

        if self.exists()? {
            info!("Found checkpoint for {} at {}", self.name, self.path()?.display());
        }

        Ok(CheckpointScope { checkpoint: self })
    }

    /// Open `filename` for writing, creating the directory if needed
    pub fn open_for_write(&self, filename: &str) -> CkptResult<CheckpointWriter> {
        let dir = self.path()?;
        mkdirp(&dir)?;

        let path = self.payload_path(filename)?;
        if let Some(parent) = path.parent() {
            mkdirp(parent)?;
        }

        let file = File::create(&path)
            .map_err(|e| CkptError::io(format!("creating {}", path.display()), e))?;
        Ok(CheckpointWriter::new(file, self.compression))
    }

    /// Open `filename` for reading; a missing file is a caller error
    pub fn open_for_read(&self, filename: &str) -> CkptResult<CheckpointReader> {
        let path = self.payload_path(filename)?;
        if !path.is_file() {
            return Err(CkptError::CheckpointFileMissing(path));
        }

        let file = File::open(&path)
            .map_err(|e| CkptError::io(format!("opening {}", path.display()), e))?;
        Ok(CheckpointReader::new(file, self.compression))
    }

    pub fn write_bytes(&self, filename: &str, bytes: &[u8]) -> CkptResult<()> {
        let mut writer = self.open_for_write(filename)?;
        let context = || format!("writing {} to checkpoint {}", filename, self.name);
        writer
            .write_all(bytes)
            .map_err(|e| CkptError::io(context(), e))?;
        writer.finish().map_err(|e| CkptError::io(context(), e))
    }

    pub fn read_bytes(&self, filename: &str) -> CkptResult<Vec<u8>> {
        let mut reader = self.open_for_read(filename)?;
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).map_err(|e| {
            CkptError::io(format!("reading {} from checkpoint {}", filename, self.name), e)
        })?;
        Ok(bytes)
    }

    pub fn write_json<T: Serialize + ?Sized>(&self, filename: &str, value: &T) -> CkptResult<()> {
        let bytes = serde_json::to_vec(value)?;
        self.write_bytes(filename, &bytes)
    }

    pub fn read_json<T: DeserializeOwned>(&self, filename: &str) -> CkptResult<T> {
        let bytes = self.read_bytes(filename)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Mark the payload as fully written
    pub fn seal(&self) -> CkptResult<()> {
        let marker = self.join_path(COMPLETE_MARKER)?;
        if !self.exists()? {
            debug!("Not sealing empty checkpoint {}", self.name);
            return Ok(());
        }
        fs::write(&marker, b"")
            .map_err(|e| CkptError::io(format!("writing {}", marker.display()), e))
    }

    /// Delete the directory and everything in it
    pub fn clear(&self) -> CkptResult<()> {
        let dir = self.path()?;
        if dir.exists() {
            warn!("Clearing checkpoint {} at {}", self.name, dir.display());
            fs::remove_dir_all(&dir)
                .map_err(|e| CkptError::io(format!("removing {}", dir.display()), e))?;
        }
        Ok(())
    }

    /// Remove the directory if it holds no payload; returns whether it did
    pub fn remove_if_empty(&self) -> CkptResult<bool> {
        let dir = self.path()?;
        if !dir.is_dir() || self.exists()? {
            return Ok(false);
        }

        info!("Checkpoint dir for {} empty, removing.", self.name);
        fs::remove_dir_all(&dir)
            .map_err(|e| CkptError::io(format!("removing {}", dir.display()), e))?;
        Ok(true)
    }

    fn payload_path(&self, filename: &str) -> CkptResult<PathBuf> {
        let mut path = self.join_path(filename)?.into_os_string();
        path.push(self.compression.suffix());
        Ok(PathBuf::from(path))
    }
}

impl fmt::Debug for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Checkpoint")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("dependencies", &self.dependencies)
            .field("chained", &self.predecessor.is_some())
            .field("address", &self.address.get())
            .finish()
    }
}

/// Scoped acquisition of a [`Checkpoint`]
///
/// On drop, a directory that exists but holds no payload (the wrapped
/// computation failed before writing) is removed, so failed runs never
/// leave phantom cache hits behind. A partially written directory is
/// left in place.
pub struct CheckpointScope<'a> {
    checkpoint: &'a Checkpoint,
}

impl Deref for CheckpointScope<'_> {
    type Target = Checkpoint;

    fn deref(&self) -> &Checkpoint {
        self.checkpoint
    }
}

impl Drop for CheckpointScope<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.checkpoint.remove_if_empty() {
            warn!("Failed to clean up checkpoint {}: {}", self.checkpoint.name, e);
        }
    }
}
