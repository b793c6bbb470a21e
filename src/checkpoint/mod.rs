//! Content-addressed checkpoint cache
//!
//! Each stage output lives in `<root>/checkpoints/<sha256-hex>/`, where
//! the address is a pure function of the stage's logical inputs. Chains
//! feed each predecessor's materialized files into the next address, so
//! changed upstream bytes invalidate every downstream stage.
//!
//! # Cache States
//!
//! | State | Payload | Marker | Description |
//! |-------|---------|--------|-------------|
//! | Miss | none | - | No directory, or an empty one |
//! | Building | some | no | In progress, or interrupted mid-write |
//! | Complete | some | yes | Sealed after the last write |
//!
//! # Limitations
//!
//! There are no locks: probing and writing back are a check-then-act
//! sequence, so two processes computing the same address concurrently
//! may interleave partial writes. Pipeline runs that can collide on an
//! address must be serialized by the caller. A `Building` directory
//! left by an interrupted run still satisfies [`Checkpoint::exists`];
//! enable `checkpoints.require-complete` to treat it as a miss.

pub mod chain;
pub mod io;
pub mod slot;

pub use chain::CheckpointChain;
pub use io::{CheckpointReader, CheckpointWriter};
pub use slot::{Checkpoint, CheckpointScope, Dependency};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel written last by [`Checkpoint::seal`]
pub const COMPLETE_MARKER: &str = ".ckpt-complete";

/// State of a checkpoint directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointState {
    /// Nothing cached
    Miss,
    /// Payload present but never sealed
    Building,
    /// Payload sealed
    Complete,
}

impl CheckpointState {
    /// Whether the cached payload can be restored under the given policy
    pub fn is_hit(&self, require_complete: bool) -> bool {
        match self {
            Self::Miss => false,
            Self::Building => !require_complete,
            Self::Complete => true,
        }
    }
}

impl fmt::Display for CheckpointState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Miss => write!(f, "miss"),
            Self::Building => write!(f, "building"),
            Self::Complete => write!(f, "complete"),
        }
    }
}
