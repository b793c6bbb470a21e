//! Minimal unique prefixes of content addresses
//!
//! Short ids are display identifiers only. They are recomputed from the
//! full set of stored addresses on every listing, so an id may grow as
//! experiments are added.

use crate::error::{CkptError, CkptResult};
use std::collections::BTreeSet;

/// Smallest `k >= min_len` such that all `k`-prefixes are distinct
///
/// `k` never exceeds the longest hash. Duplicates in `hashes` are
/// collapsed first.
pub fn unique_prefix_len<S: AsRef<str>>(hashes: &[S], min_len: usize) -> usize {
    let distinct: BTreeSet<&str> = hashes.iter().map(|h| h.as_ref()).collect();
    let longest = distinct.iter().map(|h| h.chars().count()).max().unwrap_or(0);

    let mut k = 1;
    while k < longest {
        let truncated: BTreeSet<&str> = distinct.iter().map(|h| prefix(h, k)).collect();
        if truncated.len() == distinct.len() {
            break;
        }
        k += 1;
    }

    k.max(min_len).min(longest.max(1))
}

/// First `k` characters of `hash`
pub fn prefix(hash: &str, k: usize) -> &str {
    match hash.char_indices().nth(k) {
        Some((end, _)) => &hash[..end],
        None => hash,
    }
}

/// Short ids for one listing of stored addresses
#[derive(Debug, Clone)]
pub struct ShortHashIndex {
    hashes: BTreeSet<String>,
    len: usize,
}

impl ShortHashIndex {
    pub fn new(hashes: impl IntoIterator<Item = String>, min_len: usize) -> Self {
        let hashes: BTreeSet<String> = hashes.into_iter().collect();
        let all: Vec<&String> = hashes.iter().collect();
        let len = unique_prefix_len(&all, min_len);
        Self { hashes, len }
    }

    /// Prefix length used for every id in this listing
    pub fn prefix_len(&self) -> usize {
        self.len
    }

    pub fn short<'a>(&self, hash: &'a str) -> &'a str {
        prefix(hash, self.len)
    }

    /// Resolve a user-typed id (any prefix length) to a full address
    pub fn resolve(&self, id: &str) -> CkptResult<&str> {
        if let Some(exact) = self.hashes.get(id) {
            return Ok(exact.as_str());
        }

        let matches: Vec<&String> = self.hashes.iter().filter(|h| h.starts_with(id)).collect();
        match matches.as_slice() {
            [] => Err(CkptError::ExperimentNotFound(id.to_string())),
            [single] => Ok(single.as_str()),
            _ => Err(CkptError::AmbiguousId {
                id: id.to_string(),
                matches: matches.into_iter().cloned().collect(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}
