//! Payload file handles with optional gzip compression
//!
//! Compression is a pass-through layer: it changes the on-disk filename
//! and bytes but plays no part in address computation.

use crate::config::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};

/// Write handle for a file inside a checkpoint directory
///
/// Call [`CheckpointWriter::finish`] to surface errors from the final
/// flush; dropping the writer flushes on a best-effort basis.
pub enum CheckpointWriter {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
}

impl CheckpointWriter {
    pub(crate) fn new(file: File, compression: Compression) -> Self {
        let inner = BufWriter::new(file);
        match compression {
            Compression::None => Self::Plain(inner),
            Compression::Gzip => Self::Gzip(GzEncoder::new(inner, flate2::Compression::default())),
        }
    }

    /// Flush all buffered bytes, writing the gzip trailer if compressed
    pub fn finish(self) -> io::Result<()> {
        match self {
            Self::Plain(mut w) => w.flush(),
            Self::Gzip(encoder) => encoder.finish()?.flush(),
        }
    }
}

impl Write for CheckpointWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(w) => w.write(buf),
            Self::Gzip(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(w) => w.flush(),
            Self::Gzip(w) => w.flush(),
        }
    }
}

/// Read handle for a file inside a checkpoint directory
pub enum CheckpointReader {
    Plain(BufReader<File>),
    Gzip(GzDecoder<BufReader<File>>),
}

impl CheckpointReader {
    pub(crate) fn new(file: File, compression: Compression) -> Self {
        let inner = BufReader::new(file);
        match compression {
            Compression::None => Self::Plain(inner),
            Compression::Gzip => Self::Gzip(GzDecoder::new(inner)),
        }
    }
}

impl Read for CheckpointReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Plain(r) => r.read(buf),
            Self::Gzip(r) => r.read(buf),
        }
    }
}
