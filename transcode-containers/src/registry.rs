//! Input format registry.
//!
//! The registry is an ordinary value owned by the caller: build it once at
//! startup, register the formats you want, and hand it to whatever needs to
//! pick a demuxer for an input.

use crate::traits::{Demuxer, InputFormat, MediaSource};
use std::io::{Read, Seek, SeekFrom};
use transcode_core::error::{ContainerError, Result};

/// Number of bytes read from the input for probing.
pub const PROBE_BUF_SIZE: usize = 2048;

/// Explicit list of input formats, in registration order.
#[derive(Default)]
pub struct FormatRegistry {
    formats: Vec<Box<dyn InputFormat>>,
}

impl FormatRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a format. Earlier registrations win ties.
    pub fn register(&mut self, format: Box<dyn InputFormat>) -> &mut Self {
        tracing::debug!("Registered input format: {}", format.name());
        self.formats.push(format);
        self
    }

    /// Number of registered formats.
    pub fn len(&self) -> usize {
        self.formats.len()
    }

    /// Check if no format is registered.
    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }

    /// Names of the registered formats, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.formats.iter().map(|f| f.name())
    }

    /// Find a format by name.
    pub fn find(&self, name: &str) -> Option<&dyn InputFormat> {
        self.formats
            .iter()
            .find(|f| f.name() == name)
            .map(|f| f.as_ref())
    }

    /// Pick the highest-scoring format for `buf`.
    ///
    /// Returns `None` when every format scores zero.
    pub fn probe(&self, buf: &[u8]) -> Option<(&dyn InputFormat, u32)> {
        let mut best: Option<(&dyn InputFormat, u32)> = None;
        for format in &self.formats {
            let score = format.probe(buf);
            // Strict comparison keeps the earliest registration on ties.
            if score > best.map_or(0, |(_, s)| s) {
                best = Some((format.as_ref(), score));
            }
        }
        best
    }

    /// Probe `source` and open it with the best matching format.
    pub fn open(&self, mut source: Box<dyn MediaSource>) -> Result<Box<dyn Demuxer>> {
        let mut buf = Vec::with_capacity(PROBE_BUF_SIZE);
        (&mut source)
            .take(PROBE_BUF_SIZE as u64)
            .read_to_end(&mut buf)?;
        source.seek(SeekFrom::Start(0))?;

        let (format, score) = self
            .probe(&buf)
            .ok_or(ContainerError::UnknownFormat)?;
        tracing::debug!("Probed input as {} (score {})", format.name(), score);
        format.open(source)
    }
}
