//! Registry integration

use crate::demuxer::{AviDemuxer, DemuxerConfig};
use transcode_containers::{Demuxer, InputFormat, MediaSource, PROBE_SCORE_MAX};

/// Score `buf` as the start of an AVI file.
pub fn probe(buf: &[u8]) -> u32 {
    if buf.len() <= 32 {
        return 0;
    }
    if &buf[0..4] == b"RIFF" && &buf[8..12] == b"AVI " {
        PROBE_SCORE_MAX
    } else {
        0
    }
}

/// AVI input format for a [`FormatRegistry`](transcode_containers::FormatRegistry).
#[derive(Debug, Clone, Default)]
pub struct AviInputFormat {
    config: DemuxerConfig,
}

impl AviInputFormat {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open demuxers with `config`.
    pub fn with_config(config: DemuxerConfig) -> Self {
        AviInputFormat { config }
    }
}

impl InputFormat for AviInputFormat {
    fn name(&self) -> &'static str {
        "avi"
    }

    fn probe(&self, buf: &[u8]) -> u32 {
        probe(buf)
    }

    fn open(&self, source: Box<dyn MediaSource>) -> transcode_core::Result<Box<dyn Demuxer>> {
        let demuxer = AviDemuxer::with_config(source, self.config.clone())?;
        Ok(Box::new(demuxer))
    }
}
