//! Per-stream descriptor and read state

use crate::index::IndexTable;
use crate::types::{Palette, StreamHeader};
use transcode_containers::{StreamInfo, TrackType};

/// Read-side bookkeeping for one stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamState {
    /// Frames (variable-size streams) or bytes (fixed-size streams) delivered
    /// so far, offset by the declared start.
    pub frame_offset: i64,
    /// Payload bytes left in the active chunk.
    pub remaining: u32,
    /// Size of the active chunk as recorded when it was selected.
    pub packet_size: u32,
    /// Bytes per sample, 0 for variable-size streams.
    pub sample_size: u32,
    pub scale: u32,
    pub rate: u32,
    /// Running length while the index is loaded.
    pub cum_len: i64,
    /// Last accepted two-character class, as `c2 * 256 + c3`.
    pub prefix: u32,
    /// Consecutive chunks accepted with `prefix`.
    pub prefix_count: u32,
}

impl StreamState {
    /// Frame or sample number of the next packet.
    pub fn next_timestamp(&self) -> i64 {
        if self.sample_size > 0 {
            self.frame_offset / self.sample_size as i64
        } else {
            self.frame_offset
        }
    }

    /// Upper bound for one delivery from this stream.
    pub fn delivery_size(&self) -> u32 {
        let bound = match self.sample_size {
            0 | 1 => u32::MAX,
            ss if ss < 32 => 64 * ss,
            ss => ss,
        };
        bound.min(self.remaining)
    }
}

/// One elementary stream of an AVI file.
#[derive(Debug, Clone, Default)]
pub struct AviStream {
    pub(crate) info: StreamInfo,
    pub(crate) header: StreamHeader,
    pub(crate) palette: Option<Palette>,
    pub(crate) index: IndexTable,
    pub(crate) state: StreamState,
}

impl AviStream {
    pub(crate) fn new(index: usize) -> Self {
        AviStream {
            info: StreamInfo {
                index,
                ..StreamInfo::default()
            },
            ..AviStream::default()
        }
    }

    /// Codec parameters.
    pub fn info(&self) -> &StreamInfo {
        &self.info
    }

    /// Raw strh fields.
    pub fn header(&self) -> &StreamHeader {
        &self.header
    }

    /// Palette for paletted video.
    pub fn palette(&self) -> Option<&Palette> {
        self.palette.as_ref()
    }

    /// Mutable palette, for consumers that acknowledge updates.
    pub fn palette_mut(&mut self) -> Option<&mut Palette> {
        self.palette.as_mut()
    }

    /// Byte-position index.
    pub fn index(&self) -> &IndexTable {
        &self.index
    }

    /// Read state.
    pub fn state(&self) -> &StreamState {
        &self.state
    }

    pub fn track_type(&self) -> TrackType {
        self.info.track_type
    }

    pub fn is_video(&self) -> bool {
        self.info.track_type == TrackType::Video
    }

    pub fn sample_size(&self) -> u32 {
        self.state.sample_size
    }
}
