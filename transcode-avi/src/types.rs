//! AVI header structures

use crate::chunks::{stream_types, FourCC};
use bitflags::bitflags;

bitflags! {
    /// Main header flags (avih dwFlags)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct AviFlags: u32 {
        /// File has an idx1 chunk
        const HAS_INDEX = 0x0000_0010;
        /// Presentation order must follow the index, not the file layout
        const MUST_USE_INDEX = 0x0000_0020;
        /// File is interleaved
        const IS_INTERLEAVED = 0x0000_0100;
        /// Trust chunk type for seeking
        const TRUST_CK_TYPE = 0x0000_0800;
        /// File was captured
        const WAS_CAPTURE_FILE = 0x0001_0000;
        /// File is copyrighted
        const COPYRIGHTED = 0x0002_0000;
    }
}

/// AVI main header (avih chunk)
#[derive(Debug, Clone, Default)]
pub struct MainHeader {
    /// Microseconds per frame
    pub frame_period: u32,
    /// Maximum bytes per second
    pub max_bytes_per_sec: u32,
    /// AVI flags
    pub flags: AviFlags,
    /// Declared number of streams
    pub streams: u32,
}

impl MainHeader {
    /// Bit rate in bits per second
    pub fn bit_rate(&self) -> u64 {
        self.max_bytes_per_sec as u64 * 8
    }

    /// Calculate frame rate in fps
    pub fn frame_rate(&self) -> f64 {
        if self.frame_period > 0 {
            1_000_000.0 / self.frame_period as f64
        } else {
            0.0
        }
    }
}

/// Stream header (strh chunk)
#[derive(Debug, Clone, Default)]
pub struct StreamHeader {
    /// Stream type tag (vids, auds, txts, pads)
    pub fcc_type: FourCC,
    /// FourCC handler/codec
    pub handler: FourCC,
    /// Stream flags
    pub flags: u32,
    /// Priority
    pub priority: u16,
    /// Language
    pub language: u16,
    /// Initial frames
    pub initial_frames: u32,
    /// Time scale
    pub scale: u32,
    /// Rate (samples per second = rate/scale)
    pub rate: u32,
    /// Start time in stream ticks
    pub start: u32,
    /// Length (number of frames or audio samples)
    pub length: u32,
    /// Suggested buffer size
    pub suggested_buffer_size: u32,
    /// Quality (0-10000)
    pub quality: u32,
    /// Sample size (0 for variable)
    pub sample_size: u32,
}

/// Stream class declared by strh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamType {
    Video,
    Audio,
    Data,
    /// Padding stream, dropped from the stream list
    Padding,
}

impl StreamType {
    pub fn from_fourcc(fourcc: FourCC) -> Option<Self> {
        match fourcc {
            stream_types::VIDS => Some(StreamType::Video),
            stream_types::AUDS => Some(StreamType::Audio),
            stream_types::TXTS => Some(StreamType::Data),
            stream_types::PADS => Some(StreamType::Padding),
            _ => None,
        }
    }
}

/// Number of entries in a stream palette
pub const PALETTE_SIZE: usize = 256;

/// Stream palette as packed `0x00RRGGBB` entries.
#[derive(Clone, PartialEq, Eq)]
pub struct Palette {
    entries: Box<[u32; PALETTE_SIZE]>,
    changed: bool,
}

impl Palette {
    /// All-black palette.
    pub fn new() -> Self {
        Palette {
            entries: Box::new([0; PALETTE_SIZE]),
            changed: false,
        }
    }

    /// Build from the little-endian u32 entries at the start of `data`.
    pub fn from_le_bytes(data: &[u8]) -> Self {
        let mut palette = Palette::new();
        let len = data.len().min(PALETTE_SIZE * 4);
        for (slot, raw) in palette.entries.iter_mut().zip(data[..len].chunks_exact(4)) {
            *slot = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
        }
        palette
    }

    /// Palette entries.
    pub fn entries(&self) -> &[u32; PALETTE_SIZE] {
        &self.entries
    }

    /// Set one entry. Indices past the palette are ignored.
    pub fn set(&mut self, index: usize, r: u8, g: u8, b: u8) {
        if let Some(slot) = self.entries.get_mut(index) {
            *slot = b as u32 | (g as u32) << 8 | (r as u32) << 16;
        }
    }

    /// True when an in-band update arrived since the flag was last cleared.
    pub fn is_changed(&self) -> bool {
        self.changed
    }

    pub fn mark_changed(&mut self) {
        self.changed = true;
    }

    pub fn clear_changed(&mut self) {
        self.changed = false;
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Palette {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Palette")
            .field("first", &self.entries[0])
            .field("changed", &self.changed)
            .finish()
    }
}
