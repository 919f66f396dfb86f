//! RIFF chunk identifiers and fixed-size records

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{self, Read};

/// FourCC (Four Character Code) identifier
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    /// Create from bytes
    pub const fn new(bytes: [u8; 4]) -> Self {
        FourCC(bytes)
    }

    /// Create from a little-endian u32, as stored in codec tag fields
    pub fn from_le_u32(value: u32) -> Self {
        FourCC(value.to_le_bytes())
    }

    /// Get as little-endian u32
    pub fn to_le_u32(self) -> u32 {
        u32::from_le_bytes(self.0)
    }

    /// Get as string
    pub fn as_str(&self) -> String {
        String::from_utf8_lossy(&self.0).to_string()
    }

    /// Get raw bytes
    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// Stream ordinal encoded in the first two bytes (`"01wb"` is 1).
    pub fn stream_ordinal(&self) -> Option<usize> {
        two_digit_ordinal(self.0[0], self.0[1])
    }

    /// Two-character class suffix (`dc`, `wb`, `pc`, ...).
    pub fn class(&self) -> [u8; 2] {
        [self.0[2], self.0[3]]
    }
}

impl std::fmt::Debug for FourCC {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FourCC(\"{}\")", self.as_str().escape_debug())
    }
}

impl std::fmt::Display for FourCC {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<[u8; 4]> for FourCC {
    fn from(bytes: [u8; 4]) -> Self {
        FourCC(bytes)
    }
}

impl From<&[u8; 4]> for FourCC {
    fn from(bytes: &[u8; 4]) -> Self {
        FourCC(*bytes)
    }
}

/// Decode a two-ASCII-digit stream ordinal.
pub fn two_digit_ordinal(tens: u8, units: u8) -> Option<usize> {
    if tens.is_ascii_digit() && units.is_ascii_digit() {
        Some(((tens - b'0') as usize) * 10 + (units - b'0') as usize)
    } else {
        None
    }
}

/// Well-known chunk IDs
pub mod chunk_ids {
    use super::FourCC;

    pub const RIFF: FourCC = FourCC(*b"RIFF");
    pub const AVI: FourCC = FourCC(*b"AVI ");
    pub const AVIX: FourCC = FourCC(*b"AVIX");
    pub const LIST: FourCC = FourCC(*b"LIST");
    pub const AVIH: FourCC = FourCC(*b"avih");
    pub const STRH: FourCC = FourCC(*b"strh");
    pub const STRF: FourCC = FourCC(*b"strf");
    pub const MOVI: FourCC = FourCC(*b"movi");
    pub const IDX1: FourCC = FourCC(*b"idx1");
    pub const JUNK: FourCC = FourCC(*b"JUNK");
}

/// Stream type tags found in `strh`
pub mod stream_types {
    use super::FourCC;

    pub const VIDS: FourCC = FourCC(*b"vids");
    pub const AUDS: FourCC = FourCC(*b"auds");
    pub const TXTS: FourCC = FourCC(*b"txts");
    pub const PADS: FourCC = FourCC(*b"pads");
}

/// Chunk header: fourCC plus little-endian payload size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    /// Chunk ID
    pub id: FourCC,
    /// Payload size (not including header or pad byte)
    pub size: u32,
}

impl ChunkHeader {
    /// Header size on disk
    pub const SIZE: u64 = 8;

    /// Read a chunk header
    pub fn read<R: Read>(reader: &mut R) -> io::Result<Self> {
        let mut id = [0u8; 4];
        reader.read_exact(&mut id)?;
        let size = reader.read_u32::<LittleEndian>()?;
        Ok(ChunkHeader {
            id: FourCC(id),
            size,
        })
    }

    /// Payload size rounded up to the RIFF word boundary
    pub fn padded_size(&self) -> u64 {
        (self.size as u64 + 1) & !1
    }
}

/// Raw `idx1` record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRecord {
    /// Chunk ID
    pub chunk_id: FourCC,
    /// Flags
    pub flags: u32,
    /// Chunk offset, absolute or relative to the movi list
    pub offset: u32,
    /// Size of chunk data
    pub size: u32,
}

impl IndexRecord {
    /// Record size on disk
    pub const SIZE: u64 = 16;

    /// AVIIF_KEYFRAME
    pub const KEYFRAME: u32 = 0x10;

    /// Read from a reader
    pub fn read<R: Read>(reader: &mut R) -> io::Result<Self> {
        let mut id = [0u8; 4];
        reader.read_exact(&mut id)?;
        Ok(IndexRecord {
            chunk_id: FourCC(id),
            flags: reader.read_u32::<LittleEndian>()?,
            offset: reader.read_u32::<LittleEndian>()?,
            size: reader.read_u32::<LittleEndian>()?,
        })
    }

    /// Check if this is a keyframe
    pub fn is_keyframe(&self) -> bool {
        (self.flags & Self::KEYFRAME) != 0
    }
}
