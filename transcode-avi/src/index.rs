//! Per-stream index and idx1 loading
//!
//! Each stream keeps its index entries ordered by timestamp. The table is
//! filled from the legacy `idx1` chunk after the header has been parsed, and
//! is used both to pick the next packet of a non-interleaved file and to find
//! keyframes.

use crate::chunks::{chunk_ids, ChunkHeader, IndexRecord};
use crate::error::Result;
use crate::io::ByteReader;
use crate::stream::AviStream;
use bitflags::bitflags;
use std::io::{self, Read, Seek};
use tracing::{debug, warn};

bitflags! {
    /// Timestamp search behavior.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SearchFlags: u32 {
        /// Return the last entry at or before the target instead of the
        /// first entry at or after it.
        const BACKWARD = 0x1;
        /// Accept non-keyframe entries.
        const ANY = 0x4;
    }
}

/// One indexed chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    /// Absolute offset of the chunk header.
    pub pos: u64,
    /// Frame number, or sample number for fixed-size streams.
    pub timestamp: i64,
    /// Payload size in bytes.
    pub size: u32,
    pub keyframe: bool,
}

/// Timestamp-ordered index of one stream.
#[derive(Debug, Clone, Default)]
pub struct IndexTable {
    entries: Vec<IndexEntry>,
}

impl IndexTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&IndexEntry> {
        self.entries.get(index)
    }

    pub fn first(&self) -> Option<&IndexEntry> {
        self.entries.first()
    }

    pub fn last(&self) -> Option<&IndexEntry> {
        self.entries.last()
    }

    /// Insert `entry` in timestamp order.
    ///
    /// An existing entry with the same timestamp is replaced. Returns the
    /// slot the entry ended up in.
    pub fn add_entry(&mut self, entry: IndexEntry) -> usize {
        match self.search(entry.timestamp, SearchFlags::ANY) {
            None => {
                self.entries.push(entry);
                self.entries.len() - 1
            }
            Some(slot) if self.entries[slot].timestamp == entry.timestamp => {
                self.entries[slot] = entry;
                slot
            }
            Some(slot) => {
                self.entries.insert(slot, entry);
                slot
            }
        }
    }

    /// Find the entry for `timestamp`.
    ///
    /// Without [`SearchFlags::BACKWARD`] this is the first entry at or after
    /// the target, otherwise the last entry at or before it. Without
    /// [`SearchFlags::ANY`] the result is moved to the nearest keyframe in the
    /// search direction.
    pub fn search(&self, timestamp: i64, flags: SearchFlags) -> Option<usize> {
        let len = self.entries.len() as isize;
        let backward = flags.contains(SearchFlags::BACKWARD);

        let mut a: isize = -1;
        let mut b: isize = len;
        while b - a > 1 {
            let m = (a + b) / 2;
            let ts = self.entries[m as usize].timestamp;
            if ts >= timestamp {
                b = m;
            }
            if ts <= timestamp {
                a = m;
            }
        }

        let mut m = if backward { a } else { b };
        if !flags.contains(SearchFlags::ANY) {
            let step = if backward { -1 } else { 1 };
            while m >= 0 && m < len && !self.entries[m as usize].keyframe {
                m += step;
            }
        }

        if m < 0 || m >= len {
            None
        } else {
            Some(m as usize)
        }
    }

    /// Split a lone entry of a fixed-size stream into keyframe blocks of at
    /// least 1024 bytes.
    ///
    /// Returns false when the table does not have exactly one entry or the
    /// stream is variable-size.
    pub fn split_single_block(&mut self, sample_size: u32) -> bool {
        if self.entries.len() != 1 || sample_size == 0 {
            return false;
        }

        let mut block = sample_size as u64;
        while block < 1024 {
            block += block;
        }

        let whole = self.entries[0];
        let size = whole.size as u64;
        let mut offset = 0u64;
        while offset < size {
            self.add_entry(IndexEntry {
                pos: whole.pos + offset,
                timestamp: whole.timestamp + (offset / sample_size as u64) as i64,
                size: block.min(size - offset) as u32,
                keyframe: true,
            });
            offset += block;
        }
        true
    }
}

fn is_eof(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::UnexpectedEof
}

/// Load the `idx1` chunk that follows the movi list.
///
/// The reader position is restored afterwards. Returns true when the index
/// lists the same chunk twice in a row, which marks the file non-interleaved.
pub(crate) fn load_index<R: Read + Seek>(
    reader: &mut ByteReader<R>,
    movi_list: u64,
    movi_end: u64,
    streams: &mut [AviStream],
) -> Result<bool> {
    let saved = reader.position();
    reader.seek(movi_end)?;

    let mut duplicates = false;
    while !reader.is_eof() {
        let header = match ChunkHeader::read(reader) {
            Ok(header) => header,
            Err(e) if is_eof(&e) => break,
            Err(e) => return Err(e.into()),
        };

        if header.id == chunk_ids::IDX1 && header.size as u64 >= IndexRecord::SIZE {
            duplicates = read_idx1(reader, header.size, movi_list, movi_end, streams)?;
            break;
        }
        reader.skip(header.padded_size())?;
    }

    reader.seek(saved)?;
    Ok(duplicates)
}

fn read_idx1<R: Read + Seek>(
    reader: &mut ByteReader<R>,
    size: u32,
    movi_list: u64,
    movi_end: u64,
    streams: &mut [AviStream],
) -> Result<bool> {
    let count = size as u64 / IndexRecord::SIZE;
    let mut base = movi_list;
    let mut last_pos = None;
    let mut duplicates = false;

    for i in 0..count {
        let record = match IndexRecord::read(reader) {
            Ok(record) => record,
            Err(e) if is_eof(&e) => {
                warn!("idx1 truncated after {} of {} records", i, count);
                break;
            }
            Err(e) => return Err(e.into()),
        };

        // The first record decides whether offsets are absolute.
        if i == 0 && record.offset as u64 > movi_list {
            base = 0;
        }
        let pos = record.offset as u64 + base;

        let Some(ordinal) = record
            .chunk_id
            .stream_ordinal()
            .filter(|&n| n < streams.len())
        else {
            continue;
        };
        let stream = &mut streams[ordinal];

        // A chunk cannot extend past the movi list.
        let room = movi_end.saturating_sub(pos).min(u32::MAX as u64) as u32;
        let chunk_size = record.size.min(room);
        if chunk_size < record.size {
            warn!(
                "idx1 record {} claims {} bytes at {}, only {} left in movi",
                i, record.size, pos, room
            );
        }

        if last_pos == Some(pos) {
            duplicates = true;
        } else {
            stream.index.add_entry(IndexEntry {
                pos,
                timestamp: stream.state.cum_len,
                size: chunk_size,
                keyframe: record.is_keyframe(),
            });
        }

        stream.state.cum_len += match stream.state.sample_size {
            0 => 1,
            ss => (chunk_size / ss) as i64,
        };
        last_pos = Some(pos);
    }

    debug!("Loaded idx1: {} records, absolute offsets: {}", count, base == 0);
    Ok(duplicates)
}

/// Check whether the streams are laid out one after another.
///
/// True when some stream starts after another stream has ended.
pub fn guess_non_interleaved(streams: &[AviStream]) -> bool {
    let mut last_start = 0u64;
    let mut first_end = u64::MAX;

    for stream in streams {
        if let (Some(first), Some(last)) = (stream.index.first(), stream.index.last()) {
            last_start = last_start.max(first.pos);
            first_end = first_end.min(last.pos);
        }
    }
    last_start > first_end
}

/// Split single-entry indexes of fixed-size streams.
pub(crate) fn clean_index(streams: &mut [AviStream]) {
    for stream in streams.iter_mut() {
        let sample_size = stream.state.sample_size;
        if stream.index.split_single_block(sample_size) {
            debug!(
                "Stream {}: split single index entry into {} blocks",
                stream.info.index,
                stream.index.len()
            );
        }
    }
}
