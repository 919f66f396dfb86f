//! AVI demuxer
//!
//! Interleaved files are read front to back: a resynchronizing scanner finds
//! the next `##xx` chunk header in the movi list and its payload is handed
//! out, possibly split into several packets for fixed-size audio.
//! Non-interleaved files are read in timestamp order instead: every call
//! picks the stream that is furthest behind and jumps to its next chunk
//! through the index.

use crate::chunks::{chunk_ids, two_digit_ordinal};
use crate::error::{AviError, Result};
use crate::header;
use crate::index::SearchFlags;
use crate::io::ByteReader;
use crate::stream::AviStream;
use crate::types::{MainHeader, Palette};
use std::io::{self, Read, Seek};
use tracing::{debug, trace, warn};
use transcode_containers::{Demuxer, StreamInfo, TrackType};
use transcode_core::packet::Packet;
use transcode_core::rational::{rescale_rnd, Rational};
use transcode_core::timestamp::{TimeBase, Timestamp};

/// Largest number of streams a two-digit chunk ordinal can address.
pub const MAX_STREAMS: usize = 100;

/// Largest codec extra data blob read from a format chunk.
pub const MAX_EXTRADATA_SIZE: usize = (1 << 30) - 1;

/// Microseconds per second, the unit streams are compared in.
const TIME_BASE_US: i64 = 1_000_000;

/// Demuxer configuration
#[derive(Debug, Clone)]
pub struct DemuxerConfig {
    /// Reject files declaring more streams than this
    pub max_streams: usize,
    /// Skip extra data blobs larger than this
    pub max_extradata_size: usize,
    /// Whether to read the idx1 index
    pub load_index: bool,
}

impl Default for DemuxerConfig {
    fn default() -> Self {
        DemuxerConfig {
            max_streams: MAX_STREAMS,
            max_extradata_size: MAX_EXTRADATA_SIZE,
            load_index: true,
        }
    }
}

impl DemuxerConfig {
    /// Set the stream count limit
    pub fn with_max_streams(mut self, max_streams: usize) -> Self {
        self.max_streams = max_streams.min(MAX_STREAMS);
        self
    }

    /// Set the extra data size limit
    pub fn with_max_extradata_size(mut self, size: usize) -> Self {
        self.max_extradata_size = size.min(MAX_EXTRADATA_SIZE);
        self
    }

    /// Enable or disable index loading
    pub fn with_load_index(mut self, load_index: bool) -> Self {
        self.load_index = load_index;
        self
    }
}

/// AVI demuxer
pub struct AviDemuxer<R> {
    reader: ByteReader<R>,
    main: MainHeader,
    streams: Vec<AviStream>,
    riff_end: u64,
    movi_list: u64,
    movi_end: u64,
    non_interleaved: bool,
    /// Stream whose chunk is being delivered.
    active: Option<usize>,
    closed: bool,
}

impl<R: Read + Seek> AviDemuxer<R> {
    /// Open an AVI file with the default configuration.
    pub fn open(reader: R) -> Result<Self> {
        Self::with_config(reader, DemuxerConfig::default())
    }

    /// Open an AVI file.
    ///
    /// Parses the header and index. The first call to
    /// [`read_packet`](Self::read_packet) starts at the movi payload.
    pub fn with_config(reader: R, config: DemuxerConfig) -> Result<Self> {
        let mut reader = ByteReader::new(reader).map_err(|e| AviError::from(e).in_header(0))?;
        let parsed = header::read_header(&mut reader, &config)?;

        debug!(
            "Opened AVI: {} streams, movi {}..{}, non-interleaved: {}",
            parsed.streams.len(),
            parsed.movi_list,
            parsed.movi_end,
            parsed.non_interleaved
        );

        Ok(AviDemuxer {
            reader,
            main: parsed.main,
            streams: parsed.streams,
            riff_end: parsed.riff_end,
            movi_list: parsed.movi_list,
            movi_end: parsed.movi_end,
            non_interleaved: parsed.non_interleaved,
            active: None,
            closed: false,
        })
    }

    /// Main header fields.
    pub fn main_header(&self) -> &MainHeader {
        &self.main
    }

    /// All streams, by ordinal.
    pub fn streams(&self) -> &[AviStream] {
        &self.streams
    }

    /// Get a stream by ordinal.
    pub fn stream(&self, index: usize) -> Option<&AviStream> {
        self.streams.get(index)
    }

    /// Get a stream by ordinal, for acknowledging palette updates.
    pub fn stream_mut(&mut self, index: usize) -> Option<&mut AviStream> {
        self.streams.get_mut(index)
    }

    pub fn num_streams(&self) -> usize {
        self.streams.len()
    }

    /// True when packets are scheduled by timestamp rather than file order.
    pub fn is_non_interleaved(&self) -> bool {
        self.non_interleaved
    }

    /// End of the RIFF chunk.
    pub fn riff_end(&self) -> u64 {
        self.riff_end
    }

    /// Offset of the `movi` list type.
    pub fn movi_list(&self) -> u64 {
        self.movi_list
    }

    /// End of the movi list.
    pub fn movi_end(&self) -> u64 {
        self.movi_end
    }

    /// Stream of the chunk currently being delivered.
    pub fn active_stream(&self) -> Option<usize> {
        self.active
    }

    /// Read the next packet.
    ///
    /// Returns `Ok(None)` at end of stream.
    pub fn read_packet(&mut self) -> Result<Option<Packet>> {
        if self.closed {
            return Ok(None);
        }
        if self.non_interleaved && !self.select_next_stream()? {
            trace!("All indexed streams exhausted");
            return Ok(None);
        }

        loop {
            if let Some(active) = self.active {
                return self.deliver(active);
            }
            if !self.resync()? {
                trace!("No further chunks before offset {}", self.movi_end);
                return Ok(None);
            }
        }
    }

    /// Search the index of `stream` for `timestamp`.
    pub fn search_timestamp(
        &self,
        stream: usize,
        timestamp: i64,
        flags: SearchFlags,
    ) -> Option<usize> {
        self.streams.get(stream)?.index.search(timestamp, flags)
    }

    /// Reposition all streams at the index entry of `stream` for `timestamp`.
    ///
    /// `timestamp` is in the stream's time base. Other streams with an index
    /// move to their last entry at or before the same instant.
    pub fn seek(&mut self, stream: usize, timestamp: i64, flags: SearchFlags) -> Result<()> {
        let target = self
            .streams
            .get(stream)
            .ok_or(AviError::StreamNotFound(stream))?;
        if target.index.is_empty() {
            return Err(AviError::SeekFailed(format!("stream {} has no index", stream)));
        }
        let entry = target
            .index
            .search(timestamp, flags)
            .and_then(|i| target.index.get(i).copied())
            .ok_or_else(|| {
                AviError::SeekFailed(format!(
                    "no index entry for timestamp {} in stream {}",
                    timestamp, stream
                ))
            })?;
        let instant = to_microseconds(entry.timestamp, target.info.time_base);

        for (k, other) in self.streams.iter_mut().enumerate() {
            let state = &mut other.state;
            state.remaining = 0;
            state.packet_size = 0;
            let unit = state.sample_size.max(1) as i64;

            if k == stream {
                state.frame_offset = entry.timestamp * unit;
            } else if !other.index.is_empty() {
                let ts = from_microseconds(instant, other.info.time_base);
                let other_flags = if other.info.track_type == TrackType::Video {
                    SearchFlags::BACKWARD
                } else {
                    SearchFlags::BACKWARD | SearchFlags::ANY
                };
                let slot = other.index.search(ts, other_flags).unwrap_or(0);
                if let Some(e) = other.index.get(slot) {
                    state.frame_offset = e.timestamp * unit;
                }
            }
        }

        self.reader.seek(entry.pos)?;
        self.active = None;
        debug!("Seeked stream {} to timestamp {} at offset {}", stream, entry.timestamp, entry.pos);
        Ok(())
    }

    /// Release all stream state. Later reads return end of stream.
    pub fn close(&mut self) {
        self.streams = Vec::new();
        self.active = None;
        self.closed = true;
    }

    /// Point the reader at the next chunk of the stream that is furthest
    /// behind. Leaves everything untouched when the index has no answer.
    ///
    /// Streams that have been read past their last index entry are not
    /// considered. Returns false once no stream is left.
    fn select_next_stream(&mut self) -> Result<bool> {
        let mut best_ts = i64::MAX;
        let mut best = None;
        for (i, stream) in self.streams.iter().enumerate() {
            let next = stream.state.next_timestamp();
            let exhausted = stream.state.remaining == 0
                && stream.index.last().map_or(false, |last| next > last.timestamp);
            if exhausted {
                continue;
            }
            let ts = to_microseconds(next, stream.info.time_base);
            if ts < best_ts {
                best_ts = ts;
                best = Some(i);
            }
        }
        let Some(best) = best else {
            return Ok(false);
        };

        let stream = &self.streams[best];
        let target = from_microseconds(best_ts, stream.info.time_base);
        let flags = if stream.state.remaining > 0 {
            SearchFlags::ANY | SearchFlags::BACKWARD
        } else {
            SearchFlags::ANY
        };
        let Some(entry) = stream
            .index
            .search(target, flags)
            .and_then(|i| stream.index.get(i).copied())
        else {
            trace!("Stream {}: no index entry for {}, scanning", best, target);
            return Ok(true);
        };
        if entry.size == 0 && stream.state.sample_size > 0 {
            // Would never advance the stream clock.
            trace!("Stream {}: empty index entry at {}, scanning", best, entry.pos);
            return Ok(true);
        }

        let state = &stream.state;
        let pos = entry.pos + state.packet_size.saturating_sub(state.remaining) as u64 + 8;
        self.reader.seek(pos)?;
        self.active = Some(best);

        let state = &mut self.streams[best].state;
        if state.remaining == 0 {
            state.packet_size = entry.size;
            state.remaining = entry.size;
        }
        Ok(true)
    }

    /// Hand out the next piece of the active chunk.
    fn deliver(&mut self, index: usize) -> Result<Option<Packet>> {
        let stream = &mut self.streams[index];
        let size = stream.state.delivery_size() as usize;
        let pos = self.reader.position();

        // Never reserve more than the input can still supply.
        let available = self.reader.size().saturating_sub(pos);
        let capacity = size.min(usize::try_from(available).unwrap_or(usize::MAX));
        let mut data = Vec::new();
        data.try_reserve_exact(capacity)
            .map_err(|_| AviError::AllocationFailure { size: capacity })?;

        let read = self.reader.by_ref().take(size as u64).read_to_end(&mut data)?;

        let state = &mut stream.state;
        if read == 0 && size > 0 {
            trace!("Stream {}: input ended inside chunk at {}", index, pos);
            state.remaining = 0;
            state.packet_size = 0;
            self.active = None;
            return Ok(None);
        }

        let dts = state.next_timestamp();
        let keyframe = if stream.info.track_type != TrackType::Video || stream.index.is_empty() {
            true
        } else {
            stream
                .index
                .search(dts, SearchFlags::empty())
                .and_then(|i| stream.index.get(i))
                .map_or(false, |e| e.timestamp == state.frame_offset && e.keyframe)
        };

        state.frame_offset += match state.sample_size {
            0 => 1,
            _ => read as i64,
        };

        if read < size {
            warn!(
                "Stream {}: chunk truncated, got {} of {} bytes",
                index, read, size
            );
            state.remaining = 0;
            state.packet_size = 0;
            self.active = None;
        } else {
            state.remaining -= size as u32;
            if state.remaining == 0 {
                let odd = state.packet_size & 1 == 1;
                state.packet_size = 0;
                self.active = None;
                if odd {
                    self.reader.skip(1)?;
                }
            }
        }

        let time_base = TimeBase::from(stream.info.time_base);
        let mut packet = Packet::new(data)
            .with_stream_index(index as u32)
            .with_pos(pos)
            .with_timestamps(Timestamp::new(dts, time_base), Timestamp::new(dts, time_base));
        packet.set_keyframe(keyframe);

        trace!(
            "Packet: stream {} dts {} size {} pos {} key {}",
            index,
            dts,
            packet.size(),
            pos,
            keyframe
        );
        Ok(Some(packet))
    }

    /// Scan forward for the next chunk header.
    ///
    /// Returns true when the caller should try again (a chunk was accepted
    /// or a filler/palette chunk was consumed) and false at the end of the
    /// movi list.
    fn resync(&mut self) -> Result<bool> {
        let stream_count = self.streams.len();
        let mut window = [0u8; 8];
        let mut filled = 0usize;
        let sync = self.reader.position();
        let mut i = sync;

        while !self.reader.is_eof() && i < self.movi_end {
            let Some(byte) = self.reader.next_byte()? else {
                break;
            };
            window.copy_within(1.., 0);
            window[7] = byte;
            filled = (filled + 1).min(window.len());

            let at = i;
            i += 1;
            if filled < window.len() {
                continue;
            }

            let size = u32::from_le_bytes([window[4], window[5], window[6], window[7]]);
            if at + size as u64 > self.movi_end {
                continue;
            }

            let index_stream = two_digit_ordinal(window[2], window[3]);
            let is_index_chunk =
                &window[..2] == b"ix" && index_stream.map_or(false, |n| n < stream_count);
            if is_index_chunk || window[..4] == chunk_ids::JUNK.0 {
                let padded = (size as u64 + 1) & !1;
                trace!("Skipping {} bytes of {:?} at {}", padded, &window[..4], at - 7);
                self.reader.skip(padded)?;
                return Ok(true);
            }

            let Some(n) = two_digit_ordinal(window[0], window[1]).filter(|&n| n < stream_count)
            else {
                continue;
            };

            let class = window[2] as u32 * 256 + window[3] as u32;
            let state = &mut self.streams[n].state;
            let ascii = window[2] < 128 && window[3] < 128;
            if ((state.prefix_count < 5 || sync + 9 > at) && ascii) || class == state.prefix {
                if class == state.prefix {
                    state.prefix_count += 1;
                } else {
                    state.prefix = class;
                    state.prefix_count = 0;
                }
                state.packet_size = size.saturating_add(8);
                state.remaining = size;
                self.active = Some(n);
                trace!("Stream {}: chunk of {} bytes at {}", n, size, at - 7);
                return Ok(true);
            }

            if &window[2..4] == b"pc" {
                return match self.read_palette(n, size) {
                    Ok(()) => Ok(true),
                    Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                        warn!("Stream {}: palette change truncated", n);
                        Ok(false)
                    }
                    Err(e) => Err(e.into()),
                };
            }
        }
        Ok(false)
    }

    /// Apply an in-band palette change and skip the rest of its chunk.
    fn read_palette(&mut self, stream: usize, size: u32) -> io::Result<()> {
        let start = self.reader.position();
        let first = self.reader.read_byte()? as usize;
        let count = match self.reader.read_byte()? {
            0 => 256,
            n => n as usize,
        };
        let _flags = self.reader.read_le16()?;

        let palette = self.streams[stream].palette.get_or_insert_with(Palette::new);
        for k in first..first + count {
            let r = self.reader.read_byte()?;
            let g = self.reader.read_byte()?;
            let b = self.reader.read_byte()?;
            let _pad = self.reader.read_byte()?;
            palette.set(k, r, g, b);
        }
        palette.mark_changed();
        debug!("Stream {}: palette change of {} entries from {}", stream, count, first);

        let end = start + size as u64;
        let pos = self.reader.position();
        if end > pos {
            self.reader.skip(end - pos)?;
        }
        Ok(())
    }
}

/// Convert stream ticks to microseconds, rounding to nearest.
fn to_microseconds(ts: i64, time_base: Rational) -> i64 {
    rescale_rnd(ts, TIME_BASE_US * time_base.num, time_base.den)
}

/// Convert microseconds to stream ticks, rounding to nearest.
fn from_microseconds(us: i64, time_base: Rational) -> i64 {
    rescale_rnd(us, time_base.den, TIME_BASE_US * time_base.num)
}

impl<R: Read + Seek> Demuxer for AviDemuxer<R> {
    fn format_name(&self) -> &str {
        "avi"
    }

    fn num_streams(&self) -> usize {
        self.streams.len()
    }

    fn stream_info(&self, index: usize) -> Option<&StreamInfo> {
        self.streams.get(index).map(|s| &s.info)
    }

    fn read_packet(&mut self) -> transcode_core::Result<Option<Packet>> {
        AviDemuxer::read_packet(self).map_err(Into::into)
    }

    fn close(&mut self) {
        AviDemuxer::close(self)
    }
}
