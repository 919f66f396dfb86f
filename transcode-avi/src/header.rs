//! AVI header parsing
//!
//! Walks the RIFF chunk tree up to the `movi` list and builds one
//! [`AviStream`] per declared stream.

use crate::chunks::{chunk_ids, ChunkHeader, FourCC};
use crate::codec_tags;
use crate::demuxer::DemuxerConfig;
use crate::error::{AviError, Result};
use crate::index;
use crate::io::ByteReader;
use crate::stream::AviStream;
use crate::types::{AviFlags, MainHeader, Palette, StreamHeader, StreamType};
use std::io::{Read, Seek};
use tracing::{debug, warn};
use transcode_containers::{AudioStreamInfo, CodecId, TrackType, VideoStreamInfo};
use transcode_core::Rational;

/// Size of BITMAPINFOHEADER
const BITMAP_INFO_SIZE: u32 = 40;
/// Size of plain WAVEFORMAT
const WAVE_FORMAT_SIZE: u32 = 14;
/// Extra data at or above this size is never read
const EXTRADATA_LIMIT: u32 = 1 << 30;

/// Container-level results of the header walk.
#[derive(Debug)]
pub(crate) struct ParsedHeader {
    pub main: MainHeader,
    pub riff_end: u64,
    pub movi_list: u64,
    pub movi_end: u64,
    pub non_interleaved: bool,
    pub streams: Vec<AviStream>,
}

/// Parse everything up to the start of the movi payload, then load the index.
///
/// On success the reader is positioned just after the `movi` list type.
pub(crate) fn read_header<R: Read + Seek>(
    reader: &mut ByteReader<R>,
    config: &DemuxerConfig,
) -> Result<ParsedHeader> {
    let mut parsed =
        parse_chunks(reader, config).map_err(|e| e.in_header(reader.position()))?;

    if config.load_index {
        let duplicates = index::load_index(
            reader,
            parsed.movi_list,
            parsed.movi_end,
            &mut parsed.streams,
        )?;
        if duplicates {
            debug!("idx1 repeats chunk positions, treating file as non-interleaved");
        }
        parsed.non_interleaved |= duplicates;
    }

    if index::guess_non_interleaved(&parsed.streams) {
        debug!("Streams are stored one after another, treating file as non-interleaved");
        parsed.non_interleaved = true;
    }
    if parsed.non_interleaved {
        index::clean_index(&mut parsed.streams);
    }

    Ok(parsed)
}

/// Stream the next strf chunk belongs to.
#[derive(Debug, Clone, Copy)]
struct StrfTarget {
    stream: usize,
    kind: StreamType,
}

fn parse_chunks<R: Read + Seek>(
    reader: &mut ByteReader<R>,
    config: &DemuxerConfig,
) -> Result<ParsedHeader> {
    if reader.read_fourcc()? != chunk_ids::RIFF {
        return Err(AviError::malformed("missing RIFF signature"));
    }
    let riff_size = reader.read_le32()?;
    let riff_end = riff_size as u64 + reader.position();
    let form = reader.read_fourcc()?;
    if form != chunk_ids::AVI && form != chunk_ids::AVIX {
        return Err(AviError::malformed(format!("unexpected RIFF form type {}", form)));
    }
    debug!("Parsing AVI header, RIFF size: {}", riff_size);

    let mut main = MainHeader::default();
    let mut non_interleaved = false;
    let mut streams: Vec<AviStream> = Vec::new();
    let mut found = 0usize;
    let mut target: Option<StrfTarget> = None;

    loop {
        if reader.is_eof() {
            return Err(AviError::malformed("end of input before movi list"));
        }
        let chunk = ChunkHeader::read(reader)?;
        let start = reader.position();

        match chunk.id {
            chunk_ids::LIST => {
                let list_type = reader.read_fourcc()?;
                if list_type == chunk_ids::MOVI {
                    let movi_list = reader.position() - 4;
                    let movi_end = if chunk.size > 0 {
                        movi_list + chunk.size as u64
                    } else {
                        reader.size()
                    };
                    debug!("Found movi list at offset {}, ends at {}", movi_list, movi_end);

                    if found != streams.len() {
                        return Err(AviError::StreamCountMismatch {
                            declared: streams.len(),
                            found,
                        });
                    }
                    return Ok(ParsedHeader {
                        main,
                        riff_end,
                        movi_list,
                        movi_end,
                        non_interleaved,
                        streams,
                    });
                }
                // Other lists are entered, their children follow as a flat sequence.
            }
            chunk_ids::AVIH => {
                main = read_main_header(reader)?;
                non_interleaved |= main.flags.contains(AviFlags::MUST_USE_INDEX);

                let count = main.streams as usize;
                if count > config.max_streams {
                    return Err(AviError::malformed(format!(
                        "{} streams declared, at most {} supported",
                        count, config.max_streams
                    )));
                }
                let first = streams.len();
                streams.extend((first..first + count).map(|i| {
                    let mut stream = AviStream::new(i);
                    stream.info.bit_rate = main.bit_rate();
                    stream
                }));
                debug!(
                    "Main header: {} streams, frame period {} us",
                    count, main.frame_period
                );
                skip_to(reader, start + chunk.size as u64)?;
            }
            chunk_ids::STRH => {
                target = None;
                let fcc_type = reader.read_fourcc()?;
                let handler = reader.read_fourcc()?;

                if found >= streams.len() {
                    warn!("Ignoring stream header {} beyond declared count {}", found, streams.len());
                    found += 1;
                    skip_to(reader, start + chunk.size as u64)?;
                    continue;
                }

                let header = read_stream_header(reader, fcc_type, handler)?;
                let kind = StreamType::from_fourcc(fcc_type).ok_or_else(|| {
                    AviError::malformed(format!("unknown stream type {}", fcc_type))
                })?;

                if kind != StreamType::Padding {
                    setup_stream(&mut streams[found], header, kind, main.frame_period);
                    target = Some(StrfTarget {
                        stream: found,
                        kind,
                    });
                    found += 1;
                }
                skip_to(reader, start + chunk.size as u64)?;
            }
            chunk_ids::STRF => {
                if let Some(target) = target.take() {
                    let stream = &mut streams[target.stream];
                    match target.kind {
                        StreamType::Video => read_video_format(reader, stream, chunk.size, config)?,
                        StreamType::Audio => read_audio_format(reader, stream, chunk.size, config)?,
                        StreamType::Data | StreamType::Padding => {}
                    }
                }
                skip_to(reader, start + chunk.padded_size())?;
            }
            _ => {
                reader.skip(chunk.padded_size())?;
            }
        }
    }
}

/// Skip forward to `end`. Never moves backwards.
fn skip_to<R: Read + Seek>(reader: &mut ByteReader<R>, end: u64) -> Result<()> {
    let pos = reader.position();
    if end > pos {
        reader.skip(end - pos)?;
    }
    Ok(())
}

fn read_main_header<R: Read + Seek>(reader: &mut ByteReader<R>) -> Result<MainHeader> {
    let frame_period = reader.read_le32()?;
    let max_bytes_per_sec = reader.read_le32()?;
    let _padding_granularity = reader.read_le32()?;
    let flags = AviFlags::from_bits_retain(reader.read_le32()?);
    let _total_frames = reader.read_le32()?;
    let _initial_frames = reader.read_le32()?;
    let streams = reader.read_le32()?;

    Ok(MainHeader {
        frame_period,
        max_bytes_per_sec,
        flags,
        streams,
    })
}

fn read_stream_header<R: Read + Seek>(
    reader: &mut ByteReader<R>,
    fcc_type: FourCC,
    handler: FourCC,
) -> Result<StreamHeader> {
    Ok(StreamHeader {
        fcc_type,
        handler,
        flags: reader.read_le32()?,
        priority: reader.read_le16()?,
        language: reader.read_le16()?,
        initial_frames: reader.read_le32()?,
        scale: reader.read_le32()?,
        rate: reader.read_le32()?,
        start: reader.read_le32()?,
        length: reader.read_le32()?,
        suggested_buffer_size: reader.read_le32()?,
        quality: reader.read_le32()?,
        sample_size: reader.read_le32()?,
    })
}

fn setup_stream(stream: &mut AviStream, header: StreamHeader, kind: StreamType, frame_period: u32) {
    let (scale, rate) = if header.scale > 0 && header.rate > 0 {
        (header.scale, header.rate)
    } else if frame_period > 0 {
        (frame_period, 1_000_000)
    } else {
        (1, 25)
    };

    let state = &mut stream.state;
    state.scale = scale;
    state.rate = rate;
    state.sample_size = match kind {
        StreamType::Video => 0,
        _ => header.sample_size,
    };
    state.cum_len = header.start as i64;
    state.frame_offset = header.start as i64 * state.sample_size.max(1) as i64;

    let info = &mut stream.info;
    info.track_type = match kind {
        StreamType::Video => TrackType::Video,
        StreamType::Audio => TrackType::Audio,
        StreamType::Data | StreamType::Padding => TrackType::Data,
    };
    info.time_base = Rational::new(scale as i64, rate as i64).reduce();
    info.duration = Some(header.length as i64);

    debug!(
        "Stream {}: {} handler {} time base {} sample size {}",
        info.index, header.fcc_type, header.handler, info.time_base, state.sample_size
    );
    stream.header = header;
}

/// Read up to `len` bytes of extra data, failing if the input ends first.
fn read_extradata<R: Read + Seek>(reader: &mut ByteReader<R>, len: u32) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    reader.by_ref().take(len as u64).read_to_end(&mut data)?;
    if data.len() < len as usize {
        return Err(AviError::malformed(format!(
            "extra data truncated: {} of {} bytes",
            data.len(),
            len
        )));
    }
    Ok(data)
}

fn unknown_codec(class: &str, stream: usize, tag: u32) -> CodecId {
    warn!(
        "Stream {}: unsupported {} codec tag {:?} (0x{:08x})",
        stream,
        class,
        FourCC::from_le_u32(tag),
        tag
    );
    CodecId::None
}

fn read_video_format<R: Read + Seek>(
    reader: &mut ByteReader<R>,
    stream: &mut AviStream,
    size: u32,
    config: &DemuxerConfig,
) -> Result<()> {
    if size < BITMAP_INFO_SIZE {
        return Err(AviError::malformed(format!(
            "video format chunk too short: {} bytes",
            size
        )));
    }

    let _struct_size = reader.read_le32()?;
    let width = reader.read_le32()?;
    let height = reader.read_le32()? as i32;
    let _planes = reader.read_le16()?;
    let bit_depth = reader.read_le16()?;
    let tag = reader.read_le32()?;
    reader.skip(5 * 4)?;

    let extra = size - BITMAP_INFO_SIZE;
    if extra > 0 && size < EXTRADATA_LIMIT && extra as usize <= config.max_extradata_size {
        stream.info.extra_data = read_extradata(reader, extra)?;
    }

    if !stream.info.extra_data.is_empty() && bit_depth <= 8 {
        let mut palette = Palette::from_le_bytes(&stream.info.extra_data);
        palette.mark_changed();
        stream.palette = Some(palette);
    }

    let index = stream.info.index;
    stream.info.codec_tag = tag;
    stream.info.codec_id =
        codec_tags::video_codec(tag).unwrap_or_else(|| unknown_codec("video", index, tag));
    stream.info.video = Some(VideoStreamInfo {
        width,
        height,
        bit_depth,
    });
    Ok(())
}

fn read_audio_format<R: Read + Seek>(
    reader: &mut ByteReader<R>,
    stream: &mut AviStream,
    size: u32,
    config: &DemuxerConfig,
) -> Result<()> {
    if size < WAVE_FORMAT_SIZE {
        return Err(AviError::malformed(format!(
            "audio format chunk too short: {} bytes",
            size
        )));
    }

    let tag = reader.read_le16()? as u32;
    let channels = reader.read_le16()?;
    let sample_rate = reader.read_le32()?;
    let byte_rate = reader.read_le32()?;
    let block_align = reader.read_le16()?;
    let bits_per_sample = if size >= 16 { reader.read_le16()? } else { 8 };

    // WAVEFORMATEX: cbSize, clamped to what the chunk can hold.
    if size >= 18 {
        let declared = reader.read_le16()? as u32;
        let extra = declared.min(size - 18);
        if extra > 0 && extra as usize <= config.max_extradata_size {
            stream.info.extra_data = read_extradata(reader, extra)?;
        }
    }

    let index = stream.info.index;
    stream.info.codec_tag = tag;
    stream.info.codec_id =
        codec_tags::audio_codec(tag).unwrap_or_else(|| unknown_codec("audio", index, tag));
    stream.info.bit_rate = byte_rate as u64 * 8;
    stream.info.audio = Some(AudioStreamInfo {
        sample_rate,
        channels,
        block_align,
        bits_per_sample,
    });
    Ok(())
}
