//! Container format traits for demuxing.

use std::io::{Read, Seek};
use transcode_core::error::Result;
use transcode_core::packet::Packet;
use transcode_core::rational::Rational;

/// Highest confidence a probe can report.
pub const PROBE_SCORE_MAX: u32 = 100;

/// Track type in a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackType {
    /// Video track.
    Video,
    /// Audio track.
    Audio,
    /// Opaque data track (text, timecode, ...).
    Data,
    /// Unknown track type.
    #[default]
    Unknown,
}

/// Codec identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CodecId {
    /// No codec could be identified for the stream's tag.
    #[default]
    None,
    /// Uncompressed video.
    RawVideo,
    /// Microsoft RLE.
    MsRle,
    /// Microsoft Video 1.
    MsVideo1,
    /// Cinepak.
    Cinepak,
    /// Motion JPEG.
    Mjpeg,
    /// MPEG-4 Part 2 (DivX, Xvid).
    Mpeg4,
    /// MS MPEG-4 v2.
    MsMpeg4V2,
    /// MS MPEG-4 v3 (DivX ;-)).
    MsMpeg4V3,
    /// H.263.
    H263,
    /// H.264/AVC.
    H264,
    /// Huffyuv.
    HuffYuv,
    /// Linear PCM, little-endian.
    PcmS16Le,
    /// Microsoft ADPCM.
    AdpcmMs,
    /// IMA ADPCM (WAV flavour).
    AdpcmImaWav,
    /// A-law.
    PcmAlaw,
    /// mu-law.
    PcmMulaw,
    /// DSP Group TrueSpeech.
    TrueSpeech,
    /// MPEG audio layer 2.
    Mp2,
    /// MPEG audio layer 3.
    Mp3,
    /// AAC.
    Aac,
    /// Dolby AC-3.
    Ac3,
    /// DTS.
    Dts,
}

impl CodecId {
    /// Short lowercase name of the codec.
    pub fn name(&self) -> &'static str {
        match self {
            CodecId::None => "none",
            CodecId::RawVideo => "rawvideo",
            CodecId::MsRle => "msrle",
            CodecId::MsVideo1 => "msvideo1",
            CodecId::Cinepak => "cinepak",
            CodecId::Mjpeg => "mjpeg",
            CodecId::Mpeg4 => "mpeg4",
            CodecId::MsMpeg4V2 => "msmpeg4v2",
            CodecId::MsMpeg4V3 => "msmpeg4v3",
            CodecId::H263 => "h263",
            CodecId::H264 => "h264",
            CodecId::HuffYuv => "huffyuv",
            CodecId::PcmS16Le => "pcm_s16le",
            CodecId::AdpcmMs => "adpcm_ms",
            CodecId::AdpcmImaWav => "adpcm_ima_wav",
            CodecId::PcmAlaw => "pcm_alaw",
            CodecId::PcmMulaw => "pcm_mulaw",
            CodecId::TrueSpeech => "truespeech",
            CodecId::Mp2 => "mp2",
            CodecId::Mp3 => "mp3",
            CodecId::Aac => "aac",
            CodecId::Ac3 => "ac3",
            CodecId::Dts => "dts",
        }
    }
}

/// Stream information.
#[derive(Debug, Clone, Default)]
pub struct StreamInfo {
    /// Stream index.
    pub index: usize,
    /// Track type.
    pub track_type: TrackType,
    /// Codec ID.
    pub codec_id: CodecId,
    /// Raw codec tag as stored in the container.
    pub codec_tag: u32,
    /// Time base.
    pub time_base: Rational,
    /// Duration in time base units.
    pub duration: Option<i64>,
    /// Bit rate in bits per second, 0 if unknown.
    pub bit_rate: u64,
    /// Codec-specific extra data.
    pub extra_data: Vec<u8>,
    /// Video-specific info.
    pub video: Option<VideoStreamInfo>,
    /// Audio-specific info.
    pub audio: Option<AudioStreamInfo>,
}

/// Video stream information.
#[derive(Debug, Clone, Default)]
pub struct VideoStreamInfo {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels (negative heights in the source mean top-down).
    pub height: i32,
    /// Bits per pixel.
    pub bit_depth: u16,
}

/// Audio stream information.
#[derive(Debug, Clone, Default)]
pub struct AudioStreamInfo {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Number of channels.
    pub channels: u16,
    /// Bytes per block.
    pub block_align: u16,
    /// Bits per sample.
    pub bits_per_sample: u16,
}

/// Byte source a demuxer can be opened on.
pub trait MediaSource: Read + Seek + Send {}

impl<T: Read + Seek + Send> MediaSource for T {}

/// Demuxer trait for reading container formats.
///
/// Calls are not reentrant; one consumer drives one demuxer.
pub trait Demuxer {
    /// Get container format name.
    fn format_name(&self) -> &str;

    /// Get number of streams.
    fn num_streams(&self) -> usize;

    /// Get stream information.
    fn stream_info(&self, index: usize) -> Option<&StreamInfo>;

    /// Read the next packet.
    ///
    /// `Ok(None)` signals end of stream.
    fn read_packet(&mut self) -> Result<Option<Packet>>;

    /// Release all per-stream state. Further reads return end of stream.
    fn close(&mut self);
}

/// A container format that can be probed and opened.
pub trait InputFormat: Send + Sync {
    /// Short format name.
    fn name(&self) -> &'static str;

    /// Score how likely `buf` (a prefix of the input) is this format,
    /// from 0 to [`PROBE_SCORE_MAX`].
    fn probe(&self, buf: &[u8]) -> u32;

    /// Open a demuxer over `source`, positioned at the start of the input.
    fn open(&self, source: Box<dyn MediaSource>) -> Result<Box<dyn Demuxer>>;
}
