//! Codec tag tables for BITMAPINFOHEADER and WAVEFORMATEX streams

use transcode_containers::CodecId;

/// A codec tag as stored in the container, little-endian.
const fn mktag(tag: &[u8; 4]) -> u32 {
    u32::from_le_bytes(*tag)
}

/// Video compression fourCCs.
pub const BMP_TAGS: &[(CodecId, u32)] = &[
    (CodecId::MsRle, mktag(b"mrle")),
    (CodecId::MsRle, 0x0000_0001),
    (CodecId::RawVideo, 0x0000_0000),
    (CodecId::MsVideo1, mktag(b"CRAM")),
    (CodecId::MsVideo1, mktag(b"MSVC")),
    (CodecId::MsVideo1, mktag(b"WHAM")),
    (CodecId::Cinepak, mktag(b"cvid")),
    (CodecId::Mjpeg, mktag(b"MJPG")),
    (CodecId::Mpeg4, mktag(b"XVID")),
    (CodecId::Mpeg4, mktag(b"DIVX")),
    (CodecId::Mpeg4, mktag(b"DX50")),
    (CodecId::Mpeg4, mktag(b"FMP4")),
    (CodecId::Mpeg4, mktag(b"MP4V")),
    (CodecId::MsMpeg4V2, mktag(b"MP42")),
    (CodecId::MsMpeg4V3, mktag(b"MP43")),
    (CodecId::MsMpeg4V3, mktag(b"DIV3")),
    (CodecId::H263, mktag(b"H263")),
    (CodecId::H264, mktag(b"H264")),
    (CodecId::H264, mktag(b"X264")),
    (CodecId::H264, mktag(b"avc1")),
    (CodecId::HuffYuv, mktag(b"HFYU")),
];

/// Audio format tags.
pub const WAV_TAGS: &[(CodecId, u32)] = &[
    (CodecId::TrueSpeech, 0x0022),
    (CodecId::PcmS16Le, 0x0001),
    (CodecId::AdpcmMs, 0x0002),
    (CodecId::PcmAlaw, 0x0006),
    (CodecId::PcmMulaw, 0x0007),
    (CodecId::AdpcmImaWav, 0x0011),
    (CodecId::Mp2, 0x0050),
    (CodecId::Mp3, 0x0055),
    (CodecId::Aac, 0x00ff),
    (CodecId::Ac3, 0x2000),
    (CodecId::Dts, 0x2001),
];

/// Look `tag` up in `table`, comparing each byte ASCII case-insensitively.
pub fn codec_id(table: &[(CodecId, u32)], tag: u32) -> Option<CodecId> {
    let wanted = tag.to_le_bytes();
    table
        .iter()
        .find(|(_, known)| known.to_le_bytes().eq_ignore_ascii_case(&wanted))
        .map(|(id, _)| *id)
}

/// Video codec for a BITMAPINFOHEADER compression tag.
pub fn video_codec(tag: u32) -> Option<CodecId> {
    codec_id(BMP_TAGS, tag)
}

/// Audio codec for a WAVEFORMATEX format tag.
pub fn audio_codec(tag: u32) -> Option<CodecId> {
    codec_id(WAV_TAGS, tag)
}
