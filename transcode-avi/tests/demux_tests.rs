//! AVI demuxer integration tests.
//!
//! Files are assembled in memory with `AviBuilder` and read back through the
//! public demuxer API.

mod common;

use common::{chunk, pattern, strh, wave_strf, AviBuilder, IndexMode};
use std::io::Cursor;
use transcode_avi::{AviDemuxer, AviError, AviInputFormat, DemuxerConfig, SearchFlags};
use transcode_containers::{CodecId, FormatRegistry, TrackType};
use transcode_core::packet::Packet;
use transcode_core::Rational;

fn open(data: Vec<u8>) -> AviDemuxer<Cursor<Vec<u8>>> {
    AviDemuxer::open(Cursor::new(data)).expect("open")
}

fn read_all(demuxer: &mut AviDemuxer<Cursor<Vec<u8>>>) -> Vec<Packet> {
    let mut packets = Vec::new();
    while let Some(packet) = demuxer.read_packet().expect("read_packet") {
        packets.push(packet);
    }
    packets
}

/// Stream ordinals with consecutive repeats collapsed.
fn stream_runs(packets: &[Packet]) -> Vec<u32> {
    let mut runs: Vec<u32> = Vec::new();
    for p in packets {
        if runs.last() != Some(&p.stream_index) {
            runs.push(p.stream_index);
        }
    }
    runs
}

fn dts_of(packets: &[Packet], stream: u32) -> Vec<i64> {
    packets
        .iter()
        .filter(|p| p.stream_index == stream)
        .map(|p| p.dts.value)
        .collect()
}

// =============================================================================
// Interleaved files
// =============================================================================

#[test]
fn test_interleaved_video_audio_order() {
    let data = AviBuilder::new()
        .video(1, 25)
        .audio(1, 8000, 2)
        .chunk(b"00dc", &vec![1; 4096])
        .chunk(b"01wb", &pattern(2048))
        .chunk(b"00dc", &vec![2; 4096])
        .chunk(b"01wb", &pattern(2048))
        .build();

    let mut demuxer = open(data);
    assert_eq!(demuxer.num_streams(), 2);
    assert!(!demuxer.is_non_interleaved());

    let packets = read_all(&mut demuxer);
    assert_eq!(stream_runs(&packets), vec![0, 1, 0, 1]);

    let video: Vec<_> = packets.iter().filter(|p| p.stream_index == 0).collect();
    assert_eq!(video.len(), 2);
    assert!(video.iter().all(|p| p.is_keyframe() && p.size() == 4096));
    assert_eq!(dts_of(&packets, 0), vec![0, 1]);

    // Fixed-size audio is handed out in 64-sample pieces.
    let audio: Vec<_> = packets.iter().filter(|p| p.stream_index == 1).collect();
    assert_eq!(audio.len(), 32);
    assert!(audio.iter().all(|p| p.size() == 128 && p.is_keyframe()));
    let audio_dts = dts_of(&packets, 1);
    assert!(audio_dts.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(audio_dts[1], 64);

    let first_chunk: Vec<u8> = audio[..16].iter().flat_map(|p| p.data().to_vec()).collect();
    assert_eq!(first_chunk, pattern(2048));

    assert!(demuxer.read_packet().unwrap().is_none());
}

#[test]
fn test_packet_metadata() {
    let builder = AviBuilder::new().video(1, 25).chunk(b"00dc", &[7; 10]);
    let movi = builder.movi_list_offset();
    let mut demuxer = open(builder.build());

    let packet = demuxer.read_packet().unwrap().unwrap();
    assert_eq!(packet.stream_index, 0);
    assert_eq!(packet.pos, Some(movi + 4 + 8));
    assert_eq!(packet.pts, packet.dts);
    assert_eq!(packet.time_base().as_rational(), Rational::new(1, 25));
    assert_eq!(packet.data(), &[7; 10]);
    assert_eq!(demuxer.movi_list(), movi);
}

#[test]
fn test_junk_and_garbage_are_skipped() {
    let data = AviBuilder::new()
        .video(1, 25)
        .chunk(b"00dc", &[1; 6])
        .chunk(b"JUNK", &[0; 10])
        .chunk(b"00dc", &[2; 6])
        .raw_movi(&[0xee, 0xee, 0xee])
        .chunk(b"00dc", &[3; 6])
        .build();

    let mut demuxer = open(data);
    let packets = read_all(&mut demuxer);
    let payloads: Vec<u8> = packets.iter().map(|p| p.data()[0]).collect();
    assert_eq!(payloads, vec![1, 2, 3]);
    assert_eq!(dts_of(&packets, 0), vec![0, 1, 2]);
}

#[test]
fn test_odd_chunk_padding() {
    let data = AviBuilder::new()
        .video(1, 25)
        .chunk(b"00dc", &[1; 5])
        .chunk(b"00dc", &[2; 7])
        .chunk(b"00dc", &[3; 4])
        .build();

    let mut demuxer = open(data);
    let packets = read_all(&mut demuxer);
    let sizes: Vec<usize> = packets.iter().map(|p| p.size()).collect();
    assert_eq!(sizes, vec![5, 7, 4]);
    assert_eq!(packets[1].data(), &[2; 7]);
}

#[test]
fn test_empty_chunk_is_a_packet() {
    let data = AviBuilder::new()
        .video(1, 25)
        .chunk(b"00dc", &[])
        .chunk(b"00dc", &[9; 2])
        .build();

    let mut demuxer = open(data);
    let packets = read_all(&mut demuxer);
    assert_eq!(packets.len(), 2);
    assert!(packets[0].is_empty());
    assert_eq!(dts_of(&packets, 0), vec![0, 1]);
}

#[test]
fn test_truncated_chunk_returns_partial_packet() {
    let mut data = AviBuilder::new()
        .video(1, 25)
        .chunk(b"00dc", &[1; 20])
        .chunk(b"00dc", &[2; 100])
        .build();
    data.truncate(data.len() - 40);

    let mut demuxer = open(data);
    let first = demuxer.read_packet().unwrap().unwrap();
    assert_eq!(first.size(), 20);
    let partial = demuxer.read_packet().unwrap().unwrap();
    assert_eq!(partial.size(), 60);
    assert!(demuxer.read_packet().unwrap().is_none());
}

#[test]
fn test_oversized_chunk_allocates_only_available_input() {
    let builder = AviBuilder::new().video(1, 25).chunk(b"00dc", &[3; 16]);
    let movi = builder.movi_list_offset() as usize;
    let mut data = builder.build();
    data[movi - 4..movi].copy_from_slice(&0xFFFF_FF00u32.to_le_bytes());
    data[movi + 8..movi + 12].copy_from_slice(&0xF000_0000u32.to_le_bytes());
    let available = data.len() - (movi + 12);

    let mut demuxer = open(data);
    let packet = demuxer.read_packet().unwrap().unwrap();
    assert_eq!(packet.size(), available);
    assert_eq!(&packet.data()[..16], &[3; 16]);

    // Far below the declared 3.75 GiB.
    let payload = packet.into_data();
    assert!(payload.capacity() < 4096);
    assert!(demuxer.read_packet().unwrap().is_none());
}

#[test]
fn test_odd_filler_chunk_is_skipped_with_padding() {
    let data = AviBuilder::new()
        .video(1, 25)
        .chunk(b"00dc", &[1; 4])
        .chunk(b"JUNK", &[0; 9])
        .chunk(b"00dc", &[2; 4])
        .build();

    let mut demuxer = open(data);
    let packets = read_all(&mut demuxer);
    let payloads: Vec<&[u8]> = packets.iter().map(|p| p.data()).collect();
    assert_eq!(payloads, vec![&[1u8; 4][..], &[2u8; 4][..]]);
}

#[test]
fn test_palette_change() {
    let mut initial = Vec::new();
    for k in 0..256u32 {
        initial.extend_from_slice(&(k * 0x010101).to_le_bytes());
    }

    let mut builder = AviBuilder::new().video_with(1, 25, b"mrle", 8, &initial);
    for k in 0..6u8 {
        builder = builder.chunk(b"00dc", &[k; 4]);
    }
    let data = builder
        .raw_movi(&[0xff; 4])
        .chunk(b"00pc", &[2, 1, 0, 0, 0x11, 0x22, 0x33, 0])
        .chunk(b"00dc", &[6; 4])
        .build();

    let mut demuxer = open(data);
    let stream = demuxer.stream(0).unwrap();
    assert_eq!(stream.info().codec_id, CodecId::MsRle);
    let palette = stream.palette().unwrap();
    assert!(palette.is_changed());
    assert_eq!(palette.entries()[2], 0x020202);

    demuxer.stream_mut(0).unwrap().palette_mut().unwrap().clear_changed();

    let packets = read_all(&mut demuxer);
    assert_eq!(packets.len(), 7);
    assert!(packets.iter().all(|p| p.size() == 4));

    let palette = demuxer.stream(0).unwrap().palette().unwrap();
    assert!(palette.is_changed());
    assert_eq!(palette.entries()[2], 0x112233);
    assert_eq!(palette.entries()[3], 0x030303);
}

// =============================================================================
// Non-interleaved files
// =============================================================================

#[test]
fn test_non_interleaved_reads_by_timestamp() {
    let mut builder = AviBuilder::new().video(1, 25).audio(1, 8000, 2);
    for frame in 0..10u8 {
        builder = builder.chunk(b"00dc", &[frame; 100]);
    }
    let data = builder
        .chunk(b"01wb", &pattern(4000))
        .index(IndexMode::Relative)
        .build();

    let mut demuxer = open(data);
    assert!(demuxer.is_non_interleaved());

    // The single audio entry was split into keyframe blocks.
    let audio_index = demuxer.stream(1).unwrap().index();
    let sizes: Vec<u32> = audio_index.entries().iter().map(|e| e.size).collect();
    assert_eq!(sizes, vec![1024, 1024, 1024, 928]);

    let packets: Vec<Packet> = (0..7)
        .map(|_| demuxer.read_packet().unwrap().unwrap())
        .collect();
    let order: Vec<u32> = packets.iter().map(|p| p.stream_index).collect();
    assert_eq!(order, vec![0, 1, 1, 1, 1, 1, 0]);

    assert_eq!(packets[0].data(), &[0; 100]);
    assert_eq!(packets[6].data(), &[1; 100]);
    assert_eq!(dts_of(&packets, 0), vec![0, 1]);
    assert_eq!(dts_of(&packets, 1), vec![0, 64, 128, 192, 256]);

    let audio: Vec<u8> = packets[1..6].iter().flat_map(|p| p.data().to_vec()).collect();
    assert_eq!(audio, pattern(640));
}

#[test]
fn test_non_interleaved_delivers_everything() {
    let mut builder = AviBuilder::new().video(1, 25).audio(1, 8000, 2);
    for frame in 0..10u8 {
        builder = builder.chunk(b"00dc", &[frame; 100]);
    }
    let data = builder
        .chunk(b"01wb", &pattern(3200))
        .index(IndexMode::Absolute)
        .build();

    let mut demuxer = open(data);
    assert!(demuxer.is_non_interleaved());

    let mut video = Vec::new();
    let mut audio = Vec::new();
    while video.len() < 10 || audio.len() < 3200 {
        let packet = demuxer.read_packet().unwrap().unwrap();
        match packet.stream_index {
            0 => video.push(packet.data()[0]),
            _ => audio.extend_from_slice(packet.data()),
        }
    }
    assert_eq!(video, (0..10).collect::<Vec<u8>>());
    assert_eq!(audio, pattern(3200));

    // Both streams are past their last index entry.
    assert!(demuxer.read_packet().unwrap().is_none());
}

#[test]
fn test_must_use_index_flag() {
    let data = AviBuilder::new()
        .main_flags(0x20)
        .video(1, 25)
        .chunk(b"00dc", &[1; 8])
        .index(IndexMode::Relative)
        .build();

    let mut demuxer = open(data);
    assert!(demuxer.is_non_interleaved());
    let packet = demuxer.read_packet().unwrap().unwrap();
    assert_eq!(packet.data(), &[1; 8]);
}

// =============================================================================
// Index and seeking
// =============================================================================

fn indexed_file() -> Vec<u8> {
    let mut builder = AviBuilder::new().video(1, 25).audio(1, 8000, 2);
    for frame in 0..6u8 {
        builder = builder
            .chunk_with_key(b"00dc", &[frame; 10], frame % 3 == 0)
            .chunk(b"01wb", &[frame; 640]);
    }
    builder.index(IndexMode::Relative).build()
}

#[test]
fn test_keyframes_follow_index() {
    let mut demuxer = open(indexed_file());
    assert!(!demuxer.is_non_interleaved());
    assert_eq!(demuxer.stream(0).unwrap().index().len(), 6);

    let packets = read_all(&mut demuxer);
    let keys: Vec<bool> = packets
        .iter()
        .filter(|p| p.stream_index == 0)
        .map(|p| p.is_keyframe())
        .collect();
    assert_eq!(keys, vec![true, false, false, true, false, false]);
}

#[test]
fn test_search_timestamp() {
    let demuxer = open(indexed_file());
    assert_eq!(demuxer.search_timestamp(0, 4, SearchFlags::BACKWARD), Some(3));
    assert_eq!(demuxer.search_timestamp(0, 4, SearchFlags::empty()), None);
    assert_eq!(demuxer.search_timestamp(0, 4, SearchFlags::ANY), Some(4));
    assert_eq!(demuxer.search_timestamp(1, 320, SearchFlags::ANY), Some(1));
    assert_eq!(demuxer.search_timestamp(5, 0, SearchFlags::ANY), None);
}

#[test]
fn test_seek_to_keyframe() {
    let mut demuxer = open(indexed_file());
    demuxer.read_packet().unwrap();

    demuxer.seek(0, 4, SearchFlags::BACKWARD).unwrap();
    let packet = demuxer.read_packet().unwrap().unwrap();
    assert_eq!(packet.stream_index, 0);
    assert_eq!(packet.dts.value, 3);
    assert!(packet.is_keyframe());
    assert_eq!(packet.data(), &[3; 10]);

    // Audio was moved to the same instant: 3 frames at 25 fps is 960 samples.
    assert_eq!(demuxer.stream(1).unwrap().state().frame_offset, 960 * 2);
    let packet = demuxer.read_packet().unwrap().unwrap();
    assert_eq!(packet.stream_index, 1);
    assert_eq!(packet.dts.value, 960);
}

#[test]
fn test_seek_errors() {
    let mut demuxer = open(indexed_file());
    assert!(matches!(
        demuxer.seek(7, 0, SearchFlags::empty()),
        Err(AviError::StreamNotFound(7))
    ));
    assert!(matches!(
        demuxer.seek(0, 100, SearchFlags::empty()),
        Err(AviError::SeekFailed(_))
    ));

    let mut unindexed = open(AviBuilder::new().video(1, 25).chunk(b"00dc", &[0; 4]).build());
    assert!(matches!(
        unindexed.seek(0, 0, SearchFlags::BACKWARD),
        Err(AviError::SeekFailed(_))
    ));
}

#[test]
fn test_index_loading_can_be_disabled() {
    let config = DemuxerConfig::default().with_load_index(false);
    let demuxer = AviDemuxer::with_config(Cursor::new(indexed_file()), config).unwrap();
    assert!(demuxer.stream(0).unwrap().index().is_empty());
}

// =============================================================================
// Header handling
// =============================================================================

#[test]
fn test_stream_count_mismatch() {
    let data = AviBuilder::new()
        .declared_streams(3)
        .video(1, 25)
        .audio(1, 8000, 2)
        .chunk(b"00dc", &[0; 4])
        .build();

    let err = AviDemuxer::open(Cursor::new(data)).err().unwrap();
    assert!(err.is_malformed_header());
    assert!(matches!(
        err,
        AviError::StreamCountMismatch {
            declared: 3,
            found: 2
        }
    ));
}

#[test]
fn test_audio_format_extradata() {
    let mut strf = 0x55u16.to_le_bytes().to_vec();
    strf.extend_from_slice(&2u16.to_le_bytes());
    strf.extend_from_slice(&44100u32.to_le_bytes());
    strf.extend_from_slice(&16000u32.to_le_bytes());
    strf.extend_from_slice(&1u16.to_le_bytes());
    strf.extend_from_slice(&0u16.to_le_bytes());
    // cbSize claims more than the chunk holds.
    strf.extend_from_slice(&10u16.to_le_bytes());
    strf.extend_from_slice(&[0xaa, 0xbb]);

    let data = AviBuilder::new()
        .count_stream()
        .header_chunks(&[strh(b"auds", b"\0\0\0\0", 1152, 44100, 0), chunk(b"strf", &strf)])
        .build();

    let demuxer = open(data);
    let info = demuxer.stream(0).unwrap().info();
    assert_eq!(info.track_type, TrackType::Audio);
    assert_eq!(info.codec_id, CodecId::Mp3);
    assert_eq!(info.codec_tag, 0x55);
    assert_eq!(info.bit_rate, 128_000);
    assert_eq!(info.extra_data, vec![0xaa, 0xbb]);
    let audio = info.audio.as_ref().unwrap();
    assert_eq!((audio.sample_rate, audio.channels), (44100, 2));
    assert_eq!(info.time_base, Rational::new(32, 1225));
}

#[test]
fn test_short_format_chunks_are_rejected() {
    let data = AviBuilder::new()
        .count_stream()
        .header_chunks(&[strh(b"vids", b"DIVX", 1, 25, 0), chunk(b"strf", &[0; 30])])
        .build();
    assert!(AviDemuxer::open(Cursor::new(data)).err().unwrap().is_malformed_header());

    let data = AviBuilder::new()
        .count_stream()
        .header_chunks(&[strh(b"auds", b"\0\0\0\0", 1, 8000, 2), chunk(b"strf", &[0; 12])])
        .build();
    assert!(AviDemuxer::open(Cursor::new(data)).err().unwrap().is_malformed_header());
}

#[test]
fn test_plain_waveformat() {
    let mut strf = wave_strf(0x22, 1, 8000, 32);
    // Cut the bits-per-sample field: 14-byte WAVEFORMAT.
    strf[4] = 14;
    strf.truncate(8 + 14);

    let data = AviBuilder::new()
        .count_stream()
        .header_chunks(&[strh(b"auds", b"\0\0\0\0", 1, 8000, 32), strf])
        .build();

    let demuxer = open(data);
    let info = demuxer.stream(0).unwrap().info();
    assert_eq!(info.codec_id, CodecId::TrueSpeech);
    assert_eq!(info.audio.as_ref().unwrap().bits_per_sample, 8);
}

#[test]
fn test_unknown_codec_keeps_stream() {
    let data = AviBuilder::new()
        .video_with(1, 30, b"QQQQ", 24, &[])
        .chunk(b"00dc", &[5; 3])
        .build();

    let mut demuxer = open(data);
    let info = demuxer.stream(0).unwrap().info();
    assert_eq!(info.codec_id, CodecId::None);
    assert_eq!(info.track_type, TrackType::Video);
    assert_eq!(demuxer.read_packet().unwrap().unwrap().data(), &[5; 3]);
}

#[test]
fn test_not_an_avi() {
    let err = AviDemuxer::open(Cursor::new(b"RIFF\x10\0\0\0WAVEfmt ".to_vec()))
        .err()
        .unwrap();
    assert!(err.is_malformed_header());

    let err = AviDemuxer::open(Cursor::new(Vec::new())).err().unwrap();
    assert!(err.is_malformed_header());
}

#[test]
fn test_close_releases_streams() {
    let mut demuxer = open(indexed_file());
    demuxer.close();
    assert_eq!(demuxer.num_streams(), 0);
    assert!(demuxer.read_packet().unwrap().is_none());
}

// =============================================================================
// Registry
// =============================================================================

#[test]
fn test_registry_opens_avi() {
    let mut registry = FormatRegistry::new();
    registry.register(Box::new(AviInputFormat::new()));

    let data = AviBuilder::new()
        .video(1, 25)
        .chunk(b"00dc", &[4; 12])
        .build();
    let (format, score) = registry.probe(&data).unwrap();
    assert_eq!(format.name(), "avi");
    assert_eq!(score, 100);

    let mut demuxer = registry.open(Box::new(Cursor::new(data))).unwrap();
    assert_eq!(demuxer.format_name(), "avi");
    assert_eq!(demuxer.num_streams(), 1);
    assert_eq!(demuxer.stream_info(0).unwrap().codec_id, CodecId::Mpeg4);

    let packet = demuxer.read_packet().unwrap().unwrap();
    assert_eq!(packet.data(), &[4; 12]);
    assert!(demuxer.read_packet().unwrap().is_none());
    demuxer.close();
}

#[test]
fn test_registry_reports_malformed_avi() {
    let mut registry = FormatRegistry::new();
    registry.register(Box::new(AviInputFormat::new()));

    let data = AviBuilder::new()
        .declared_streams(2)
        .video(1, 25)
        .build();
    let err = registry.open(Box::new(Cursor::new(data))).err().unwrap();
    assert!(matches!(
        err,
        transcode_core::Error::Container(transcode_core::ContainerError::InvalidStructure(_))
    ));
}
