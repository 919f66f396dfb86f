//! AVI Container Format
//!
//! This crate provides a demuxer for the AVI (Audio Video Interleave) container
//! format. AVI is based on the RIFF (Resource Interchange File Format) structure.
//!
//! # Features
//!
//! - Header parsing for video, audio and data streams
//! - Legacy `idx1` index loading
//! - Resynchronizing chunk scanner for damaged files
//! - Timestamp-ordered reading of non-interleaved files
//! - In-band palette changes for paletted video
//!
//! # Example
//!
//! ```no_run
//! use std::fs::File;
//! use transcode_avi::AviDemuxer;
//!
//! let file = File::open("video.avi").unwrap();
//! let mut demuxer = AviDemuxer::open(file).unwrap();
//!
//! while let Some(packet) = demuxer.read_packet().unwrap() {
//!     println!("stream {} dts {} size {}", packet.stream_index, packet.dts, packet.size());
//! }
//! ```

mod chunks;
mod codec_tags;
mod demuxer;
mod error;
mod format;
mod header;
mod index;
mod io;
mod stream;
mod types;

pub use chunks::{ChunkHeader, FourCC, IndexRecord};
pub use codec_tags::{audio_codec, video_codec};
pub use demuxer::{AviDemuxer, DemuxerConfig, MAX_EXTRADATA_SIZE, MAX_STREAMS};
pub use error::{AviError, Result};
pub use format::{probe, AviInputFormat};
pub use index::{guess_non_interleaved, IndexEntry, IndexTable, SearchFlags};
pub use stream::{AviStream, StreamState};
pub use types::{AviFlags, MainHeader, Palette, StreamHeader, StreamType, PALETTE_SIZE};
