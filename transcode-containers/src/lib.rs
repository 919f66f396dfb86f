//! Container format abstractions.
//!
//! This crate defines the capability traits every container implementation
//! provides ([`Demuxer`], [`InputFormat`]) and the caller-owned
//! [`FormatRegistry`] that selects an input format by probe score.

pub mod registry;
pub mod traits;

pub use registry::{FormatRegistry, PROBE_BUF_SIZE};
pub use traits::{
    AudioStreamInfo, CodecId, Demuxer, InputFormat, MediaSource, StreamInfo, TrackType,
    VideoStreamInfo, PROBE_SCORE_MAX,
};
