//! # Transcode Core
//!
//! Core types shared by the Transcode container crates.
//!
//! This crate provides the fundamental building blocks used across all Transcode components:
//! - Error handling types
//! - Rational arithmetic for time bases
//! - Packet and timestamp management

pub mod error;
pub mod packet;
pub mod rational;
pub mod timestamp;

pub use error::{ContainerError, Error, Result};
pub use packet::{Packet, PacketFlags};
pub use rational::Rational;
pub use timestamp::{TimeBase, Timestamp};
