//! Water Meter Wire Protocol
//!
//! This crate provides types and utilities for speaking the application-layer
//! protocol of a water-heater metering device. The companion app writes
//! command frames to the meter and the meter answers with notify frames.
//!
//! # Protocol Overview
//!
//! Every frame shares the same layout:
//!
//! ```text
//! +--------+--------+--------+-------+------------------+
//! | magic0 | magic1 | length |  cmd  | payload[..]      |
//! +--------+--------+--------+-------+------------------+
//! ```
//!
//! - **Commands** (app → meter): magic `FE FE`
//! - **Replies** (meter → app): magic `FD FD`
//!
//! Captured traffic always carries `0x09` in the length position, so the
//! codec treats that byte either as a fixed marker or as a strict length
//! (see [`LengthField`]).
//!
//! # Example
//!
//! ```rust
//! use wateremu_protocol::{FrameCodec, CMD_START_PROLOGUE};
//!
//! let codec = FrameCodec::default();
//! let frame = codec.decode(&[0xFE, 0xFE, 0x09, 0xB0, 0x01, 0x01, 0x00, 0x00]).unwrap();
//! assert_eq!(frame.code, CMD_START_PROLOGUE);
//! ```

mod billing;
mod constants;
mod error;
mod frame;
mod responses;
mod timestamp;

pub use billing::*;
pub use constants::*;
pub use error::*;
pub use frame::*;
pub use responses::*;
pub use timestamp::*;
