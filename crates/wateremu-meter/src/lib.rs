//! Metering side of the water meter protocol.
//!
//! [`Session`] answers decoded command frames exactly as the device does,
//! including out-of-order and bypass paths the genuine firmware would
//! reject. [`Meter`] couples a session to a [`Transport`] so link events
//! drive it directly.

mod config;
mod error;
mod meter;
mod session;

pub use config::*;
pub use error::*;
pub use meter::*;
pub use session::*;
