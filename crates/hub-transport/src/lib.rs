//! hub-transport: register-oriented transport abstractions for the sensor hub
//!
//! This crate provides the trait and types for talking to a sensor expansion
//! hub that sits behind a single byte-oriented link, with feature-gated
//! backends. The default build enables a `mock` backend so that binaries and
//! tests can run on any host without hardware attached.

mod types;
pub use types::{BusInfo, Register, DEVICE_INFO_LEN, HUB_ADDRESS};

mod error;
pub use error::{Result, TransportError};

mod traits;
pub use traits::RegisterBus;

#[cfg(feature = "mock")]
mod mock;

#[cfg(feature = "mock")]
pub use mock::MockHub;

#[cfg(feature = "serial")]
mod serial;

#[cfg(feature = "serial")]
pub use serial::SerialHub;
