//! hub-driver: driver for the sensor expansion hub
//!
//! The hub multiplexes 12 analog/digital pins, 6 encoder ports, and 3
//! auxiliary sensor buses behind one register-oriented link. This crate
//! owns the driver core: the port-table configuration, the
//! configuration-to-bitstream compiler, the status frame decoder, and the
//! single-producer/many-reader state cache. The physical link is
//! abstracted by `hub-transport`.

mod types;
pub use types::{
    AuxDevice, DeviceReading, EncoderMode, EncoderReading, FirmwareVersion, PinMode, CHIP_ID,
    FIRMWARE_VERSION, NUM_BUSES, NUM_ENCODER_PORTS, NUM_PINS,
};

mod error;
pub use error::{ErrorKind, HubError, Result};

mod config;
pub use config::HubConfig;

mod layout;
pub use layout::{encode_init, update_frame_bits, update_frame_len};

mod decode;

mod cache;

mod driver;
pub use driver::{DriverState, Hub, UpdateMode};

mod loader;
pub use loader::{load_config_file, load_config_str};

mod metrics;
pub use metrics::{HubMetrics, MetricsHub};
