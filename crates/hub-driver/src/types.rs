use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of analog/digital pins on the hub.
pub const NUM_PINS: usize = 12;
/// Number of encoder ports on the hub.
pub const NUM_ENCODER_PORTS: usize = 6;
/// Number of auxiliary sensor buses on the hub.
pub const NUM_BUSES: usize = 3;

/// Chip identifier the hub must report at handshake.
pub const CHIP_ID: u8 = 0x61;
/// Firmware version the hub must report at handshake.
pub const FIRMWARE_VERSION: FirmwareVersion = FirmwareVersion {
    major: 0x01,
    minor: 0x00,
    patch: 0x00,
};

/// What is attached to an analog/digital pin. The discriminants are the
/// 2-bit wire codes of the configuration bitstream.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PinMode {
    Analog,
    Digital,
    None,
}

impl PinMode {
    pub(crate) fn code(self) -> u8 {
        match self {
            PinMode::Analog => 0,
            PinMode::Digital => 1,
            PinMode::None => 2,
        }
    }
}

/// What is attached to an encoder port.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EncoderMode {
    Quadrature,
    Pwm,
    None,
}

impl EncoderMode {
    pub(crate) fn code(self) -> u8 {
        match self {
            EncoderMode::Quadrature => 0,
            EncoderMode::Pwm => 1,
            EncoderMode::None => 2,
        }
    }
}

/// The closed catalogue of auxiliary bus devices the hub firmware knows.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuxDevice {
    /// Color + proximity sensor.
    Apds9151,
    /// 11-channel spectral color sensor, reported on the same field set.
    As7341,
    /// Multizone time-of-flight ranger.
    Vl53l5cx,
    /// Single-zone time-of-flight ranger.
    Vl53l0x,
}

impl AuxDevice {
    /// 2-bit type code in the configuration bitstream.
    pub fn type_code(self) -> u8 {
        match self {
            AuxDevice::Apds9151 => 0,
            AuxDevice::As7341 => 1,
            AuxDevice::Vl53l5cx => 2,
            AuxDevice::Vl53l0x => 3,
        }
    }

    /// Width of this device's record in the status frame, in bits.
    pub fn status_bits(self) -> usize {
        match self {
            AuxDevice::Apds9151 | AuxDevice::As7341 => 56,
            AuxDevice::Vl53l5cx | AuxDevice::Vl53l0x => 32,
        }
    }

    /// The device's own 7-bit bus address. Used only to reject address
    /// collisions when building a configuration; the hub relays traffic.
    pub fn bus_address(self) -> u8 {
        match self {
            AuxDevice::Apds9151 => 0x52,
            AuxDevice::As7341 => 0x39,
            AuxDevice::Vl53l5cx | AuxDevice::Vl53l0x => 0x29,
        }
    }

    /// Extra configuration bits appended after the type code in the init
    /// stream. Empty for every current kind; the slot exists so a future
    /// firmware can take per-device options without a layout break.
    pub fn config_bits(self) -> &'static [bool] {
        &[]
    }
}

impl fmt::Display for AuxDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuxDevice::Apds9151 => write!(f, "APDS9151"),
            AuxDevice::As7341 => write!(f, "AS7341"),
            AuxDevice::Vl53l5cx => write!(f, "VL53L5CX"),
            AuxDevice::Vl53l0x => write!(f, "VL53L0X"),
        }
    }
}

/// A 3-part firmware version compared for exact equality at handshake.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct FirmwareVersion {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Position and velocity of one encoder port.
///
/// `position` accumulates the signed per-frame delta since init (or the
/// last reset): ticks for quadrature ports, rotations for PWM ports.
/// `velocity` is instantaneous: ticks/s resp. rotations/s.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct EncoderReading {
    pub position: f64,
    pub velocity: f64,
}

/// One auxiliary device's decoded record, replaced wholesale per update.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceReading {
    /// Raw 8-bit color channels plus a proximity distance in the
    /// protocol's fixed milli-unit scaling.
    Color { r: f64, g: f64, b: f64, proximity: f64 },
    /// Distance in the protocol's fixed milli-unit scaling.
    Range { distance: f64 },
}

impl DeviceReading {
    /// Zeroed reading of the right shape for a device kind.
    pub fn default_for(device: AuxDevice) -> Self {
        match device {
            AuxDevice::Apds9151 | AuxDevice::As7341 => DeviceReading::Color {
                r: 0.0,
                g: 0.0,
                b: 0.0,
                proximity: 0.0,
            },
            AuxDevice::Vl53l5cx | AuxDevice::Vl53l0x => DeviceReading::Range { distance: 0.0 },
        }
    }

    /// Look up a field by name, mirroring the named-field view of the
    /// record ("r", "g", "b", "proximity", "distance").
    pub fn get(&self, field: &str) -> Option<f64> {
        self.fields()
            .into_iter()
            .find(|(name, _)| *name == field)
            .map(|(_, value)| value)
    }

    /// All named fields of this reading, in record order.
    pub fn fields(&self) -> Vec<(&'static str, f64)> {
        match *self {
            DeviceReading::Color { r, g, b, proximity } => {
                vec![("r", r), ("g", g), ("b", b), ("proximity", proximity)]
            }
            DeviceReading::Range { distance } => vec![("distance", distance)],
        }
    }
}
