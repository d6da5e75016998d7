//! Configuration-to-wire layout: the init bitstream encoder and the status
//! frame length calculator.
//!
//! Both walk the port table in the same fixed order (pins, encoder ports,
//! buses in order, devices in insertion order), so the stream the hub is
//! configured with and the frame length the decoder reads can never drift
//! apart. The decoder in `decode` consumes fields in this order too.

use crate::config::HubConfig;
use crate::types::{EncoderMode, PinMode};

pub(crate) const BITS_PER_PIN_FIELD: usize = 2;
pub(crate) const BITS_PER_ENCODER_FIELD: usize = 2;
pub(crate) const BITS_PER_DEVICE_FIELD: usize = 2;

const ANALOG_SAMPLE_BITS: usize = 32;
const DIGITAL_SAMPLE_BITS: usize = 1;
const ENCODER_RECORD_BITS: usize = 64;

/// Little-bit-order stream writer: bit `n` of the stream lands in bit
/// `n % 8` of byte `n / 8`, and each field is emitted least-significant
/// bit first, matching the hub firmware's field packing.
pub(crate) struct BitWriter {
    bytes: Vec<u8>,
    bit: usize,
}

impl BitWriter {
    pub(crate) fn new() -> Self {
        Self {
            bytes: Vec::new(),
            bit: 0,
        }
    }

    pub(crate) fn push(&mut self, value: u64, width: usize) {
        for i in 0..width {
            let byte = self.bit / 8;
            if byte == self.bytes.len() {
                self.bytes.push(0);
            }
            if (value >> i) & 1 == 1 {
                self.bytes[byte] |= 1 << (self.bit % 8);
            }
            self.bit += 1;
        }
    }

    /// Finish the stream, zero-padded up to a whole byte.
    pub(crate) fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    #[cfg(test)]
    pub(crate) fn bit_len(&self) -> usize {
        self.bit
    }
}

/// Serialize the port table into the one-time configuration bitstream.
pub fn encode_init(config: &HubConfig) -> Vec<u8> {
    let mut w = BitWriter::new();
    for mode in config.pins() {
        w.push(mode.code() as u64, BITS_PER_PIN_FIELD);
    }
    for mode in config.encoders() {
        w.push(mode.code() as u64, BITS_PER_ENCODER_FIELD);
    }
    for devices in config.buses() {
        for device in devices {
            w.push(device.type_code() as u64, BITS_PER_DEVICE_FIELD);
            for &bit in device.config_bits() {
                w.push(bit as u64, 1);
            }
        }
    }
    w.into_bytes()
}

/// Bit length of the recurring status frame this table implies.
pub fn update_frame_bits(config: &HubConfig) -> usize {
    let mut bits = 1; // status bit
    for mode in config.pins() {
        bits += match mode {
            PinMode::Analog => ANALOG_SAMPLE_BITS,
            PinMode::Digital => DIGITAL_SAMPLE_BITS,
            PinMode::None => 0,
        };
    }
    for mode in config.encoders() {
        if *mode != EncoderMode::None {
            bits += ENCODER_RECORD_BITS;
        }
    }
    for devices in config.buses() {
        for device in devices {
            bits += device.status_bits();
        }
    }
    bits
}

/// Byte length of the recurring status frame; this is the exact read
/// length of every update transaction.
pub fn update_frame_len(config: &HubConfig) -> usize {
    update_frame_bits(config).div_ceil(8)
}
