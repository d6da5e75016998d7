//! Status frame decoder.
//!
//! Decoding is two-phase: the whole frame is parsed into a staged
//! [`FrameUpdate`] first, without touching the cache, and the stage is
//! committed slot by slot afterwards. A frame the hub flags invalid (or a
//! failed parse) therefore never leaves a half-applied frame behind.
//! Commitment itself is per-slot, not frame-atomic: readers may observe a
//! mix of the previous and the current frame across slots.

use crate::config::HubConfig;
use crate::error::{HubError, Result};
use crate::layout;
use crate::types::{AuxDevice, DeviceReading, EncoderMode, PinMode};

const MILLI: f64 = 1000.0;

/// Little-bit-order field reader over a frame buffer; the mirror image of
/// the init stream's `BitWriter`. Bits past the end of the buffer read as
/// zero (the frame's final byte is zero-padded).
pub(crate) struct BitCursor<'a> {
    data: &'a [u8],
    bit: usize,
}

impl<'a> BitCursor<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, bit: 0 }
    }

    pub(crate) fn flag(&mut self) -> bool {
        let i = self.bit;
        self.bit += 1;
        self.data
            .get(i / 8)
            .is_some_and(|byte| (byte >> (i % 8)) & 1 == 1)
    }

    pub(crate) fn uint(&mut self, width: usize) -> u64 {
        let mut out = 0u64;
        for i in 0..width {
            if self.flag() {
                out |= 1 << i;
            }
        }
        out
    }

    pub(crate) fn int32(&mut self) -> i32 {
        self.uint(32) as u32 as i32
    }

    pub(crate) fn consumed(&self) -> usize {
        self.bit
    }
}

/// One encoder port's contribution from a single frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct EncoderDelta {
    pub port: usize,
    /// Signed position delta, already in the port's position unit.
    pub delta: f64,
    pub velocity: f64,
}

/// A fully parsed frame, staged for per-slot commitment.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct FrameUpdate {
    pub pins: Vec<(usize, f64)>,
    pub encoders: Vec<EncoderDelta>,
    pub devices: Vec<(usize, AuxDevice, DeviceReading)>,
}

/// Parse one status frame against the table that shaped it.
pub(crate) fn decode_frame(config: &HubConfig, frame: &[u8]) -> Result<FrameUpdate> {
    let mut cursor = BitCursor::new(frame);

    if cursor.flag() {
        return Err(HubError::FrameRejected);
    }

    let mut update = FrameUpdate::default();

    for (pin, mode) in config.pins().iter().enumerate() {
        match mode {
            PinMode::Analog => {
                let raw = cursor.uint(32);
                update.pins.push((pin, raw as f64 / MILLI));
            }
            PinMode::Digital => {
                let level = if cursor.flag() { 1.0 } else { 0.0 };
                update.pins.push((pin, level));
            }
            PinMode::None => {}
        }
    }

    for (port, mode) in config.encoders().iter().enumerate() {
        let delta = match mode {
            // Quadrature ports count raw ticks; PWM ports report
            // milli-rotations
            EncoderMode::Quadrature => cursor.int32() as f64,
            EncoderMode::Pwm => cursor.int32() as f64 / MILLI,
            EncoderMode::None => continue,
        };
        let velocity = cursor.int32() as f64 / MILLI;
        update.encoders.push(EncoderDelta {
            port,
            delta,
            velocity,
        });
    }

    for (bus, devices) in config.buses().iter().enumerate() {
        for &device in devices {
            let reading = match device {
                AuxDevice::Apds9151 | AuxDevice::As7341 => {
                    let r = cursor.uint(8) as f64;
                    let g = cursor.uint(8) as f64;
                    let b = cursor.uint(8) as f64;
                    let proximity = cursor.int32() as f64 / MILLI;
                    DeviceReading::Color { r, g, b, proximity }
                }
                AuxDevice::Vl53l5cx | AuxDevice::Vl53l0x => DeviceReading::Range {
                    distance: cursor.int32() as f64 / MILLI,
                },
            };
            update.devices.push((bus, device, reading));
        }
    }

    debug_assert_eq!(cursor.consumed(), layout::update_frame_bits(config));
    Ok(update)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{update_frame_bits, update_frame_len, BitWriter};

    /// Build a frame with the same writer the init encoder uses, so the
    /// tests cannot disagree with the production bit order.
    struct FrameBuilder {
        w: BitWriter,
    }

    impl FrameBuilder {
        fn ok() -> Self {
            let mut w = BitWriter::new();
            w.push(0, 1); // status bit clear
            Self { w }
        }

        fn rejected() -> Self {
            let mut w = BitWriter::new();
            w.push(1, 1);
            Self { w }
        }

        fn u32(mut self, value: u32) -> Self {
            self.w.push(value as u64, 32);
            self
        }

        fn i32(self, value: i32) -> Self {
            self.u32(value as u32)
        }

        fn bit(mut self, value: bool) -> Self {
            self.w.push(value as u64, 1);
            self
        }

        fn u8(mut self, value: u8) -> Self {
            self.w.push(value as u64, 8);
            self
        }

        fn build(self) -> Vec<u8> {
            self.w.into_bytes()
        }
    }

    #[test]
    fn test_status_bit_rejects_whole_frame() {
        let mut config = HubConfig::new();
        config.set_pin(1, PinMode::Analog).unwrap();
        let frame = FrameBuilder::rejected().u32(10_000).build();
        assert!(matches!(
            decode_frame(&config, &frame),
            Err(HubError::FrameRejected)
        ));
    }

    #[test]
    fn test_analog_and_digital_pins() {
        let mut config = HubConfig::new();
        config.set_pin(1, PinMode::Analog).unwrap();
        config.set_pin(2, PinMode::Digital).unwrap();

        // 10000 -> 10.0 after milli scaling; digital high
        let frame = FrameBuilder::ok().u32(10_000).bit(true).build();
        assert_eq!(frame.len(), update_frame_len(&config));

        let update = decode_frame(&config, &frame).unwrap();
        assert_eq!(update.pins, vec![(0, 10.0), (1, 1.0)]);
    }

    #[test]
    fn test_quadrature_delta_is_raw_ticks() {
        let mut config = HubConfig::new();
        config.set_encoder(1, EncoderMode::Quadrature).unwrap();

        let frame = FrameBuilder::ok().i32(-50).i32(2_000).build();
        let update = decode_frame(&config, &frame).unwrap();
        assert_eq!(
            update.encoders,
            vec![EncoderDelta {
                port: 0,
                delta: -50.0,
                velocity: 2.0,
            }]
        );
    }

    #[test]
    fn test_pwm_delta_is_milli_rotations() {
        let mut config = HubConfig::new();
        config.set_encoder(3, EncoderMode::Pwm).unwrap();

        let frame = FrameBuilder::ok().i32(1_500).i32(-250).build();
        let update = decode_frame(&config, &frame).unwrap();
        assert_eq!(
            update.encoders,
            vec![EncoderDelta {
                port: 2,
                delta: 1.5,
                velocity: -0.25,
            }]
        );
    }

    #[test]
    fn test_color_device_record() {
        let mut config = HubConfig::new();
        config.add_device(1, AuxDevice::Apds9151).unwrap();

        let frame = FrameBuilder::ok().u8(12).u8(34).u8(56).i32(789).build();
        let update = decode_frame(&config, &frame).unwrap();
        assert_eq!(
            update.devices,
            vec![(
                0,
                AuxDevice::Apds9151,
                DeviceReading::Color {
                    r: 12.0,
                    g: 34.0,
                    b: 56.0,
                    proximity: 0.789,
                }
            )]
        );
    }

    #[test]
    fn test_range_device_record() {
        let mut config = HubConfig::new();
        config.add_device(2, AuxDevice::Vl53l0x).unwrap();

        let frame = FrameBuilder::ok().i32(1_234).build();
        let update = decode_frame(&config, &frame).unwrap();
        assert_eq!(
            update.devices,
            vec![(
                1,
                AuxDevice::Vl53l0x,
                DeviceReading::Range { distance: 1.234 }
            )]
        );
    }

    #[test]
    fn test_fields_decode_in_table_order() {
        let mut config = HubConfig::new();
        config.set_pin(5, PinMode::Digital).unwrap();
        config.set_encoder(2, EncoderMode::Quadrature).unwrap();
        config.add_device(1, AuxDevice::Vl53l5cx).unwrap();
        config.add_device(3, AuxDevice::As7341).unwrap();

        let frame = FrameBuilder::ok()
            .bit(true) // pin 5
            .i32(7) // encoder 2 delta
            .i32(3_000) // encoder 2 velocity
            .i32(500) // bus 1 ranger
            .u8(1)
            .u8(2)
            .u8(3)
            .i32(4_000) // bus 3 color
            .build();

        let update = decode_frame(&config, &frame).unwrap();
        assert_eq!(update.pins, vec![(4, 1.0)]);
        assert_eq!(update.encoders[0].port, 1);
        assert_eq!(update.encoders[0].delta, 7.0);
        assert_eq!(update.devices[0].0, 0);
        assert_eq!(
            update.devices[1].2,
            DeviceReading::Color {
                r: 1.0,
                g: 2.0,
                b: 3.0,
                proximity: 4.0,
            }
        );
    }

    #[test]
    fn test_decoder_consumes_exactly_the_calculated_bits() {
        let mut config = HubConfig::new();
        config.set_pin(1, PinMode::Analog).unwrap();
        config.set_pin(7, PinMode::Digital).unwrap();
        config.set_encoder(1, EncoderMode::Quadrature).unwrap();
        config.set_encoder(4, EncoderMode::Pwm).unwrap();
        config.add_device(1, AuxDevice::Apds9151).unwrap();
        config.add_device(2, AuxDevice::Vl53l0x).unwrap();

        let frame = vec![0u8; update_frame_len(&config)];
        let mut cursor = BitCursor::new(&frame);
        cursor.flag();
        for mode in config.pins() {
            match mode {
                PinMode::Analog => {
                    cursor.uint(32);
                }
                PinMode::Digital => {
                    cursor.flag();
                }
                PinMode::None => {}
            }
        }
        for mode in config.encoders() {
            if *mode != EncoderMode::None {
                cursor.int32();
                cursor.int32();
            }
        }
        for devices in config.buses() {
            for device in devices {
                cursor.uint(device.status_bits());
            }
        }

        // Layout and decoder must agree bit for bit; decode_frame carries
        // the same accounting in a debug assertion
        assert_eq!(cursor.consumed(), update_frame_bits(&config));
        decode_frame(&config, &frame).unwrap();
    }

    #[test]
    fn test_idempotent_fields_decode_identically_twice() {
        let mut config = HubConfig::new();
        config.set_pin(1, PinMode::Analog).unwrap();
        config.set_encoder(1, EncoderMode::Quadrature).unwrap();
        config.add_device(1, AuxDevice::Vl53l0x).unwrap();

        let frame = FrameBuilder::ok()
            .u32(2_500)
            .i32(10)
            .i32(1_000)
            .i32(300)
            .build();
        let first = decode_frame(&config, &frame).unwrap();
        let second = decode_frame(&config, &frame).unwrap();
        // The staged parse is a pure function of the bytes; accumulation
        // happens at commit time, not here
        assert_eq!(first, second);
    }
}
