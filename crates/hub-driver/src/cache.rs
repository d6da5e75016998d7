//! Latest-value cache shared between the single update producer and any
//! number of readers.
//!
//! Every slot stands alone: scalar pin readings live in bit-cast
//! `AtomicU64` cells, compound readings (encoder pose/velocity pairs,
//! device records) each sit behind their own `parking_lot::RwLock`. There
//! is no cache-wide lock, so readers never wait on the producer or on each
//! other beyond the copy out of a single slot. The trade-off is cross-slot
//! tearing: a reader sweeping the cache mid-commit can see some slots from
//! the current frame and some from the previous one.

use crate::config::HubConfig;
use crate::decode::FrameUpdate;
use crate::types::{
    AuxDevice, DeviceReading, EncoderReading, NUM_BUSES, NUM_ENCODER_PORTS, NUM_PINS,
};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

pub(crate) struct StateCache {
    pins: [AtomicU64; NUM_PINS],
    encoders: [RwLock<EncoderReading>; NUM_ENCODER_PORTS],
    devices: [Vec<(AuxDevice, RwLock<DeviceReading>)>; NUM_BUSES],
}

impl StateCache {
    /// Build the slot arrays for a frozen table, every slot seeded with
    /// its zero default so no read can ever observe an unpopulated slot.
    pub(crate) fn for_config(config: &HubConfig) -> Self {
        let devices = std::array::from_fn(|bus| {
            config.buses()[bus]
                .iter()
                .map(|&device| (device, RwLock::new(DeviceReading::default_for(device))))
                .collect()
        });
        Self {
            pins: std::array::from_fn(|_| AtomicU64::new(0f64.to_bits())),
            encoders: std::array::from_fn(|_| RwLock::new(EncoderReading::default())),
            devices,
        }
    }

    pub(crate) fn pin(&self, pin: usize) -> f64 {
        f64::from_bits(self.pins[pin].load(Ordering::Relaxed))
    }

    pub(crate) fn encoder(&self, port: usize) -> EncoderReading {
        *self.encoders[port].read()
    }

    pub(crate) fn device(&self, bus: usize, device: AuxDevice) -> Option<DeviceReading> {
        self.devices[bus]
            .iter()
            .find(|(kind, _)| *kind == device)
            .map(|(_, slot)| *slot.read())
    }

    /// Zero an encoder's position, keeping whatever velocity is cached.
    /// Taking the slot's write lock serializes this with a concurrent
    /// commit of the same slot, so neither side loses its update.
    pub(crate) fn reset_encoder(&self, port: usize) {
        let mut slot = self.encoders[port].write();
        slot.position = 0.0;
    }

    /// Apply a staged frame, one slot at a time.
    pub(crate) fn commit(&self, update: &FrameUpdate) {
        for &(pin, value) in &update.pins {
            self.pins[pin].store(value.to_bits(), Ordering::Relaxed);
        }
        for delta in &update.encoders {
            let mut slot = self.encoders[delta.port].write();
            slot.position += delta.delta;
            slot.velocity = delta.velocity;
        }
        for &(bus, device, reading) in &update.devices {
            if let Some((_, slot)) = self.devices[bus].iter().find(|(kind, _)| *kind == device) {
                *slot.write() = reading;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::EncoderDelta;
    use crate::types::{EncoderMode, PinMode};

    fn cache_with(config: &HubConfig) -> StateCache {
        StateCache::for_config(config)
    }

    #[test]
    fn test_slots_start_zeroed() {
        let mut config = HubConfig::new();
        config.set_pin(1, PinMode::Analog).unwrap();
        config.set_encoder(1, EncoderMode::Quadrature).unwrap();
        config.add_device(1, AuxDevice::Apds9151).unwrap();
        let cache = cache_with(&config);

        assert_eq!(cache.pin(0), 0.0);
        assert_eq!(cache.encoder(0), EncoderReading::default());
        assert_eq!(
            cache.device(0, AuxDevice::Apds9151),
            Some(DeviceReading::Color {
                r: 0.0,
                g: 0.0,
                b: 0.0,
                proximity: 0.0,
            })
        );
        assert_eq!(cache.device(0, AuxDevice::Vl53l0x), None);
    }

    #[test]
    fn test_commit_replaces_pin_and_device_slots() {
        let mut config = HubConfig::new();
        config.set_pin(2, PinMode::Analog).unwrap();
        config.add_device(3, AuxDevice::Vl53l0x).unwrap();
        let cache = cache_with(&config);

        let update = FrameUpdate {
            pins: vec![(1, 4.2)],
            encoders: vec![],
            devices: vec![(2, AuxDevice::Vl53l0x, DeviceReading::Range { distance: 0.5 })],
        };
        cache.commit(&update);
        cache.commit(&update);

        // Pin and device slots are idempotent under re-commit
        assert_eq!(cache.pin(1), 4.2);
        assert_eq!(
            cache.device(2, AuxDevice::Vl53l0x),
            Some(DeviceReading::Range { distance: 0.5 })
        );
    }

    #[test]
    fn test_encoder_position_accumulates_across_commits() {
        let mut config = HubConfig::new();
        config.set_encoder(1, EncoderMode::Quadrature).unwrap();
        let cache = cache_with(&config);

        let update = FrameUpdate {
            pins: vec![],
            encoders: vec![EncoderDelta {
                port: 0,
                delta: -50.0,
                velocity: 2.0,
            }],
            devices: vec![],
        };

        cache.commit(&update);
        assert_eq!(
            cache.encoder(0),
            EncoderReading {
                position: -50.0,
                velocity: 2.0,
            }
        );

        // Same delta again: velocity is idempotent, position is not
        cache.commit(&update);
        assert_eq!(
            cache.encoder(0),
            EncoderReading {
                position: -100.0,
                velocity: 2.0,
            }
        );
    }

    #[test]
    fn test_reset_zeroes_position_and_keeps_velocity() {
        let mut config = HubConfig::new();
        config.set_encoder(2, EncoderMode::Pwm).unwrap();
        let cache = cache_with(&config);

        cache.commit(&FrameUpdate {
            pins: vec![],
            encoders: vec![EncoderDelta {
                port: 1,
                delta: 12.5,
                velocity: 0.75,
            }],
            devices: vec![],
        });
        cache.reset_encoder(1);

        assert_eq!(
            cache.encoder(1),
            EncoderReading {
                position: 0.0,
                velocity: 0.75,
            }
        );
    }

    #[test]
    fn test_concurrent_readers_see_committed_values() {
        use std::sync::Arc;

        let mut config = HubConfig::new();
        config.set_pin(1, PinMode::Analog).unwrap();
        config.set_encoder(1, EncoderMode::Quadrature).unwrap();
        let cache = Arc::new(cache_with(&config));

        let producer = {
            let cache = Arc::clone(&cache);
            std::thread::spawn(move || {
                for i in 1..=100 {
                    cache.commit(&FrameUpdate {
                        pins: vec![(0, i as f64)],
                        encoders: vec![EncoderDelta {
                            port: 0,
                            delta: 1.0,
                            velocity: 1.0,
                        }],
                        devices: vec![],
                    });
                }
            })
        };

        let reader = {
            let cache = Arc::clone(&cache);
            std::thread::spawn(move || {
                for _ in 0..100 {
                    let pin = cache.pin(0);
                    assert!((0.0..=100.0).contains(&pin));
                    let enc = cache.encoder(0);
                    assert!((0.0..=100.0).contains(&enc.position));
                }
            })
        };

        producer.join().unwrap();
        reader.join().unwrap();

        assert_eq!(cache.pin(0), 100.0);
        assert_eq!(cache.encoder(0).position, 100.0);
    }
}
