use crate::error::{HubError, Result};
use crate::types::{AuxDevice, EncoderMode, PinMode, NUM_BUSES, NUM_ENCODER_PORTS, NUM_PINS};

/// The port table: which pins, encoder ports, and bus devices are active.
///
/// Built up with the setters below, then handed to `Hub::init` by value.
/// `init` consumes the table, so it is frozen from that point on by
/// construction; there is no mutable handle left to misuse.
///
/// Pins, ports, and buses are 1-based at this boundary and shift to
/// 0-based storage exactly once, inside the setters and accessors.
#[derive(Clone, Debug)]
pub struct HubConfig {
    pins: [PinMode; NUM_PINS],
    encoders: [EncoderMode; NUM_ENCODER_PORTS],
    buses: [Vec<AuxDevice>; NUM_BUSES],
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            pins: [PinMode::None; NUM_PINS],
            encoders: [EncoderMode::None; NUM_ENCODER_PORTS],
            buses: [Vec::new(), Vec::new(), Vec::new()],
        }
    }
}

impl HubConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare what is attached to an analog/digital pin (1 to 12).
    pub fn set_pin(&mut self, pin: u8, mode: PinMode) -> Result<()> {
        let slot = self
            .pins
            .get_mut(pin.checked_sub(1).ok_or(HubError::PinOutOfRange(pin))? as usize)
            .ok_or(HubError::PinOutOfRange(pin))?;
        *slot = mode;
        Ok(())
    }

    /// Declare what is attached to an encoder port (1 to 6).
    pub fn set_encoder(&mut self, port: u8, mode: EncoderMode) -> Result<()> {
        let slot = self
            .encoders
            .get_mut(port.checked_sub(1).ok_or(HubError::EncoderOutOfRange(port))? as usize)
            .ok_or(HubError::EncoderOutOfRange(port))?;
        *slot = mode;
        Ok(())
    }

    /// Add a device to an auxiliary bus (1 to 3).
    ///
    /// A bus holds at most one device of each kind, and no two devices
    /// whose bus addresses collide. A rejected add leaves the bus's
    /// device list untouched.
    pub fn add_device(&mut self, bus: u8, device: AuxDevice) -> Result<()> {
        let devices = self
            .buses
            .get_mut(bus.checked_sub(1).ok_or(HubError::BusOutOfRange(bus))? as usize)
            .ok_or(HubError::BusOutOfRange(bus))?;
        for &existing in devices.iter() {
            if existing == device {
                return Err(HubError::DuplicateDevice { bus, device });
            }
            if existing.bus_address() == device.bus_address() {
                return Err(HubError::AddressConflict {
                    bus,
                    device,
                    existing,
                    address: device.bus_address(),
                });
            }
        }
        devices.push(device);
        Ok(())
    }

    /// Pin modes in wire order (0-based).
    pub(crate) fn pins(&self) -> &[PinMode; NUM_PINS] {
        &self.pins
    }

    /// Encoder modes in wire order (0-based).
    pub(crate) fn encoders(&self) -> &[EncoderMode; NUM_ENCODER_PORTS] {
        &self.encoders
    }

    /// Bus device lists in wire order (0-based), insertion-ordered.
    pub(crate) fn buses(&self) -> &[Vec<AuxDevice>; NUM_BUSES] {
        &self.buses
    }

    /// Mode of a pin by its public 1-based number.
    pub fn pin_mode(&self, pin: u8) -> Result<PinMode> {
        self.pins
            .get(pin.checked_sub(1).ok_or(HubError::PinOutOfRange(pin))? as usize)
            .copied()
            .ok_or(HubError::PinOutOfRange(pin))
    }

    /// Mode of an encoder port by its public 1-based number.
    pub fn encoder_mode(&self, port: u8) -> Result<EncoderMode> {
        self.encoders
            .get(port.checked_sub(1).ok_or(HubError::EncoderOutOfRange(port))? as usize)
            .copied()
            .ok_or(HubError::EncoderOutOfRange(port))
    }

    /// Devices on a bus by its public 1-based number, in insertion order.
    pub fn bus_devices(&self, bus: u8) -> Result<&[AuxDevice]> {
        self.buses
            .get(bus.checked_sub(1).ok_or(HubError::BusOutOfRange(bus))? as usize)
            .map(Vec::as_slice)
            .ok_or(HubError::BusOutOfRange(bus))
    }

    /// Count of active pins, ports, and devices; used for metrics.
    pub fn active_channels(&self) -> usize {
        self.pins.iter().filter(|m| **m != PinMode::None).count()
            + self
                .encoders
                .iter()
                .filter(|m| **m != EncoderMode::None)
                .count()
            + self.buses.iter().map(Vec::len).sum::<usize>()
    }
}
