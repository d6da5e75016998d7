/// 7-bit bus address of the hub itself.
pub const HUB_ADDRESS: u8 = 0x57;

/// Fixed length of the identity record behind [`Register::DeviceInfo`].
pub const DEVICE_INFO_LEN: usize = 4;

/// Register map of the hub. `Init` and `Read` carry variable-length
/// payloads whose size is derived from the active configuration.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Register {
    /// Identity record: chip id, firmware major, minor, patch.
    DeviceInfo,
    /// Write-only configuration bitstream, sent once.
    Init,
    /// Read-only recurring status frame.
    Read,
}

impl Register {
    pub fn address(self) -> u8 {
        match self {
            Register::DeviceInfo => 0x00,
            Register::Init => 0x01,
            Register::Read => 0x02,
        }
    }
}

#[derive(Clone, Debug)]
pub struct BusInfo {
    pub name: String,
    pub driver: String,
}
