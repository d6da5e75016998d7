use crate::types::{AuxDevice, FirmwareVersion};
use hub_transport::TransportError;
use thiserror::Error;

pub type Result<T, E = HubError> = core::result::Result<T, E>;

/// Broad class of a [`HubError`], so callers can tell a fatal
/// compatibility failure apart from a per-cycle transport failure.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// Bad configuration, caught before any transport activity.
    Configuration,
    /// Wrong chip or firmware at handshake; fatal.
    Compatibility,
    /// A failed read/write or a rejected frame; the cache is unchanged
    /// and the caller may try again next cycle.
    Transport,
    /// Caller-side misuse of the driver API.
    Usage,
}

#[derive(Debug, Error)]
pub enum HubError {
    // configuration
    #[error("pin must be from 1 to 12, got {0}")]
    PinOutOfRange(u8),
    #[error("encoder port must be from 1 to 6, got {0}")]
    EncoderOutOfRange(u8),
    #[error("bus must be from 1 to 3, got {0}")]
    BusOutOfRange(u8),
    #[error("bus {bus} already has a {device}")]
    DuplicateDevice { bus: u8, device: AuxDevice },
    #[error(
        "bus {bus} already has a {existing} whose address {address:#04x} conflicts with the {device}"
    )]
    AddressConflict {
        bus: u8,
        device: AuxDevice,
        existing: AuxDevice,
        address: u8,
    },
    #[error("the hub may only be initialized once")]
    AlreadyInitialized,

    // compatibility
    #[error("hub does not report correct chip id; received {got:#04x}, expected {expected:#04x}")]
    ChipIdMismatch { got: u8, expected: u8 },
    #[error("hub does not report correct firmware version; received {got}, expected {expected}")]
    FirmwareMismatch {
        got: FirmwareVersion,
        expected: FirmwareVersion,
    },

    // transport / frame
    #[error("hub flagged the status frame invalid; check the configuration")]
    FrameRejected,
    #[error(transparent)]
    Transport(#[from] TransportError),

    // usage
    #[error("the hub must be initialized before use")]
    NotInitialized,
    #[error("pin {0} was not configured")]
    PinNotConfigured(u8),
    #[error("encoder port {0} was not configured")]
    EncoderNotConfigured(u8),
    #[error("no {device} configured on bus {bus}")]
    DeviceNotConfigured { bus: u8, device: AuxDevice },
    #[error("update may only run on the dedicated update thread")]
    WrongUpdateThread,
}

impl HubError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HubError::PinOutOfRange(_)
            | HubError::EncoderOutOfRange(_)
            | HubError::BusOutOfRange(_)
            | HubError::DuplicateDevice { .. }
            | HubError::AddressConflict { .. }
            | HubError::AlreadyInitialized => ErrorKind::Configuration,
            HubError::ChipIdMismatch { .. } | HubError::FirmwareMismatch { .. } => {
                ErrorKind::Compatibility
            }
            HubError::FrameRejected | HubError::Transport(_) => ErrorKind::Transport,
            HubError::NotInitialized
            | HubError::PinNotConfigured(_)
            | HubError::EncoderNotConfigured(_)
            | HubError::DeviceNotConfigured { .. }
            | HubError::WrongUpdateThread => ErrorKind::Usage,
        }
    }

    /// Compatibility failures are not recoverable by retrying.
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Compatibility
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_are_distinguishable() {
        assert_eq!(HubError::PinOutOfRange(13).kind(), ErrorKind::Configuration);
        assert_eq!(
            HubError::ChipIdMismatch {
                got: 0x00,
                expected: 0x61
            }
            .kind(),
            ErrorKind::Compatibility
        );
        assert_eq!(HubError::FrameRejected.kind(), ErrorKind::Transport);
        assert_eq!(
            HubError::Transport(TransportError::Timeout).kind(),
            ErrorKind::Transport
        );
        assert_eq!(HubError::WrongUpdateThread.kind(), ErrorKind::Usage);
    }

    #[test]
    fn test_only_compatibility_is_fatal() {
        assert!(HubError::FirmwareMismatch {
            got: FirmwareVersion {
                major: 2,
                minor: 0,
                patch: 0
            },
            expected: crate::types::FIRMWARE_VERSION,
        }
        .is_fatal());
        assert!(!HubError::FrameRejected.is_fatal());
        assert!(!HubError::NotInitialized.is_fatal());
    }
}
