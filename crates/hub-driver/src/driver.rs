//! Driver façade: handshake, one-time configuration, and the update cycle.

use crate::cache::StateCache;
use crate::config::HubConfig;
use crate::decode::decode_frame;
use crate::error::{ErrorKind, HubError, Result};
use crate::layout::{encode_init, update_frame_len};
use crate::types::{
    AuxDevice, DeviceReading, EncoderMode, EncoderReading, FirmwareVersion, PinMode, CHIP_ID,
    FIRMWARE_VERSION,
};
use hub_transport::{Register, RegisterBus, TransportError, DEVICE_INFO_LEN};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;
use time::OffsetDateTime;
use tracing::{debug, error, info, warn};

/// Pause between update cycles of the dedicated producer thread.
const UPDATE_INTERVAL: Duration = Duration::from_millis(2);
/// Pause before the producer retries after a failed cycle.
const FAULT_BACKOFF: Duration = Duration::from_millis(25);

/// Who performs update transactions.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UpdateMode {
    /// The caller invokes [`Hub::update`] itself before reading.
    Cooperative,
    /// The driver owns a single producer thread that loops updates for
    /// the driver's lifetime; `update` from any other thread is rejected.
    Threaded,
}

/// Lifecycle of the driver.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DriverState {
    Uninitialized,
    AwaitingHandshake,
    Configuring,
    Ready,
    Updating,
    /// A transaction failed (including an unplugged hub). Reads still
    /// serve the last committed values; a later successful update returns
    /// the driver to `Ready`.
    Faulted,
}

/// Everything frozen by a successful init.
struct Session {
    config: HubConfig,
    frame_len: usize,
    cache: StateCache,
    mode: UpdateMode,
    producer_thread: OnceLock<ThreadId>,
}

struct Shared<B> {
    bus: Mutex<B>,
    state: RwLock<DriverState>,
    session: OnceLock<Session>,
    last_update: RwLock<Option<OffsetDateTime>>,
    stop: AtomicBool,
}

impl<B: RegisterBus> Shared<B> {
    /// One full update transaction: read the frame, decode it, commit it.
    /// Nothing is committed on any failure.
    fn update_once(&self) -> Result<()> {
        let session = self.session.get().ok_or(HubError::NotInitialized)?;

        if session.mode == UpdateMode::Threaded
            && session.producer_thread.get().copied() != Some(thread::current().id())
        {
            return Err(HubError::WrongUpdateThread);
        }

        *self.state.write() = DriverState::Updating;

        let result = self.transact(session);
        match &result {
            Ok(()) => {
                *self.last_update.write() = Some(OffsetDateTime::now_utc());
                *self.state.write() = DriverState::Ready;
            }
            Err(e) => {
                warn!(error = %e, "hub update failed");
                *self.state.write() = DriverState::Faulted;
            }
        }
        result
    }

    fn transact(&self, session: &Session) -> Result<()> {
        let frame = {
            let mut bus = self.bus.lock();
            bus.read(Register::Read.address(), session.frame_len)?
        };
        if frame.len() != session.frame_len {
            return Err(HubError::Transport(TransportError::ShortRead {
                expected: session.frame_len,
                got: frame.len(),
            }));
        }
        let staged = decode_frame(&session.config, &frame)?;
        session.cache.commit(&staged);
        Ok(())
    }
}

/// The hub driver.
///
/// Construct with [`Hub::new`], configure and handshake with
/// [`Hub::init`] (exactly once), then read typed values while updates run
/// either cooperatively or on the driver's own producer thread.
pub struct Hub<B: RegisterBus> {
    shared: Arc<Shared<B>>,
    producer: Mutex<Option<JoinHandle<()>>>,
}

impl<B: RegisterBus + Send + 'static> Hub<B> {
    pub fn new(bus: B) -> Self {
        Self {
            shared: Arc::new(Shared {
                bus: Mutex::new(bus),
                state: RwLock::new(DriverState::Uninitialized),
                session: OnceLock::new(),
                last_update: RwLock::new(None),
                stop: AtomicBool::new(false),
            }),
            producer: Mutex::new(None),
        }
    }

    /// Handshake with the hub, send the configuration, and become ready.
    ///
    /// The table is consumed and frozen here. A chip id or firmware
    /// mismatch is fatal: the driver parks in `Faulted` and never reaches
    /// `Ready`. Calling `init` a second time fails with
    /// [`HubError::AlreadyInitialized`].
    pub fn init(&self, config: HubConfig, mode: UpdateMode) -> Result<()> {
        {
            let mut state = self.shared.state.write();
            if *state != DriverState::Uninitialized {
                return Err(HubError::AlreadyInitialized);
            }
            *state = DriverState::AwaitingHandshake;
        }

        if let Err(e) = self.verify_identity() {
            error!(error = %e, "hub handshake failed");
            *self.shared.state.write() = DriverState::Faulted;
            return Err(e);
        }

        *self.shared.state.write() = DriverState::Configuring;

        let frame_len = update_frame_len(&config);
        let stream = encode_init(&config);
        debug!(
            init_bytes = stream.len(),
            frame_len, "sending hub configuration"
        );
        {
            let mut bus = self.shared.bus.lock();
            if let Err(e) = bus.write(Register::Init.address(), &stream) {
                *self.shared.state.write() = DriverState::Faulted;
                return Err(e.into());
            }
        }

        let session = Session {
            cache: StateCache::for_config(&config),
            frame_len,
            config,
            mode,
            producer_thread: OnceLock::new(),
        };
        if self.shared.session.set(session).is_err() {
            return Err(HubError::AlreadyInitialized);
        }

        *self.shared.state.write() = DriverState::Ready;
        info!(frame_len, ?mode, "hub ready");

        if mode == UpdateMode::Threaded {
            self.spawn_producer();
        }
        Ok(())
    }

    fn verify_identity(&self) -> Result<()> {
        let info = {
            let mut bus = self.shared.bus.lock();
            bus.read(Register::DeviceInfo.address(), DEVICE_INFO_LEN)?
        };
        if info.len() < DEVICE_INFO_LEN {
            return Err(HubError::Transport(TransportError::ShortRead {
                expected: DEVICE_INFO_LEN,
                got: info.len(),
            }));
        }
        if info[0] != CHIP_ID {
            return Err(HubError::ChipIdMismatch {
                got: info[0],
                expected: CHIP_ID,
            });
        }
        let reported = FirmwareVersion {
            major: info[1],
            minor: info[2],
            patch: info[3],
        };
        if reported != FIRMWARE_VERSION {
            return Err(HubError::FirmwareMismatch {
                got: reported,
                expected: FIRMWARE_VERSION,
            });
        }
        debug!(chip_id = info[0], firmware = %reported, "hub identity verified");
        Ok(())
    }

    fn spawn_producer(&self) {
        let shared = Arc::clone(&self.shared);
        let handle = thread::spawn(move || {
            if let Some(session) = shared.session.get() {
                let _ = session.producer_thread.set(thread::current().id());
            }
            while !shared.stop.load(Ordering::Relaxed) {
                match shared.update_once() {
                    Ok(()) => thread::sleep(UPDATE_INTERVAL),
                    Err(e) if e.kind() == ErrorKind::Usage => {
                        // A usage error inside the producer is a driver bug
                        error!(error = %e, "producer stopping");
                        break;
                    }
                    Err(_) => thread::sleep(FAULT_BACKOFF),
                }
            }
        });
        *self.producer.lock() = Some(handle);
    }

    /// Perform one update transaction.
    ///
    /// In threaded mode only the producer thread may call this; any other
    /// caller is rejected before the transport is touched. A failure
    /// leaves the cache unchanged and the driver `Faulted` until a later
    /// cycle succeeds; the driver itself never retries.
    pub fn update(&self) -> Result<()> {
        self.shared.update_once()
    }

    /// Latest value of an analog/digital pin (1 to 12).
    pub fn read_pin(&self, pin: u8) -> Result<f64> {
        let session = self.session()?;
        match session.config.pin_mode(pin)? {
            PinMode::None => Err(HubError::PinNotConfigured(pin)),
            _ => Ok(session.cache.pin((pin - 1) as usize)),
        }
    }

    /// Latest position and velocity of an encoder port (1 to 6).
    pub fn read_encoder(&self, port: u8) -> Result<EncoderReading> {
        let session = self.session()?;
        match session.config.encoder_mode(port)? {
            EncoderMode::None => Err(HubError::EncoderNotConfigured(port)),
            _ => Ok(session.cache.encoder((port - 1) as usize)),
        }
    }

    /// Latest record of an auxiliary device on a bus (1 to 3).
    pub fn read_device(&self, bus: u8, device: AuxDevice) -> Result<DeviceReading> {
        let session = self.session()?;
        session.config.bus_devices(bus)?;
        session
            .cache
            .device((bus - 1) as usize, device)
            .ok_or(HubError::DeviceNotConfigured { bus, device })
    }

    /// Zero an encoder's accumulated position, keeping its velocity.
    pub fn reset_encoder(&self, port: u8) -> Result<()> {
        let session = self.session()?;
        match session.config.encoder_mode(port)? {
            EncoderMode::None => Err(HubError::EncoderNotConfigured(port)),
            _ => {
                session.cache.reset_encoder((port - 1) as usize);
                Ok(())
            }
        }
    }

    pub fn state(&self) -> DriverState {
        *self.shared.state.read()
    }

    /// When the last successful update committed, if any.
    pub fn last_update(&self) -> Option<OffsetDateTime> {
        *self.shared.last_update.read()
    }

    /// Byte length of the status frame the active configuration implies.
    pub fn frame_len(&self) -> Result<usize> {
        Ok(self.session()?.frame_len)
    }

    fn session(&self) -> Result<&Session> {
        self.shared.session.get().ok_or(HubError::NotInitialized)
    }
}

impl<B: RegisterBus> Drop for Hub<B> {
    fn drop(&mut self) {
        self.shared.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.producer.lock().take() {
            let _ = handle.join();
        }
    }
}
