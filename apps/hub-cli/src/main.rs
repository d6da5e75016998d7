use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use tracing::info;

use hub_driver::{
    load_config_file, EncoderMode, Hub, HubConfig, MetricsHub, PinMode, UpdateMode, CHIP_ID,
    FIRMWARE_VERSION, NUM_BUSES, NUM_ENCODER_PORTS, NUM_PINS,
};
use hub_transport::{MockHub, Register, RegisterBus, SerialHub, DEVICE_INFO_LEN};

#[derive(Parser, Debug)]
#[command(
    name = "hub",
    version,
    about = "Sensor hub bench CLI",
    disable_help_subcommand = true
)]
struct Cli {
    /// Use the in-process mock hub (portable)
    #[arg(long, action = ArgAction::SetTrue, global = true)]
    mock: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Backend {
    Mock,
    Serial,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List available hub links
    List {
        /// Backend to query
        #[arg(long, value_enum, default_value_t = Backend::Mock)]
        backend: Backend,
    },
    /// Read and check the hub's identity record
    Info {
        /// Serial port path (ignored with --mock)
        #[arg(long, default_value = "mock0")]
        port: String,
    },
    /// Configure the hub and stream decoded readings as JSON lines
    Poll {
        /// Serial port path (ignored with --mock)
        #[arg(long, default_value = "mock0")]
        port: String,
        /// YAML hub configuration; a demo table is used with --mock
        #[arg(long)]
        config: Option<PathBuf>,
        /// Number of update cycles to run
        #[arg(long, default_value_t = 10u32)]
        cycles: u32,
        /// Pause between cycles in milliseconds
        #[arg(long, default_value_t = 100u64)]
        period_ms: u64,
        /// Dump prometheus metrics after the run
        #[arg(long, action = ArgAction::SetTrue)]
        metrics: bool,
    },
}

fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let cli = Cli::parse();
    match cli.command {
        Commands::List { backend } => cmd_list(effective_backend(backend, cli.mock)),
        Commands::Info { port } => cmd_info(&port, cli.mock),
        Commands::Poll {
            port,
            config,
            cycles,
            period_ms,
            metrics,
        } => cmd_poll(&port, config, cycles, period_ms, metrics, cli.mock),
    }
}

fn effective_backend(backend: Backend, mock: bool) -> Backend {
    if mock {
        Backend::Mock
    } else {
        backend
    }
}

fn cmd_list(backend: Backend) -> Result<()> {
    let links = match backend {
        Backend::Mock => MockHub::list()?,
        Backend::Serial => SerialHub::list()?,
    };
    if links.is_empty() {
        println!("no links found");
    }
    for link in links {
        println!("{}\t{}", link.name, link.driver);
    }
    Ok(())
}

fn cmd_info(port: &str, mock: bool) -> Result<()> {
    let info = if mock {
        let mut bus = MockHub::open(port)?;
        bus.push_read(vec![
            CHIP_ID,
            FIRMWARE_VERSION.major,
            FIRMWARE_VERSION.minor,
            FIRMWARE_VERSION.patch,
        ]);
        bus.read(Register::DeviceInfo.address(), DEVICE_INFO_LEN)?
    } else {
        let mut bus = SerialHub::open(port)?;
        bus.read(Register::DeviceInfo.address(), DEVICE_INFO_LEN)?
    };

    println!(
        "chip id: {:#04x}, firmware: v{}.{}.{}",
        info[0], info[1], info[2], info[3]
    );
    if info[0] != CHIP_ID {
        bail!("unexpected chip id (wanted {CHIP_ID:#04x})");
    }
    if (info[1], info[2], info[3])
        != (
            FIRMWARE_VERSION.major,
            FIRMWARE_VERSION.minor,
            FIRMWARE_VERSION.patch,
        )
    {
        bail!("unexpected firmware version (wanted {FIRMWARE_VERSION})");
    }
    println!("identity ok");
    Ok(())
}

/// Demo table used when polling the mock hub without a config file.
fn demo_config() -> Result<HubConfig> {
    let mut config = HubConfig::new();
    config.set_pin(1, PinMode::Analog)?;
    config.set_pin(2, PinMode::Digital)?;
    Ok(config)
}

/// A well-formed frame for the demo table: status bit clear, one 32-bit
/// analog field, one digital bit, zero padding to 5 bytes.
fn demo_frame(cycle: u32) -> Vec<u8> {
    let analog_milli = 1_000 + u64::from(cycle) * 250;
    let digital = u64::from(cycle % 2);
    let raw = (analog_milli << 1) | (digital << 33);
    raw.to_le_bytes()[..5].to_vec()
}

fn cmd_poll(
    port: &str,
    config_path: Option<PathBuf>,
    cycles: u32,
    period_ms: u64,
    dump_metrics: bool,
    mock: bool,
) -> Result<()> {
    let config = match &config_path {
        Some(path) => load_config_file(path)?,
        None if mock => demo_config()?,
        None => bail!("--config is required unless --mock is set"),
    };

    let metrics = MetricsHub::new().map_err(|e| anyhow::anyhow!(e))?;
    metrics
        .hub
        .channels_configured
        .set(config.active_channels() as i64);

    if mock {
        let bus = MockHub::open(port)?;
        let handle = bus.clone();
        handle.push_read(vec![
            CHIP_ID,
            FIRMWARE_VERSION.major,
            FIRMWARE_VERSION.minor,
            FIRMWARE_VERSION.patch,
        ]);
        let hub = Hub::new(bus);
        hub.init(config.clone(), UpdateMode::Cooperative)
            .context("initializing mock hub")?;
        let frame_len = hub.frame_len()?;
        info!(frame_len, "mock hub initialized");
        for cycle in 0..cycles {
            if config_path.is_some() {
                // Any zeroed frame of the right length is valid for an
                // arbitrary table
                handle.push_read(vec![0u8; frame_len]);
            } else {
                handle.push_read(demo_frame(cycle));
            }
            run_cycle(&hub, &config, cycle, period_ms, &metrics)?;
        }
        log_last_update(&hub);
    } else {
        let bus = SerialHub::open(port)?;
        let hub = Hub::new(bus);
        hub.init(config.clone(), UpdateMode::Cooperative)
            .with_context(|| format!("initializing hub on {port}"))?;
        info!(frame_len = hub.frame_len()?, "hub initialized");
        for cycle in 0..cycles {
            run_cycle(&hub, &config, cycle, period_ms, &metrics)?;
        }
        log_last_update(&hub);
    }

    if dump_metrics {
        print!("{}", metrics.encode_text());
    }
    Ok(())
}

fn log_last_update<B: RegisterBus + Send + 'static>(hub: &Hub<B>) {
    if let Some(ts) = hub.last_update() {
        if let Ok(formatted) = ts.format(&time::format_description::well_known::Rfc3339) {
            info!(last_update = %formatted, "poll finished");
        }
    }
}

fn run_cycle<B: RegisterBus + Send + 'static>(
    hub: &Hub<B>,
    config: &HubConfig,
    cycle: u32,
    period_ms: u64,
    metrics: &MetricsHub,
) -> Result<()> {
    match hub.update() {
        Ok(()) => metrics.hub.updates_total.inc(),
        Err(e) => {
            metrics.hub.update_failures.inc();
            if e.is_fatal() {
                return Err(e.into());
            }
            // Transient: report the cycle and keep polling
            tracing::warn!(cycle, error = %e, "update failed");
            thread::sleep(Duration::from_millis(period_ms));
            return Ok(());
        }
    }

    println!(
        "{}",
        serde_json::to_string(&snapshot(hub, config, cycle)?)?
    );
    thread::sleep(Duration::from_millis(period_ms));
    Ok(())
}

fn snapshot<B: RegisterBus + Send + 'static>(
    hub: &Hub<B>,
    config: &HubConfig,
    cycle: u32,
) -> Result<serde_json::Value> {
    let mut pins = serde_json::Map::new();
    for pin in 1..=NUM_PINS as u8 {
        if config.pin_mode(pin)? != PinMode::None {
            pins.insert(pin.to_string(), hub.read_pin(pin)?.into());
        }
    }

    let mut encoders = serde_json::Map::new();
    for port in 1..=NUM_ENCODER_PORTS as u8 {
        if config.encoder_mode(port)? != EncoderMode::None {
            let reading = hub.read_encoder(port)?;
            encoders.insert(
                port.to_string(),
                serde_json::json!({
                    "position": reading.position,
                    "velocity": reading.velocity,
                }),
            );
        }
    }

    let mut devices = serde_json::Map::new();
    for bus in 1..=NUM_BUSES as u8 {
        for &device in config.bus_devices(bus)? {
            let reading = hub.read_device(bus, device)?;
            let fields: serde_json::Map<String, serde_json::Value> = reading
                .fields()
                .into_iter()
                .map(|(name, value)| (name.to_string(), value.into()))
                .collect();
            devices.insert(format!("{bus}/{device}"), fields.into());
        }
    }

    Ok(serde_json::json!({
        "cycle": cycle,
        "pins": pins,
        "encoders": encoders,
        "devices": devices,
    }))
}
