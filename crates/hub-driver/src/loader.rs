//! YAML hub configuration descriptors.
//!
//! ```yaml
//! pins:
//!   1: analog
//!   2: digital
//! encoders:
//!   1: quadrature
//! buses:
//!   1: [apds9151, vl53l0x]
//! ```

use crate::config::HubConfig;
use crate::types::{AuxDevice, EncoderMode, PinMode};
use anyhow::Context;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct HubConfigSpec {
    #[serde(default)]
    pins: BTreeMap<u8, PinMode>,
    #[serde(default)]
    encoders: BTreeMap<u8, EncoderMode>,
    #[serde(default)]
    buses: BTreeMap<u8, Vec<AuxDevice>>,
}

impl HubConfigSpec {
    fn into_config(self) -> anyhow::Result<HubConfig> {
        let mut config = HubConfig::new();
        for (pin, mode) in self.pins {
            config
                .set_pin(pin, mode)
                .with_context(|| format!("pin {pin}"))?;
        }
        for (port, mode) in self.encoders {
            config
                .set_encoder(port, mode)
                .with_context(|| format!("encoder port {port}"))?;
        }
        for (bus, devices) in self.buses {
            for device in devices {
                config
                    .add_device(bus, device)
                    .with_context(|| format!("bus {bus}"))?;
            }
        }
        Ok(config)
    }
}

pub fn load_config_str(raw: &str) -> anyhow::Result<HubConfig> {
    let spec: HubConfigSpec = serde_yaml::from_str(raw).context("parsing hub config yaml")?;
    spec.into_config()
}

pub fn load_config_file(path: impl AsRef<Path>) -> anyhow::Result<HubConfig> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading hub config: {}", path.display()))?;
    load_config_str(&raw).with_context(|| format!("loading hub config: {}", path.display()))
}
