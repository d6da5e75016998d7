use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

#[derive(Clone)]
pub struct HubMetrics {
    pub updates_total: IntCounter,
    pub update_failures: IntCounter,
    pub channels_configured: IntGauge,
}

#[derive(Clone)]
pub struct MetricsHub {
    pub registry: Registry,
    pub hub: HubMetrics,
}

impl MetricsHub {
    pub fn new() -> Result<Self, String> {
        let registry = Registry::new();
        let updates_total = IntCounter::new("hub_updates_total", "Total successful hub updates")
            .map_err(|e| format!("metrics init error: {e}"))?;
        let update_failures =
            IntCounter::new("hub_update_failures_total", "Total failed hub updates")
                .map_err(|e| format!("metrics init error: {e}"))?;
        let channels_configured = IntGauge::new(
            "hub_channels_configured",
            "Number of active pins, encoder ports, and bus devices",
        )
        .map_err(|e| format!("metrics init error: {e}"))?;
        let hub = HubMetrics {
            updates_total,
            update_failures,
            channels_configured,
        };
        let _ = registry.register(Box::new(hub.updates_total.clone()));
        let _ = registry.register(Box::new(hub.update_failures.clone()));
        let _ = registry.register(Box::new(hub.channels_configured.clone()));
        Ok(Self { registry, hub })
    }

    pub fn encode_text(&self) -> String {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buf) {
            return format!("error encoding metrics: {e}");
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_land_in_the_text_dump() {
        let metrics = MetricsHub::new().unwrap();
        metrics.hub.updates_total.inc();
        metrics.hub.updates_total.inc();
        metrics.hub.update_failures.inc();
        metrics.hub.channels_configured.set(4);

        let text = metrics.encode_text();
        assert!(text.contains("hub_updates_total 2"));
        assert!(text.contains("hub_update_failures_total 1"));
        assert!(text.contains("hub_channels_configured 4"));
    }
}
