//! In-memory Host → Sensor → Measurement registry.
//!
//! Nodes are created lazily on first sight and never removed; creating an
//! enabled measurement is the one place a discovery config message is
//! emitted, so Home Assistant learns about each entity exactly once per
//! process lifetime. Enablement is decided at creation time by matching
//! the measurement's discovery topic against the allow-list patterns, and
//! propagated upward to the sensor and host here rather than by the nodes
//! themselves.

use crate::bus::{Outbound, OutboundSender};
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, error};

pub const HA_PREFIX: &str = "homeassistant/sensor";
pub const STATE_PREFIX: &str = "telegraf2ha";

/// Device block reused verbatim in every discovery payload under one host.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    identifiers: String,
    model: String,
    name: String,
    sw_version: String,
    manufacturer: String,
}

impl DeviceInfo {
    fn for_host(host: &str) -> Self {
        Self {
            identifiers: format!("bridge_{host}"),
            model: "Telegraf 2 Home Assistant Bridge".to_string(),
            name: host.to_string(),
            sw_version: env!("CARGO_PKG_VERSION").to_string(),
            manufacturer: "telegraf2ha".to_string(),
        }
    }
}

#[derive(Debug)]
struct Host {
    device: DeviceInfo,
    enabled: bool,
    sensors: HashMap<String, Sensor>,
}

#[derive(Debug)]
struct Sensor {
    enabled: bool,
    measurements: HashMap<String, Measurement>,
}

#[derive(Debug)]
struct Measurement {
    topic: String,
    unique_id: String,
    full_name: String,
    unit: Option<&'static str>,
    device_class: Option<&'static str>,
    icon: Option<&'static str>,
    enabled: bool,
}

impl Measurement {
    fn derive(host: &str, sensor: &str, field: &str, patterns: &[Regex]) -> Self {
        let topic = format!("{HA_PREFIX}/{host}/{sensor}_{field}");
        let unique_id = format!("{host}_{sensor}_{field}");

        // Sensor names end with "_xx" (the field-set hash); the metadata
        // rules match on the name without it.
        let base = &sensor[..sensor.len().saturating_sub(3)];
        let full_name = format!("{base}_{field}");

        let enabled = patterns.iter().any(|re| re.is_match(&topic));

        Self {
            unique_id,
            unit: parse_unit(&full_name),
            device_class: parse_device_class(&full_name),
            icon: parse_icon(&full_name),
            enabled,
            topic,
            full_name,
        }
    }
}

/// Home Assistant MQTT discovery config payload.
#[derive(Debug, Serialize)]
struct DiscoveryConfig<'a> {
    name: String,
    state_topic: String,
    device_class: Option<&'static str>,
    unit_of_measurement: Option<&'static str>,
    icon: Option<&'static str>,
    device: &'a DeviceInfo,
    unique_id: &'a str,
    platform: &'static str,
    value_template: String,
}

/// What `register` did, so the caller can decide whether to forward data
/// and what to log.
#[derive(Debug)]
pub struct RegisterOutcome {
    pub created_any: bool,
    pub sensor_created: bool,
    pub sensor_enabled: bool,
}

pub struct Registry {
    hosts: HashMap<String, Host>,
    patterns: Vec<Regex>,
    sink: OutboundSender,
}

impl Registry {
    /// Compiles the allow-list. A pattern that fails to compile is logged
    /// and skipped; it simply never enables anything.
    pub fn new(patterns: &[String], sink: OutboundSender) -> Self {
        let patterns = patterns
            .iter()
            .filter_map(|p| match Regex::new(p) {
                Ok(re) => Some(re),
                Err(e) => {
                    error!("error compiling listen-topics pattern {p}: {e}");
                    None
                }
            })
            .collect();

        Self {
            hosts: HashMap::new(),
            patterns,
            sink,
        }
    }

    /// Looks up or creates the host, the sensor under it, and one
    /// measurement per field name. Re-registering a known triple is a
    /// no-op. Newly created enabled measurements are announced and flip
    /// their sensor's and host's enabled flag.
    pub fn register<'a>(
        &mut self,
        host_name: &str,
        sensor_name: &str,
        fields: impl Iterator<Item = &'a str>,
    ) -> RegisterOutcome {
        let host_created = !self.hosts.contains_key(host_name);
        let host = self.hosts.entry(host_name.to_string()).or_insert_with(|| {
            debug!("created host: {host_name}");
            Host {
                device: DeviceInfo::for_host(host_name),
                enabled: false,
                sensors: HashMap::new(),
            }
        });

        let sensor_created = !host.sensors.contains_key(sensor_name);
        let sensor = host
            .sensors
            .entry(sensor_name.to_string())
            .or_insert_with(|| {
                debug!("created sensor: {sensor_name}");
                Sensor {
                    enabled: false,
                    measurements: HashMap::new(),
                }
            });

        let mut measurement_created = false;
        let mut enable_host = false;
        for field in fields {
            if sensor.measurements.contains_key(field) {
                continue;
            }
            measurement_created = true;

            let m = Measurement::derive(host_name, sensor_name, field, &self.patterns);
            debug!(
                "created measurement: {field}, {}, enabled={}",
                m.topic, m.enabled
            );

            if m.enabled {
                announce(&self.sink, &m, host_name, sensor_name, &host.device, field);
                sensor.enabled = true;
                enable_host = true;
            }
            sensor.measurements.insert(field.to_string(), m);
        }

        let sensor_enabled = sensor.enabled;
        if enable_host && !host.enabled {
            debug!("enabled host: {host_name}");
            host.enabled = true;
        }

        RegisterOutcome {
            created_any: host_created || sensor_created || measurement_created,
            sensor_created,
            sensor_enabled,
        }
    }

    #[cfg(test)]
    fn host_enabled(&self, host: &str) -> bool {
        self.hosts.get(host).map(|h| h.enabled).unwrap_or(false)
    }
}

/// Publishes the one-time discovery config for a newly created enabled
/// measurement.
fn announce(
    sink: &OutboundSender,
    m: &Measurement,
    host_name: &str,
    sensor_name: &str,
    device: &DeviceInfo,
    field: &str,
) {
    let config = DiscoveryConfig {
        name: format!("{host_name}_{}", m.full_name),
        state_topic: format!("{STATE_PREFIX}/{host_name}/{sensor_name}/data"),
        device_class: m.device_class,
        unit_of_measurement: m.unit,
        icon: m.icon,
        device,
        unique_id: &m.unique_id,
        platform: "mqtt",
        value_template: format!("{{{{ value_json.{field} | round(2) }}}}"),
    };

    let payload = match serde_json::to_string(&config) {
        Ok(payload) => payload,
        Err(e) => {
            error!("failed to encode discovery config for {}: {e}", m.topic);
            return;
        }
    };

    let topic = format!("{}/config", m.topic);
    debug!("announce measurement: {field}, {topic}");
    if sink.send(Outbound::at_least_once(topic, payload)).is_err() {
        error!("outbound channel closed, discovery config for {} lost", m.topic);
    }
}

fn parse_unit(name: &str) -> Option<&'static str> {
    if name.contains("_bytes") || name.contains("bytes_") {
        Some("B")
    } else if name.contains("percent") {
        Some("%")
    } else if name.contains("_temp_c") {
        Some("°C")
    } else {
        None
    }
}

fn parse_device_class(name: &str) -> Option<&'static str> {
    if name.contains("_bytes") || name.contains("bytes_") {
        Some("data_size")
    } else if name.contains("percent") {
        None
    } else if name.contains("_temp_c") {
        Some("temperature")
    } else {
        None
    }
}

fn parse_icon(name: &str) -> Option<&'static str> {
    if name.contains("_temp_c") {
        Some("mdi:thermometer")
    } else if name.contains("cpu_") {
        Some("mdi:cpu-64-bit")
    } else if name.contains("mem_") {
        Some("mdi:memory")
    } else if name.contains("disk_") || name.contains("diskio_") {
        Some("mdi:harddisk")
    } else if name.contains("net_") || name.contains("pf_") {
        Some("mdi:lan")
    } else if name.contains("smart_attribute_") || name.contains("smart_device_") || name.contains("zfs_") {
        Some("mdi:harddisk-plus")
    } else {
        None
    }
}
