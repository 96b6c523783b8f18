//! Per-message pipeline: decode the Telegraf record, inject configured
//! rate fields, resolve identity, update the registry and forward the
//! field set for enabled sensors.

use crate::bus::{Outbound, OutboundSender};
use crate::config::BridgeConfig;
use crate::identity;
use crate::rate::RateCalculator;
use crate::record::MetricRecord;
use crate::registry::{Registry, STATE_PREFIX};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info};

/// Why one message was dropped. Never fatal to the process.
#[derive(Debug, Error)]
pub enum HandleError {
    #[error("invalid metric payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("record has no host tag")]
    MissingHost,
}

pub struct Translator {
    rates: RateCalculator,
    registry: Registry,
    sink: OutboundSender,
}

impl Translator {
    pub fn new(config: &BridgeConfig, sink: OutboundSender) -> Self {
        Self {
            rates: RateCalculator::new(config.calc_ids.iter().cloned()),
            registry: Registry::new(&config.listen_topics, sink.clone()),
            sink,
        }
    }

    /// Processes one delivered payload end to end. An error here means
    /// the message was dropped; the caller logs it and moves on.
    pub fn handle_message(&mut self, payload: &[u8]) -> Result<(), HandleError> {
        let record: MetricRecord = serde_json::from_slice(payload)?;

        // Names are derived from the raw record, so the field-set hash is
        // not disturbed by injected rate fields.
        let host_name = identity::host_name(&record).ok_or(HandleError::MissingHost)?;
        let sensor_name = identity::sensor_name(&record);

        let fields = self.augment(&record, &host_name, &sensor_name);

        let outcome = self
            .registry
            .register(&host_name, &sensor_name, fields.keys().map(String::as_str));
        if outcome.created_any {
            debug!("registered {host_name}/{sensor_name}");
        }
        if outcome.sensor_created && outcome.sensor_enabled {
            info!("Added sensor: {}", describe(&host_name, &sensor_name, &fields));
        }

        if outcome.sensor_enabled {
            let data = serde_json::to_string(&fields)?;
            let topic = format!("{STATE_PREFIX}/{host_name}/{sensor_name}/data");
            if self.sink.send(Outbound::at_least_once(topic, data)).is_err() {
                debug!("outbound channel closed, data message dropped");
            }
        }

        Ok(())
    }

    /// Working copy of the field set, with a `<field>_dt` rate injected
    /// for every field whose unique id is configured for rate
    /// calculation. Non-numeric fields are never applicable.
    fn augment(
        &mut self,
        record: &MetricRecord,
        host_name: &str,
        sensor_name: &str,
    ) -> BTreeMap<String, Value> {
        let mut fields = record.fields.clone();

        for (field, value) in &record.fields {
            let Some(value) = value.as_f64() else { continue };
            let uid = format!("{host_name}_{sensor_name}_{field}");
            if let Some((rate_field, rate)) =
                self.rates.observe(&uid, field, value, record.timestamp)
            {
                fields.insert(rate_field, Value::from(rate));
            }
        }

        fields
    }
}

/// Log summary for a newly added sensor:
/// `telegraf2ha/{host}/{sensor}/[field1,field2]`.
fn describe(host_name: &str, sensor_name: &str, fields: &BTreeMap<String, Value>) -> String {
    let names: Vec<&str> = fields.keys().map(String::as_str).collect();
    format!(
        "{STATE_PREFIX}/{host_name}/{sensor_name}/[{}]",
        names.join(",")
    )
}
