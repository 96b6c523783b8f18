use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

/// One observation as published by Telegraf's MQTT output: a measurement
/// name, a tag set and a numeric field set.
///
/// Field values stay as raw JSON numbers so integers are republished as
/// integers. Keys are kept sorted so derived names and output payloads do
/// not depend on the JSON key order of the incoming message.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricRecord {
    pub name: String,
    #[serde(default)]
    pub tags: HashMap<String, String>,
    #[serde(default)]
    pub fields: BTreeMap<String, serde_json::Value>,
    pub timestamp: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_a_telegraf_payload() {
        let record: MetricRecord = serde_json::from_str(
            r#"{"name":"cpu","tags":{"host":"box1","cpu":"cpu0"},"fields":{"usage_idle":50},"timestamp":100}"#,
        )
        .unwrap();
        assert_eq!(record.name, "cpu");
        assert_eq!(record.tags["host"], "box1");
        assert_eq!(record.fields["usage_idle"], serde_json::json!(50));
        assert_eq!(record.timestamp, 100.0);
    }

    #[test]
    fn tags_and_fields_default_to_empty() {
        let record: MetricRecord =
            serde_json::from_str(r#"{"name":"cpu","timestamp":1}"#).unwrap();
        assert!(record.tags.is_empty());
        assert!(record.fields.is_empty());
    }

    #[test]
    fn rejects_payload_without_timestamp() {
        let result: Result<MetricRecord, _> = serde_json::from_str(r#"{"name":"cpu"}"#);
        assert!(result.is_err());
    }
}
