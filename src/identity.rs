//! Naming rules: host names, sensor names and measurement unique ids are
//! derived from the record alone, so identical records always map to the
//! same registry nodes and Home Assistant entities.

use crate::record::MetricRecord;
use sha2::{Digest, Sha256};

/// Sanitized host name: every character outside `[A-Za-z0-9_-]` becomes
/// `_`. Returns `None` when the record has no `host` tag.
pub fn host_name(record: &MetricRecord) -> Option<String> {
    let host = record.tags.get("host")?;
    Some(
        host.chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect(),
    )
}

/// Sensor name: the measurement name, refined by the `name` tag, widened
/// by the differentiating tags, and terminated by a short hash of the
/// field-name set.
pub fn sensor_name(record: &MetricRecord) -> String {
    let mut sensor = record.name.clone();

    if let Some(ext) = record.tags.get("name").filter(|v| !v.is_empty()) {
        if sensor.contains(ext.as_str()) {
            // already covered by the measurement name
        } else if ext.contains(&sensor) {
            sensor = ext.clone();
        } else {
            sensor = format!("{sensor}_{ext}");
        }
    }

    // Tags that tell apart same-named measurements (per-core cpu, per-disk
    // io, ...), in fixed order. Only consulted when the record carries
    // more than the bare host tag.
    if record.tags.len() > 1 {
        for key in ["cpu", "device", "interface", "feature"] {
            let value = record.tags.get(key).map(String::as_str).unwrap_or("");
            let segment = format!("_{value}");
            sensor.push_str(segment.trim_end_matches('_'));
        }
    }

    // Same-named sensors with different field sets would otherwise collide
    // in Home Assistant.
    sensor.push('_');
    sensor.push_str(&field_set_suffix(record));

    sensor
}

/// Globally unique measurement id: `host_sensor_measurement`.
pub fn unique_id(record: &MetricRecord, measurement: &str) -> Option<String> {
    let host = host_name(record)?;
    let sensor = sensor_name(record);
    Some(format!("{host}_{sensor}_{measurement}"))
}

/// First two hex characters of the hash of the record's field-name set
/// (sorted, comma-joined).
fn field_set_suffix(record: &MetricRecord) -> String {
    let keys: Vec<&str> = record.fields.keys().map(String::as_str).collect();
    let digest = Sha256::digest(keys.join(",").as_bytes());
    format!("{:02x}", digest[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(json: &str) -> MetricRecord {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn host_name_is_sanitized() {
        let r = record(r#"{"name":"cpu","tags":{"host":"my host!"},"fields":{},"timestamp":1}"#);
        assert_eq!(host_name(&r).unwrap(), "my_host_");
    }

    #[test]
    fn host_name_requires_the_host_tag() {
        let r = record(r#"{"name":"cpu","tags":{},"fields":{},"timestamp":1}"#);
        assert!(host_name(&r).is_none());
    }

    #[test]
    fn sensor_name_is_deterministic() {
        let json = r#"{"name":"cpu","tags":{"host":"box1","cpu":"cpu0"},"fields":{"usage_idle":50},"timestamp":100}"#;
        assert_eq!(sensor_name(&record(json)), sensor_name(&record(json)));
        assert_eq!(
            unique_id(&record(json), "usage_idle"),
            unique_id(&record(json), "usage_idle")
        );
    }

    #[test]
    fn name_tag_already_contained_is_ignored() {
        let r = record(
            r#"{"name":"disk_sda","tags":{"host":"h","name":"sda"},"fields":{},"timestamp":1}"#,
        );
        assert!(sensor_name(&r).starts_with("disk_sda_"));
    }

    #[test]
    fn name_tag_containing_the_measurement_replaces_it() {
        let r = record(
            r#"{"name":"disk","tags":{"host":"h","name":"disk_sda"},"fields":{},"timestamp":1}"#,
        );
        assert!(sensor_name(&r).starts_with("disk_sda"));
    }

    #[test]
    fn unrelated_name_tag_is_appended() {
        let r = record(
            r#"{"name":"smart","tags":{"host":"h","name":"sda"},"fields":{},"timestamp":1}"#,
        );
        assert!(sensor_name(&r).starts_with("smart_sda"));
    }

    #[test]
    fn differentiating_tags_are_appended_in_fixed_order() {
        let r = record(
            r#"{"name":"x","tags":{"host":"h","device":"sda","cpu":"cpu7"},"fields":{},"timestamp":1}"#,
        );
        assert!(sensor_name(&r).starts_with("x_cpu7_sda"));
    }

    #[test]
    fn single_tag_skips_differentiators() {
        // Only the host tag: the cpu/device/interface/feature lookup is
        // not even consulted.
        let r = record(r#"{"name":"mem","tags":{"host":"h"},"fields":{},"timestamp":1}"#);
        let name = sensor_name(&r);
        assert_eq!(name.len(), "mem".len() + 3);
        assert!(name.starts_with("mem_"));
    }

    #[test]
    fn suffix_is_two_hex_characters() {
        let r = record(r#"{"name":"cpu","tags":{"host":"h"},"fields":{"a":1},"timestamp":1}"#);
        let name = sensor_name(&r);
        let suffix = &name[name.len() - 2..];
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(name.as_bytes()[name.len() - 3], b'_');
    }

    #[test]
    fn different_field_sets_get_different_suffixes() {
        let a = record(r#"{"name":"cpu","tags":{"host":"h"},"fields":{"a":1},"timestamp":1}"#);
        let b = record(r#"{"name":"cpu","tags":{"host":"h"},"fields":{"b":1},"timestamp":1}"#);
        assert_ne!(sensor_name(&a), sensor_name(&b));
    }

    #[test]
    fn suffix_ignores_json_key_order() {
        let a = record(r#"{"name":"cpu","tags":{"host":"h"},"fields":{"a":1,"b":2},"timestamp":1}"#);
        let b = record(r#"{"name":"cpu","tags":{"host":"h"},"fields":{"b":2,"a":1},"timestamp":1}"#);
        assert_eq!(sensor_name(&a), sensor_name(&b));
    }
}
