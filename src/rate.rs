//! Derived rate-of-change values for configured monotonic counters.

use std::collections::HashMap;

/// Previous sample for one tracked counter.
#[derive(Debug, Default)]
struct RateEntry {
    prev_value: f64,
    prev_t: f64,
}

/// Tracks the counters named in the `TELEGRAF2HA_CALC` list, keyed by
/// measurement unique id. Entries live for the whole process; there is no
/// eviction and no persistence across restarts.
#[derive(Debug)]
pub struct RateCalculator {
    entries: HashMap<String, RateEntry>,
}

impl RateCalculator {
    pub fn new(ids: impl IntoIterator<Item = String>) -> Self {
        let entries = ids
            .into_iter()
            .filter(|id| !id.is_empty())
            .map(|id| (id, RateEntry::default()))
            .collect();
        Self { entries }
    }

    /// Rate of change for a configured id, or `None` when the id is not
    /// tracked. On a hit, returns the derived field name (`<field>_dt`)
    /// and `(value - prev) / (t - prev_t)`, then stores the new pair.
    ///
    /// A value numerically equal to its own delta is reported as 0.0: the
    /// stored previous value starts at 0, so without this rule the first
    /// sample would produce a meaningless spike. The check cannot tell a
    /// first sample apart from a genuine value following an exact zero,
    /// and a repeated timestamp divides by zero; both behaviors are kept
    /// as-is (see the tests).
    pub fn observe(&mut self, id: &str, field: &str, value: f64, t: f64) -> Option<(String, f64)> {
        let entry = self.entries.get_mut(id)?;

        let delta = value - entry.prev_value;
        let mut rate = delta / (t - entry.prev_t);

        entry.prev_value = value;
        entry.prev_t = t;

        if value == delta {
            rate = 0.0;
        }

        Some((format!("{field}_dt"), rate))
    }
}
