use std::collections::HashMap;

/// In-memory cumulative totals in seconds, keyed by display name. Mutated only
/// inside the tracker's lock; external readers go through the persisted file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaytimeStore {
    totals: HashMap<String, f64>,
}

impl PlaytimeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Usually seeded from [PlaytimeFile::load](super::persist::PlaytimeFile::load)
    /// at startup.
    pub fn from_totals(totals: HashMap<String, f64>) -> Self {
        Self { totals }
    }

    /// Adds a completed session to a display name, creating the entry on
    /// first use. Non-positive and NaN durations are dropped so totals never
    /// decrease.
    pub fn add(&mut self, display_name: &str, seconds: f64) {
        if seconds.is_nan() || seconds <= 0.0 {
            return;
        }
        *self.totals.entry(display_name.to_owned()).or_insert(0.0) += seconds;
    }

    pub fn snapshot(&self) -> HashMap<String, f64> {
        self.totals.clone()
    }

    pub fn total_for(&self, display_name: &str) -> Option<f64> {
        self.totals.get(display_name).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }
}
