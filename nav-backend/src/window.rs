//! Per-connection rolling buffer of beacon readings and Top-3 aggregation.
//!
//! The readiness trigger is sample-count driven rather than time-driven: a
//! stationary client emits as soon as three beacons have enough evidence,
//! while age pruning only bounds staleness in the background.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reading {
    pub id: String,
    pub rssi: Option<f64>,
    pub filtered: Option<f64>,
    pub distance: Option<f64>,
}

struct Batch {
    at: Instant,
    readings: Vec<Reading>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Top3Entry {
    pub id: String,
    pub filtered: Option<f64>,
    pub rssi: Option<f64>,
    /// Always `null`: the window never measures a range directly, only the
    /// RSSI/filtered scalars the orchestrator turns into a distance later.
    pub distance: Option<f64>,
    pub count: usize,
}

pub struct SampleWindow {
    batches: Vec<Batch>,
    min_valid: f64,
}

impl SampleWindow {
    pub fn new(min_valid: f64) -> Self {
        Self { batches: Vec::new(), min_valid }
    }

    pub fn push(&mut self, readings: Vec<Reading>) {
        self.batches.push(Batch { at: Instant::now(), readings });
    }

    pub fn prune(&mut self, max_age: Duration) {
        let now = Instant::now();
        self.batches.retain(|b| now.duration_since(b.at) <= max_age);
    }

    pub fn clear(&mut self) {
        self.batches.clear();
    }

    /// Flattened copy of every reading currently buffered, for debug
    /// envelopes — does not consume or mutate the window.
    pub fn snapshot_readings(&self) -> Vec<Reading> {
        self.batches.iter().flat_map(|b| b.readings.iter().cloned()).collect()
    }

    fn valid(&self, v: Option<f64>) -> Option<f64> {
        v.filter(|x| *x > self.min_valid)
    }

    /// Returns the three beacons with the strongest aggregate signal, or
    /// `None` if fewer than three qualify or any of the top three has fewer
    /// than `min_count` valid samples.
    pub fn top3_ready(&self, min_count: usize) -> Option<[Top3Entry; 3]> {
        struct Agg {
            filtered_sum: f64,
            filtered_n: usize,
            rssi_sum: f64,
            rssi_n: usize,
        }

        let mut per_beacon: HashMap<&str, Agg> = HashMap::new();
        for batch in &self.batches {
            for r in &batch.readings {
                let entry = per_beacon.entry(r.id.as_str()).or_insert(Agg {
                    filtered_sum: 0.0,
                    filtered_n: 0,
                    rssi_sum: 0.0,
                    rssi_n: 0,
                });
                if let Some(f) = self.valid(r.filtered) {
                    entry.filtered_sum += f;
                    entry.filtered_n += 1;
                }
                if let Some(rs) = self.valid(r.rssi) {
                    entry.rssi_sum += rs;
                    entry.rssi_n += 1;
                }
            }
        }

        let mut candidates: Vec<Top3Entry> = per_beacon
            .into_iter()
            .filter_map(|(id, agg)| {
                if agg.filtered_n == 0 && agg.rssi_n == 0 {
                    return None;
                }
                let avg_filtered = (agg.filtered_n > 0).then(|| agg.filtered_sum / agg.filtered_n as f64);
                let avg_rssi = (agg.rssi_n > 0).then(|| agg.rssi_sum / agg.rssi_n as f64);
                let count = agg.filtered_n.max(agg.rssi_n);
                Some(Top3Entry { id: id.to_string(), filtered: avg_filtered, rssi: avg_rssi, distance: None, count })
            })
            .collect();

        if candidates.len() < 3 {
            return None;
        }

        candidates.sort_by(|a, b| {
            let score_a = a.filtered.or(a.rssi).unwrap_or(f64::NEG_INFINITY);
            let score_b = b.filtered.or(b.rssi).unwrap_or(f64::NEG_INFINITY);
            score_b.partial_cmp(&score_a).unwrap_or(std::cmp::Ordering::Equal)
        });

        let top3 = &candidates[..3];
        if top3.iter().any(|c| c.count < min_count) {
            return None;
        }

        Some([top3[0].clone(), top3[1].clone(), top3[2].clone()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(id: &str, filtered: f64) -> Reading {
        Reading { id: id.to_string(), rssi: None, filtered: Some(filtered), distance: None }
    }

    #[test]
    fn requires_count_trigger_before_ready() {
        let mut w = SampleWindow::new(-99.0);
        for _ in 0..9 {
            w.push(vec![reading("a", -60.0), reading("b", -65.0), reading("c", -70.0)]);
        }
        assert!(w.top3_ready(10).is_none());

        w.push(vec![reading("a", -60.0), reading("b", -65.0), reading("c", -70.0)]);
        let top3 = w.top3_ready(10).expect("should be ready at 10 batches");
        assert_eq!(top3[0].id, "a");

        w.clear();
        w.push(vec![reading("a", -60.0), reading("b", -65.0), reading("c", -70.0)]);
        assert!(w.top3_ready(10).is_none());
    }

    #[test]
    fn invalid_samples_excluded() {
        let mut w = SampleWindow::new(-99.0);
        for _ in 0..10 {
            w.push(vec![reading("a", -100.0), reading("b", -60.0), reading("c", -65.0)]);
        }
        // "a" never contributes a valid sample so fewer than 3 candidates qualify.
        assert!(w.top3_ready(10).is_none());
    }

    #[test]
    fn prune_drops_stale_batches() {
        let mut w = SampleWindow::new(-99.0);
        w.push(vec![reading("a", -60.0)]);
        w.prune(Duration::from_secs(0));
        assert!(w.batches.is_empty());
    }
}
