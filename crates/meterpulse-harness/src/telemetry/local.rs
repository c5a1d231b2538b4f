//! In-process metric registry.
//!
//! Counter and histogram series are keyed by sorted label vectors in a
//! `DashMap`, so the same label set always lands in the same series
//! regardless of insertion order. Histogram buckets are cumulative and use the
//! pipeline's explicit boundaries. Snapshots render in Prometheus text format.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use meterpulse_core::error::{PulseError, Result};
use meterpulse_core::instrument::{InstrumentKind, InstrumentSpec};
use meterpulse_core::labels::LabelSet;
use meterpulse_core::sink::{CounterInstrument, HistogramInstrument, MetricSink};

type SeriesKey = Vec<(String, String)>;

/// Helper to escape label values.
fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn label_str(key: &SeriesKey) -> String {
    key.iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
        .collect::<Vec<_>>()
        .join(",")
}

pub struct LocalCounter {
    description: &'static str,
    map: DashMap<SeriesKey, AtomicU64>,
}

impl LocalCounter {
    fn new(description: &'static str) -> Self {
        Self { description, map: DashMap::new() }
    }

    pub fn value(&self, labels: &LabelSet) -> Option<u64> {
        self.map
            .get(&labels.sorted_key())
            .map(|v| v.load(Ordering::Relaxed))
    }

    pub fn total(&self) -> u64 {
        self.map.iter().map(|r| r.value().load(Ordering::Relaxed)).sum()
    }

    /// Render in Prometheus text exposition format.
    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# HELP {} {}", name, self.description);
        let _ = writeln!(out, "# TYPE {} counter", name);
        let mut rows: Vec<(SeriesKey, u64)> = self
            .map
            .iter()
            .map(|r| (r.key().clone(), r.value().load(Ordering::Relaxed)))
            .collect();
        rows.sort();
        for (key, val) in rows {
            let _ = writeln!(out, "{}{{{}}} {}", name, label_str(&key), val);
        }
    }
}

impl CounterInstrument for LocalCounter {
    fn add(&self, value: u64, labels: &LabelSet) {
        let counter = self
            .map
            .entry(labels.sorted_key())
            .or_insert_with(|| AtomicU64::new(0));
        counter.fetch_add(value, Ordering::Relaxed);
    }
}

struct HistogramCell {
    count: AtomicU64,
    sum_bits: AtomicU64,
    buckets: Vec<AtomicU64>,
}

impl HistogramCell {
    fn new(buckets: usize) -> Self {
        Self {
            count: AtomicU64::new(0),
            sum_bits: AtomicU64::new(0f64.to_bits()),
            buckets: (0..buckets).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    fn sum(&self) -> f64 {
        f64::from_bits(self.sum_bits.load(Ordering::Relaxed))
    }
}

pub struct LocalHistogram {
    description: &'static str,
    boundaries: Arc<[f64]>,
    map: DashMap<SeriesKey, HistogramCell>,
}

impl LocalHistogram {
    fn new(description: &'static str, boundaries: Arc<[f64]>) -> Self {
        Self { description, boundaries, map: DashMap::new() }
    }

    pub fn count(&self, labels: &LabelSet) -> Option<u64> {
        self.map
            .get(&labels.sorted_key())
            .map(|c| c.count.load(Ordering::Relaxed))
    }

    pub fn sum(&self, labels: &LabelSet) -> Option<f64> {
        self.map.get(&labels.sorted_key()).map(|c| c.sum())
    }

    /// Cumulative count for each boundary, in boundary order.
    pub fn buckets(&self, labels: &LabelSet) -> Option<Vec<u64>> {
        self.map.get(&labels.sorted_key()).map(|c| {
            c.buckets
                .iter()
                .map(|b| b.load(Ordering::Relaxed))
                .collect()
        })
    }

    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# HELP {} {}", name, self.description);
        let _ = writeln!(out, "# TYPE {} histogram", name);
        let mut keys: Vec<SeriesKey> = self.map.iter().map(|r| r.key().clone()).collect();
        keys.sort();
        for key in keys {
            let Some(cell) = self.map.get(&key) else { continue };
            let labels = label_str(&key);
            let prefix = if labels.is_empty() { String::new() } else { format!("{},", labels) };

            for (i, le) in self.boundaries.iter().enumerate() {
                let count = cell.buckets[i].load(Ordering::Relaxed);
                let _ = writeln!(out, "{}_bucket{{{}le=\"{}\"}} {}", name, prefix, le, count);
            }
            let count = cell.count.load(Ordering::Relaxed);
            let _ = writeln!(out, "{}_bucket{{{}le=\"+Inf\"}} {}", name, prefix, count);
            let _ = writeln!(out, "{}_sum{{{}}} {}", name, labels, cell.sum());
            let _ = writeln!(out, "{}_count{{{}}} {}", name, labels, count);
        }
    }
}

impl HistogramInstrument for LocalHistogram {
    fn record(&self, value: f64, labels: &LabelSet) {
        let cell = self
            .map
            .entry(labels.sorted_key())
            .or_insert_with(|| HistogramCell::new(self.boundaries.len()));

        cell.count.fetch_add(1, Ordering::Relaxed);
        let _ = cell
            .sum_bits
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                Some((f64::from_bits(bits) + value).to_bits())
            });

        // Cumulative: every bucket whose upper bound covers the value.
        for (i, &le) in self.boundaries.iter().enumerate() {
            if value <= le {
                cell.buckets[i].fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

/// Registry handing out one instrument per name.
pub struct LocalRegistry {
    boundaries: Arc<[f64]>,
    /// Kind each name was first registered with.
    kinds: DashMap<&'static str, InstrumentKind>,
    counters: DashMap<&'static str, Arc<LocalCounter>>,
    histograms: DashMap<&'static str, Arc<LocalHistogram>>,
}

impl LocalRegistry {
    pub fn new(boundaries: &[f64]) -> Self {
        Self {
            boundaries: Arc::from(boundaries),
            kinds: DashMap::new(),
            counters: DashMap::new(),
            histograms: DashMap::new(),
        }
    }

    pub fn counter_handle(&self, name: &str) -> Option<Arc<LocalCounter>> {
        self.counters.get(name).map(|c| Arc::clone(c.value()))
    }

    pub fn histogram_handle(&self, name: &str) -> Option<Arc<LocalHistogram>> {
        self.histograms.get(name).map(|h| Arc::clone(h.value()))
    }

    /// Render every registered instrument, sorted by name.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let mut counters: Vec<_> = self
            .counters
            .iter()
            .map(|r| (*r.key(), Arc::clone(r.value())))
            .collect();
        counters.sort_by_key(|(name, _)| *name);
        for (name, counter) in counters {
            counter.render(name, &mut out);
        }

        let mut histograms: Vec<_> = self
            .histograms
            .iter()
            .map(|r| (*r.key(), Arc::clone(r.value())))
            .collect();
        histograms.sort_by_key(|(name, _)| *name);
        for (name, histogram) in histograms {
            histogram.render(name, &mut out);
        }
        out
    }

    fn check(&self, spec: &InstrumentSpec, kind: InstrumentKind) -> Result<()> {
        spec.validate()?;
        spec.expect_kind(kind)?;
        // The entry holds the shard lock, so two kinds cannot both claim a name.
        match self.kinds.entry(spec.name) {
            Entry::Occupied(e) if *e.get() != kind => Err(PulseError::instrument(
                spec.name,
                "name already registered with a different kind",
            )),
            Entry::Occupied(_) => Ok(()),
            Entry::Vacant(e) => {
                e.insert(kind);
                Ok(())
            }
        }
    }
}

impl MetricSink for LocalRegistry {
    fn counter(&self, spec: &InstrumentSpec) -> Result<Arc<dyn CounterInstrument>> {
        self.check(spec, InstrumentKind::Counter)?;
        let counter = self
            .counters
            .entry(spec.name)
            .or_insert_with(|| Arc::new(LocalCounter::new(spec.description)))
            .clone();
        Ok(counter)
    }

    fn histogram(&self, spec: &InstrumentSpec) -> Result<Arc<dyn HistogramInstrument>> {
        self.check(spec, InstrumentKind::Histogram)?;
        let boundaries = Arc::clone(&self.boundaries);
        let histogram = self
            .histograms
            .entry(spec.name)
            .or_insert_with(|| Arc::new(LocalHistogram::new(spec.description, boundaries)))
            .clone();
        Ok(histogram)
    }
}
