use std::collections::HashMap;
use std::sync::Arc;

use prometheus::{GaugeVec, Opts, Registry};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::registry::descriptor::{sanitize_name, InstrumentKey, MetricDescriptor};

pub const UNIT_LABEL: &str = "unit";

/// Gauge with label schema `[unit, <dimension>]`, the dimension label fixed
/// by the descriptor that created it.
#[derive(Debug, Clone)]
pub struct Instrument {
    name: String,
    dimension_label: String,
    gauge: GaugeVec,
}

impl Instrument {
    fn new(key: &InstrumentKey, dimension_name: &str) -> prometheus::Result<Self> {
        let name = key.gauge_name();
        let dimension_label = sanitize_name(dimension_name);
        if dimension_label == UNIT_LABEL {
            return Err(prometheus::Error::Msg(format!(
                "dimension of '{}' is named '{}', which collides with the unit label",
                name, UNIT_LABEL
            )));
        }
        let gauge = GaugeVec::new(
            Opts::new(name.as_str(), name.as_str()),
            &[UNIT_LABEL, dimension_label.as_str()],
        )?;
        Ok(Self { name, dimension_label, gauge })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dimension_label(&self) -> &str {
        &self.dimension_label
    }

    pub fn gauge(&self) -> &GaugeVec {
        &self.gauge
    }

    /// Last write wins; the dimension value lands under the label this
    /// instrument was created with.
    pub fn set(&self, unit: &str, dimension_value: &str, value: f64) {
        self.gauge.with_label_values(&[unit, dimension_value]).set(value);
    }
}

/// Append-only table `InstrumentKey -> Instrument`. Entries are never
/// replaced or removed, so a series that left the catalog keeps its last
/// value on the endpoint.
#[derive(Clone)]
pub struct InstrumentRegistry {
    inner: Arc<RwLock<HashMap<InstrumentKey, Instrument>>>,
    registry: Registry,
}

impl InstrumentRegistry {
    pub fn new(registry: Registry) -> Self {
        Self { inner: Arc::new(RwLock::new(HashMap::new())), registry }
    }

    /// Return the instrument for the descriptor's key, creating and
    /// registering it on first sight.
    pub async fn ensure_instrument(&self, descriptor: &MetricDescriptor) -> prometheus::Result<Instrument> {
        let key = descriptor.instrument_key();
        if let Some(instrument) = self.inner.read().await.get(&key) {
            note_dimension_mismatch(instrument, descriptor);
            return Ok(instrument.clone());
        }

        let mut map = self.inner.write().await;
        // another writer may have won between the two locks
        if let Some(instrument) = map.get(&key) {
            note_dimension_mismatch(instrument, descriptor);
            return Ok(instrument.clone());
        }

        let instrument = Instrument::new(&key, &descriptor.dimension_name)?;
        self.registry.register(Box::new(instrument.gauge.clone()))?;
        info!(
            "registered gauge '{}' for {} with labels [{}, {}]",
            instrument.name, key, UNIT_LABEL, instrument.dimension_label
        );
        map.insert(key, instrument.clone());
        Ok(instrument)
    }

    pub async fn get(&self, key: &InstrumentKey) -> Option<Instrument> {
        self.inner.read().await.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

fn note_dimension_mismatch(instrument: &Instrument, descriptor: &MetricDescriptor) {
    if instrument.dimension_label != sanitize_name(&descriptor.dimension_name) {
        debug!(
            "{}: dimension '{}' differs from registered label '{}', keeping the registered one",
            descriptor.instrument_key(),
            descriptor.dimension_name,
            instrument.dimension_label
        );
    }
}
