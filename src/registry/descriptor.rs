use serde::Deserialize;

/// One catalog entry reduced to its first dimension.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetricDescriptor {
    pub namespace: String,
    pub metric_name: String,
    pub dimension_name: String,
    pub dimension_value: String,
}

impl MetricDescriptor {
    pub fn new(
        namespace: impl Into<String>,
        metric_name: impl Into<String>,
        dimension_name: impl Into<String>,
        dimension_value: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            metric_name: metric_name.into(),
            dimension_name: dimension_name.into(),
            dimension_value: dimension_value.into(),
        }
    }

    pub fn instrument_key(&self) -> InstrumentKey {
        InstrumentKey {
            namespace: self.namespace.to_owned(),
            metric_name: self.metric_name.to_owned(),
        }
    }
}

/// Identity of a registered gauge: `(namespace, metric_name)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstrumentKey {
    pub namespace: String,
    pub metric_name: String,
}

impl InstrumentKey {
    /// Exposed gauge name, e.g. `SYS.ECS` + `cpu_util` -> `SYS_ECS_cpu_util`.
    pub fn gauge_name(&self) -> String {
        sanitize_name(&format!("{}_{}", self.namespace.replace('.', "_"), self.metric_name))
    }
}

impl std::fmt::Display for InstrumentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.namespace, self.metric_name)
    }
}

/// Latest datapoint of a descriptor, as returned by the sample endpoint.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Sample {
    /// epoch milliseconds
    pub timestamp: i64,
    pub average: f64,
    pub unit: String,
}

/// Replace anything outside `[a-zA-Z0-9_]` so the result is a valid
/// Prometheus metric or label name.
pub fn sanitize_name(raw: &str) -> String {
    let mut name: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if name.chars().next().map_or(true, |c| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    name
}
