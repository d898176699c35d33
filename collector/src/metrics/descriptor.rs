use std::collections::BTreeMap;
use strum::Display;

#[derive(Debug, Clone, Copy, Display, PartialEq, Eq, Hash)]
#[strum(serialize_all = "lowercase")]
pub enum MetricType {
    Gauge,
    Counter,
}

/// Shape of one exported series family, known before any scrape runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub fq_name: String,
    pub help: String,
    pub metric_type: MetricType,
    /// Labels whose values are supplied per sample, in order.
    pub label_names: Vec<String>,
    /// Labels with the same value on every sample.
    pub const_labels: BTreeMap<String, String>,
}

impl Descriptor {
    pub fn new(fq_name: impl Into<String>, help: impl Into<String>, metric_type: MetricType, label_names: &[&str]) -> Self {
        Self {
            fq_name: fq_name.into(),
            help: help.into(),
            metric_type,
            label_names: label_names.iter().map(|name| name.to_string()).collect(),
            const_labels: BTreeMap::new(),
        }
    }

    pub fn gauge(fq_name: impl Into<String>, help: impl Into<String>) -> Self {
        Self::new(fq_name, help, MetricType::Gauge, &[])
    }

    pub fn counter(fq_name: impl Into<String>, help: impl Into<String>) -> Self {
        Self::new(fq_name, help, MetricType::Counter, &[])
    }

    pub fn with_const_labels(mut self, labels: &BTreeMap<String, String>) -> Self {
        self.const_labels = labels.clone();
        self
    }
}

/// Joins the non-empty parts with `_` and replaces every character that is
/// not valid in a metric name.
pub fn build_fq_name(parts: &[&str]) -> String {
    let joined = parts
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("_");
    sanitize_name(&joined)
}

pub fn sanitize_name(name: &str) -> String {
    let mut sanitized = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == ':' { c } else { '_' })
        .collect::<String>();
    if sanitized.starts_with(|c: char| c.is_ascii_digit()) {
        sanitized.insert(0, '_');
    }
    sanitized
}
