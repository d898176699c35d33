use super::Descriptor;
use std::sync::Arc;

/// One value of a series, immutable once produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub descriptor: Arc<Descriptor>,
    /// Values for `descriptor.label_names`, in the same order.
    pub label_values: Vec<String>,
    pub value: f64,
    /// Milliseconds since the epoch.
    pub timestamp_ms: Option<i64>,
}

impl Sample {
    pub fn new(descriptor: Arc<Descriptor>, label_values: Vec<String>, value: f64) -> Self {
        debug_assert_eq!(
            descriptor.label_names.len(),
            label_values.len(),
            "label values of {}",
            descriptor.fq_name
        );
        Self {
            descriptor,
            label_values,
            value,
            timestamp_ms: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp_ms: i64) -> Self {
        self.timestamp_ms = Some(timestamp_ms);
        self
    }

    pub fn name(&self) -> &str {
        &self.descriptor.fq_name
    }

    /// Constant labels first, then the per-sample labels.
    pub fn labels(&self) -> impl Iterator<Item = (&str, &str)> {
        self.descriptor
            .const_labels
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
            .chain(
                self.descriptor
                    .label_names
                    .iter()
                    .zip(&self.label_values)
                    .map(|(name, value)| (name.as_str(), value.as_str())),
            )
    }

    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels().find(|(label, _)| *label == name).map(|(_, value)| value)
    }
}
