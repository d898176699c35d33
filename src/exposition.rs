//! Prometheus text exposition (version 0.0.4) of a scrape's samples.

use alicloud_collector::{
    Descriptor,
    Sample,
};
use std::{
    collections::HashMap,
    fmt::Write,
};

pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Renders samples grouped by family, families in order of first appearance.
pub fn render(samples: &[Sample]) -> String {
    let mut families: Vec<(&Descriptor, Vec<&Sample>)> = Vec::new();
    let mut index = HashMap::new();
    for sample in samples {
        let position = *index.entry(sample.name()).or_insert_with(|| {
            families.push((sample.descriptor.as_ref(), Vec::new()));
            families.len() - 1
        });
        families[position].1.push(sample);
    }

    let mut output = String::new();
    for (descriptor, samples) in families {
        write_family(&mut output, descriptor, &samples);
    }
    output
}

fn write_family(output: &mut String, descriptor: &Descriptor, samples: &[&Sample]) {
    let name = &descriptor.fq_name;
    let _ = writeln!(output, "# HELP {name} {}", escape_help(&descriptor.help));
    let _ = writeln!(output, "# TYPE {name} {}", descriptor.metric_type);
    for sample in samples {
        output.push_str(name);
        let labels = sample
            .labels()
            .map(|(label, value)| format!("{label}=\"{}\"", escape_label_value(value)))
            .collect::<Vec<_>>();
        if !labels.is_empty() {
            let _ = write!(output, "{{{}}}", labels.join(","));
        }
        let _ = write!(output, " {}", format_value(sample.value));
        if let Some(timestamp) = sample.timestamp_ms {
            let _ = write!(output, " {timestamp}");
        }
        output.push('\n');
    }
}

fn escape_help(help: &str) -> String {
    help.replace('\\', r"\\").replace('\n', r"\n")
}

fn escape_label_value(value: &str) -> String {
    value.replace('\\', r"\\").replace('"', "\\\"").replace('\n', r"\n")
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "+Inf" } else { "-Inf" }.to_string()
    } else {
        value.to_string()
    }
}
