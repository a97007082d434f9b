//! Prometheus text exposition of the latest snapshot.

use hearth_common::types::{MetricSample, MetricsSnapshot};
use std::collections::BTreeMap;
use std::fmt::Write;

pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

const PREFIX: &str = "hearth_";

/// Maps a dotted metric name onto `[a-zA-Z0-9_:]`.
///
/// ```
/// use hearth_server::prometheus::metric_name;
///
/// assert_eq!(metric_name("http.latency_p95"), "hearth_http_latency_p95");
/// assert_eq!(metric_name("disk-io/read"), "hearth_disk_io_read");
/// ```
pub fn metric_name(name: &str) -> String {
    let mut out = String::with_capacity(PREFIX.len() + name.len());
    out.push_str(PREFIX);
    out.extend(name.chars().map(|c| {
        if c.is_ascii_alphanumeric() || c == '_' || c == ':' {
            c
        } else {
            '_'
        }
    }));
    out
}

fn label_name(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

fn escape_label_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out
}

fn format_value(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v.is_infinite() {
        (if v > 0.0 { "+Inf" } else { "-Inf" }).to_string()
    } else {
        v.to_string()
    }
}

fn write_sample(out: &mut String, family: &str, sample: &MetricSample) {
    out.push_str(family);
    if !sample.labels.is_empty() {
        let mut labels: Vec<(String, String)> = sample
            .labels
            .iter()
            .map(|(k, v)| (label_name(k), escape_label_value(v)))
            .collect();
        labels.sort();
        out.push('{');
        for (i, (k, v)) in labels.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            let _ = write!(out, "{k}=\"{v}\"");
        }
        out.push('}');
    }
    let _ = writeln!(out, " {}", format_value(sample.value));
}

/// Renders every series as a gauge, families sorted by name.
pub fn render(snapshot: &MetricsSnapshot) -> String {
    let mut families: BTreeMap<String, (&str, Vec<&MetricSample>)> = BTreeMap::new();
    for sample in &snapshot.samples {
        families
            .entry(metric_name(&sample.name))
            .or_insert_with(|| (sample.name.as_str(), Vec::new()))
            .1
            .push(sample);
    }

    let mut out = String::new();
    for (family, (source, samples)) in &families {
        let _ = writeln!(out, "# HELP {family} {source}");
        let _ = writeln!(out, "# TYPE {family} gauge");
        for sample in samples {
            write_sample(&mut out, family, sample);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn families_get_help_and_type_once() {
        let now = Utc::now();
        let snap = MetricsSnapshot::new(
            now,
            vec![
                MetricSample::labelled("disk.used_percent", 40.0, "mount", "/", now),
                MetricSample::labelled("disk.used_percent", 91.5, "mount", "/data", now),
                MetricSample::new("cpu.usage", 42.0, now),
            ],
        );
        let text = render(&snap);
        let expected = "\
# HELP hearth_cpu_usage cpu.usage
# TYPE hearth_cpu_usage gauge
hearth_cpu_usage 42
# HELP hearth_disk_used_percent disk.used_percent
# TYPE hearth_disk_used_percent gauge
hearth_disk_used_percent{mount=\"/data\"} 91.5
hearth_disk_used_percent{mount=\"/\"} 40
";
        assert_eq!(text, expected);
    }

    #[test]
    fn label_values_are_escaped() {
        let now = Utc::now();
        let snap = MetricsSnapshot::new(
            now,
            vec![MetricSample::labelled("business.event", 1.0, "event", "say \"hi\"\\\n", now)],
        );
        let text = render(&snap);
        assert!(text.contains(r#"hearth_business_event{event="say \"hi\"\\\n"} 1"#));
    }

    #[test]
    fn non_finite_values_use_exposition_spelling() {
        assert_eq!(format_value(f64::NAN), "NaN");
        assert_eq!(format_value(f64::INFINITY), "+Inf");
        assert_eq!(format_value(f64::NEG_INFINITY), "-Inf");
        assert_eq!(format_value(0.25), "0.25");
    }

    #[test]
    fn empty_snapshot_renders_nothing() {
        assert!(render(&MetricsSnapshot::default()).is_empty());
    }
}
