use std::collections::HashMap;

use meshmon_protocol::MetricValue;

/// One measurement as returned by a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub value: MetricValue,
    pub units: String,
}

impl Measurement {
    pub fn new(value: MetricValue, units: impl Into<String>) -> Self {
        Self {
            value,
            units: units.into(),
        }
    }
}

/// Supplies current values for named metrics on the local host.
///
/// Called only from the single control task; providers need no internal
/// synchronization. Returning `None` marks the metric unavailable for
/// this tick: skipped, not announced, not cached.
pub trait MetricSource {
    fn measure(&mut self, name: &str) -> Option<Measurement>;
}

/// Serves a fixed table of values. Used by smoke configs and tests.
#[derive(Debug, Default)]
pub struct FixedSource {
    values: HashMap<String, Measurement>,
}

impl FixedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &str, measurement: Measurement) {
        self.values.insert(name.to_string(), measurement);
    }

    pub fn clear(&mut self, name: &str) {
        self.values.remove(name);
    }
}

impl MetricSource for FixedSource {
    fn measure(&mut self, name: &str) -> Option<Measurement> {
        self.values.get(name).cloned()
    }
}

/// Measures a small set of built-in host metrics from /proc.
#[cfg(target_os = "linux")]
#[derive(Debug, Default)]
pub struct ProcSource;

#[cfg(target_os = "linux")]
impl MetricSource for ProcSource {
    fn measure(&mut self, name: &str) -> Option<Measurement> {
        match name {
            "load_one" => loadavg_field(0),
            "load_five" => loadavg_field(1),
            "load_fifteen" => loadavg_field(2),
            "mem_total" => meminfo_field("MemTotal:"),
            "mem_free" => meminfo_field("MemFree:"),
            "cpu_num" => {
                let n = std::thread::available_parallelism().ok()?.get() as u32;
                Some(Measurement::new(MetricValue::Uint(n), "CPUs"))
            }
            "uptime" => {
                let text = std::fs::read_to_string("/proc/uptime").ok()?;
                let secs: f32 = text.split_whitespace().next()?.parse().ok()?;
                Some(Measurement::new(MetricValue::Uint(secs as u32), "s"))
            }
            _ => None,
        }
    }
}

#[cfg(target_os = "linux")]
fn loadavg_field(idx: usize) -> Option<Measurement> {
    let text = std::fs::read_to_string("/proc/loadavg").ok()?;
    let value: f32 = text.split_whitespace().nth(idx)?.parse().ok()?;
    Some(Measurement::new(MetricValue::Float(value), ""))
}

#[cfg(target_os = "linux")]
fn meminfo_field(key: &str) -> Option<Measurement> {
    let text = std::fs::read_to_string("/proc/meminfo").ok()?;
    let line = text.lines().find(|line| line.starts_with(key))?;
    let value: u32 = line.split_whitespace().nth(1)?.parse().ok()?;
    Some(Measurement::new(MetricValue::Uint(value), "KB"))
}

/// The provider the binary runs with: /proc-backed on Linux, an empty
/// fixed table elsewhere.
pub fn default_source() -> Box<dyn MetricSource> {
    #[cfg(target_os = "linux")]
    {
        Box::new(ProcSource)
    }
    #[cfg(not(target_os = "linux"))]
    {
        Box::new(FixedSource::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_source_serves_what_was_set() {
        let mut source = FixedSource::new();
        source.set("cpu_user", Measurement::new(MetricValue::Float(12.5), "%"));

        let m = source.measure("cpu_user").unwrap();
        assert_eq!(m.value, MetricValue::Float(12.5));
        assert_eq!(m.units, "%");

        assert_eq!(source.measure("unknown"), None);

        source.clear("cpu_user");
        assert_eq!(source.measure("cpu_user"), None);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn proc_source_measures_builtins() {
        let mut source = ProcSource;

        match source.measure("load_one") {
            Some(Measurement {
                value: MetricValue::Float(v),
                ..
            }) => assert!(v >= 0.0),
            other => panic!("unexpected measurement: {other:?}"),
        }

        match source.measure("cpu_num") {
            Some(Measurement {
                value: MetricValue::Uint(n),
                ..
            }) => assert!(n >= 1),
            other => panic!("unexpected measurement: {other:?}"),
        }

        assert_eq!(source.measure("no_such_metric"), None);
    }
}
