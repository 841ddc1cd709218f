use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::net::SocketAddr;

use meshmon_protocol::{MetricMessage, MetricValue};
use serde::Serialize;

use crate::resolve::Resolver;

/// Most recent observation of one metric from one host.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRecord {
    /// The announced spelling; lookup is case-insensitive.
    pub name: String,
    pub value: MetricValue,
    pub units: String,
    pub seen_at: u64,
}

/// Per-remote-node record. Owns its metrics map outright, so eviction
/// drops the whole host as one unit.
#[derive(Debug, Clone)]
pub struct HostRecord {
    pub hostname: String,
    /// Epoch seconds the remote agent reported as its start time; zero
    /// until a current-layout message arrives.
    pub agent_started: u32,
    pub first_heard: u64,
    pub last_heard: u64,
    metrics: HashMap<String, MetricRecord>,
}

impl HostRecord {
    /// Insert or unconditionally replace a metric: last writer wins.
    pub fn update_metric(&mut self, msg: &MetricMessage, now: u64) {
        if msg.agent_started != 0 {
            self.agent_started = msg.agent_started;
        }

        self.metrics.insert(
            msg.name.to_ascii_lowercase(),
            MetricRecord {
                name: msg.name.clone(),
                value: msg.value.clone(),
                units: msg.units.clone(),
                seen_at: now,
            },
        );
    }

    pub fn metric(&self, name: &str) -> Option<&MetricRecord> {
        self.metrics.get(&name.to_ascii_lowercase())
    }

    pub fn num_metrics(&self) -> usize {
        self.metrics.len()
    }
}

/// Maps the source-IP text literal, as observed on the wire, to its
/// host aggregate. Mutated only by the receive engine.
pub struct HostTable {
    hosts: HashMap<String, HostRecord>,
    resolver: Resolver,
}

impl HostTable {
    pub fn new(resolver: Resolver) -> Self {
        Self {
            hosts: HashMap::new(),
            resolver,
        }
    }

    /// Look up a host, refreshing its liveness, or admit a new one.
    /// Name resolution failure falls back to the IP literal, so a host
    /// never carries an empty hostname.
    pub fn get_or_create(
        &mut self,
        ip_literal: &str,
        addr: &SocketAddr,
        now: u64,
    ) -> &mut HostRecord {
        let host = match self.hosts.entry(ip_literal.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let hostname = self
                    .resolver
                    .reverse_lookup(addr)
                    .unwrap_or_else(|| ip_literal.to_string());

                entry.insert(HostRecord {
                    hostname,
                    agent_started: 0,
                    first_heard: now,
                    last_heard: now,
                    metrics: HashMap::new(),
                })
            }
        };

        host.last_heard = now;
        host
    }

    pub fn get(&self, ip_literal: &str) -> Option<&HostRecord> {
        self.hosts.get(ip_literal)
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Drop every host not heard from within `threshold` seconds.
    /// Returns the number of hosts removed.
    pub fn evict_stale(&mut self, now: u64, threshold: u64) -> usize {
        let before = self.hosts.len();
        self.hosts
            .retain(|_, host| now.saturating_sub(host.last_heard) <= threshold);
        before - self.hosts.len()
    }

    /// Owned, consistent view for the external report endpoint. A host
    /// is either wholly present or wholly absent; a reader can never
    /// observe one mid-update.
    pub fn snapshot(&self) -> ClusterSnapshot {
        let mut hosts: Vec<HostSnapshot> = self
            .hosts
            .iter()
            .map(|(ip, host)| {
                let mut metrics: Vec<MetricSnapshot> = host
                    .metrics
                    .values()
                    .map(|m| MetricSnapshot {
                        name: m.name.clone(),
                        value: m.value.to_string(),
                        units: m.units.clone(),
                        seen_at: m.seen_at,
                    })
                    .collect();
                metrics.sort_by(|a, b| a.name.cmp(&b.name));

                HostSnapshot {
                    ip: ip.clone(),
                    hostname: host.hostname.clone(),
                    agent_started: host.agent_started,
                    first_heard: host.first_heard,
                    last_heard: host.last_heard,
                    metrics,
                }
            })
            .collect();
        hosts.sort_by(|a, b| a.ip.cmp(&b.ip));

        ClusterSnapshot { hosts }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClusterSnapshot {
    pub hosts: Vec<HostSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HostSnapshot {
    pub ip: String,
    pub hostname: String,
    pub agent_started: u32,
    pub first_heard: u64,
    pub last_heard: u64,
    pub metrics: Vec<MetricSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricSnapshot {
    pub name: String,
    pub value: String,
    pub units: String,
    pub seen_at: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(ip: &str) -> SocketAddr {
        format!("{ip}:8649").parse().unwrap()
    }

    fn msg(name: &str, value: MetricValue) -> MetricMessage {
        MetricMessage::new("peer", name, value, "", 1_700_000_000, 60, 0)
    }

    #[test]
    fn admission_and_liveness_refresh() {
        let mut table = HostTable::new(Resolver::Literal);

        let host = table.get_or_create("10.0.0.1", &addr("10.0.0.1"), 100);
        assert_eq!(host.hostname, "10.0.0.1", "resolution fell back to the literal");
        assert_eq!(host.first_heard, 100);
        assert_eq!(host.last_heard, 100);

        let host = table.get_or_create("10.0.0.1", &addr("10.0.0.1"), 140);
        assert_eq!(host.first_heard, 100, "first_heard is set once");
        assert_eq!(host.last_heard, 140);
        assert!(host.first_heard <= host.last_heard);

        assert_eq!(table.len(), 1);
    }

    #[test]
    fn metric_names_are_case_insensitive() {
        let mut table = HostTable::new(Resolver::Literal);
        let host = table.get_or_create("10.0.0.1", &addr("10.0.0.1"), 1);

        host.update_metric(&msg("CPU_User", MetricValue::Float(1.0)), 1);
        host.update_metric(&msg("cpu_user", MetricValue::Float(2.0)), 2);

        assert_eq!(host.num_metrics(), 1, "one key for both spellings");
        let record = host.metric("Cpu_User").unwrap();
        assert_eq!(record.value, MetricValue::Float(2.0), "last writer won");
        assert_eq!(record.name, "cpu_user", "latest spelling is kept");
        assert_eq!(record.seen_at, 2);
    }

    #[test]
    fn remote_start_time_is_recorded() {
        let mut table = HostTable::new(Resolver::Literal);
        let host = table.get_or_create("10.0.0.1", &addr("10.0.0.1"), 1);
        assert_eq!(host.agent_started, 0);

        host.update_metric(&msg("load_one", MetricValue::Float(0.5)), 1);
        assert_eq!(host.agent_started, 1_700_000_000);

        // A legacy message without a start time does not erase it
        let mut legacy = msg("load_one", MetricValue::Float(0.6));
        legacy.agent_started = 0;
        host.update_metric(&legacy, 2);
        assert_eq!(host.agent_started, 1_700_000_000);
    }

    #[test]
    fn stale_hosts_are_evicted_whole() {
        let mut table = HostTable::new(Resolver::Literal);

        table
            .get_or_create("10.0.0.1", &addr("10.0.0.1"), 100)
            .update_metric(&msg("a", MetricValue::Uint(1)), 100);
        table
            .get_or_create("10.0.0.2", &addr("10.0.0.2"), 500)
            .update_metric(&msg("b", MetricValue::Uint(2)), 500);

        let evicted = table.evict_stale(700, 300);
        assert_eq!(evicted, 1);
        assert!(table.get("10.0.0.1").is_none(), "silent host dropped with its metrics");
        assert!(table.get("10.0.0.2").is_some());
    }

    #[test]
    fn eviction_boundary_is_inclusive() {
        let mut table = HostTable::new(Resolver::Literal);
        table.get_or_create("10.0.0.1", &addr("10.0.0.1"), 400);

        // Exactly at the threshold the host survives
        assert_eq!(table.evict_stale(700, 300), 0);
        assert_eq!(table.evict_stale(701, 300), 1);
    }

    #[test]
    fn snapshot_is_an_owned_copy() {
        let mut table = HostTable::new(Resolver::Literal);
        table
            .get_or_create("10.0.0.2", &addr("10.0.0.2"), 10)
            .update_metric(&msg("cpu_user", MetricValue::Float(12.5)), 10);
        table.get_or_create("10.0.0.1", &addr("10.0.0.1"), 20);

        let snapshot = table.snapshot();
        assert_eq!(snapshot.hosts.len(), 2);
        assert_eq!(snapshot.hosts[0].ip, "10.0.0.1", "hosts sorted by ip");
        assert_eq!(snapshot.hosts[1].metrics[0].value, "12.5");

        // Mutating the table afterwards cannot reach into the snapshot
        table.evict_stale(1000, 1);
        assert_eq!(snapshot.hosts.len(), 2);

        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"cpu_user\""));
    }
}
