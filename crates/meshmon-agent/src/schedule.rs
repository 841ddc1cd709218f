use std::collections::HashMap;

use meshmon_protocol::Error as ProtocolError;
use meshmon_protocol::{MetricMessage, MetricValue, Protocol};
use tracing::warn;

use crate::config::GroupConfig;
use crate::metrics::SendMetrics;
use crate::source::MetricSource;

/// Deadline handed out when there is nothing to schedule: muted agents
/// and empty group lists re-check once an hour.
pub const IDLE_DEADLINE_SECS: u64 = 3600;

/// Relative change is measured against at least this much, so a metric
/// sitting at zero still announces on any movement.
const VALUE_EPSILON: f64 = 1e-6;

struct LastSent {
    value: MetricValue,
    at: u64,
}

struct GroupState {
    config: GroupConfig,
    next_collect_at: u64,
    last_sent: HashMap<String, LastSent>,
}

/// Runs every collection group on its own cadence: measure through the
/// provider, suppress values that have not moved, encode and emit the
/// rest.
pub struct SendScheduler {
    mute: bool,
    local_host: String,
    agent_started: u32,
    groups: Vec<GroupState>,
    metrics: SendMetrics,
}

impl SendScheduler {
    /// Every group starts due, so the first tick announces everything.
    pub fn new(
        groups: Vec<GroupConfig>,
        mute: bool,
        local_host: String,
        agent_started: u32,
        now: u64,
    ) -> Self {
        let groups = groups
            .into_iter()
            .map(|config| GroupState {
                config,
                next_collect_at: now,
                last_sent: HashMap::new(),
            })
            .collect();

        Self {
            mute,
            local_host,
            agent_started,
            groups,
            metrics: SendMetrics::default(),
        }
    }

    /// Earliest instant any group wants to run.
    pub fn next_deadline(&self, now: u64) -> u64 {
        if self.mute {
            return now + IDLE_DEADLINE_SECS;
        }

        self.groups
            .iter()
            .map(|group| group.next_collect_at)
            .min()
            .unwrap_or(now + IDLE_DEADLINE_SECS)
    }

    /// Fire every group whose deadline has passed, handing each encoded
    /// announcement to `emit`. The callback returns how many send
    /// channels failed for that datagram.
    pub fn tick<F>(&mut self, now: u64, source: &mut dyn MetricSource, mut emit: F)
    where
        F: FnMut(&[u8]) -> usize,
    {
        if self.mute {
            return;
        }

        for group in &mut self.groups {
            if group.next_collect_at > now {
                continue;
            }

            for metric in &group.config.metric {
                let Some(measured) = source.measure(&metric.name) else {
                    self.metrics.num_unavailable += 1;
                    continue;
                };

                let last = group.last_sent.get(&metric.name);
                if !should_announce(
                    last,
                    &measured.value,
                    now,
                    group.config.time_threshold,
                    metric.value_threshold,
                ) {
                    self.metrics.num_suppressed += 1;
                    continue;
                }

                let msg = MetricMessage::new(
                    self.local_host.clone(),
                    metric.name.clone(),
                    measured.value.clone(),
                    measured.units,
                    self.agent_started,
                    group.config.time_threshold as u32,
                    0,
                );

                match msg.encode(Protocol::Xdr) {
                    Ok(bytes) => {
                        self.metrics.num_failed_sends += emit(&bytes);
                        self.metrics.num_announced += 1;
                        group.last_sent.insert(
                            metric.name.clone(),
                            LastSent {
                                value: measured.value,
                                at: now,
                            },
                        );
                    }
                    Err(e @ ProtocolError::MessageTooLarge(_)) => {
                        warn!(metric = %metric.name, "skipping metric: {e}");
                        self.metrics.num_oversize += 1;
                    }
                    Err(e) => {
                        warn!(metric = %metric.name, "cannot encode metric: {e}");
                    }
                }
            }

            // A stalled loop catches up in whole intervals; the next
            // deadline is never left in the past.
            group.next_collect_at += group.config.collect_every;
            while group.next_collect_at <= now {
                group.next_collect_at += group.config.collect_every;
            }
        }
    }

    pub fn metrics(&self) -> SendMetrics {
        self.metrics
    }
}

/// Announce when the metric was never sent, its time threshold lapsed,
/// a numeric value moved more than `value_threshold` percent, or a
/// non-numeric value changed at all.
fn should_announce(
    last: Option<&LastSent>,
    current: &MetricValue,
    now: u64,
    time_threshold: u64,
    value_threshold: f64,
) -> bool {
    let Some(last) = last else {
        return true;
    };

    if now.saturating_sub(last.at) >= time_threshold {
        return true;
    }

    match (last.value.as_f64(), current.as_f64()) {
        (Some(prev), Some(cur)) => {
            let change = (cur - prev).abs() / prev.abs().max(VALUE_EPSILON) * 100.0;
            change >= value_threshold
        }
        // A value that changes kind always announces.
        _ => last.value != *current,
    }
}
