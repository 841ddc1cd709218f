use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering::Relaxed;
use std::time::Duration;

use tracing::info;

use crate::channel::ChannelLayer;
use crate::clock::Clock;
use crate::config::AgentConfig;
use crate::error::Error;
use crate::hosts::HostTable;
use crate::receive::ReceiveEngine;
use crate::resolve::Resolver;
use crate::schedule::SendScheduler;
use crate::source::MetricSource;

/// How often the stale-host sweep runs when eviction is enabled.
const EVICT_CHECK_SECS: u64 = 60;

/// Everything the control loop owns: sockets, host table, scheduler,
/// and the measurement provider. There is no other mutable state in
/// the process.
pub struct Agent {
    clock: Clock,
    deaf: bool,
    mute: bool,
    host_stale_secs: u64,
    status_interval: u64,
    channels: ChannelLayer,
    hosts: HostTable,
    receiver: ReceiveEngine,
    scheduler: SendScheduler,
    source: Box<dyn MetricSource>,
}

impl Agent {
    pub fn new(
        config: &AgentConfig,
        clock: Clock,
        source: Box<dyn MetricSource>,
        resolver: Resolver,
        local_host: String,
        status_interval: u64,
    ) -> Result<Self, Error> {
        config.validate()?;

        let recv_cfgs: &[_] = if config.deaf {
            &[]
        } else {
            &config.udp_recv_channel
        };
        let send_cfgs: &[_] = if config.mute {
            &[]
        } else {
            &config.udp_send_channel
        };
        let channels = ChannelLayer::new(recv_cfgs, send_cfgs)?;

        let now = clock.now_secs();
        let scheduler = SendScheduler::new(
            config.collection_group.clone(),
            config.mute,
            local_host,
            now as u32,
            now,
        );

        Ok(Self {
            clock,
            deaf: config.deaf,
            mute: config.mute,
            host_stale_secs: config.host_stale_secs,
            status_interval,
            channels,
            hosts: HostTable::new(resolver),
            receiver: ReceiveEngine::new(),
            scheduler,
            source,
        })
    }

    /// The control loop: receive until the next scheduler deadline,
    /// tick, repeat. Runs until `keep_running` goes false; the flag is
    /// checked at the top of every iteration, so the loop never sleeps
    /// more than a second at a time.
    pub fn run(&mut self, keep_running: &AtomicBool) {
        let mut now = self.clock.now_secs();
        let mut next_evict = now + EVICT_CHECK_SECS;
        let mut next_status = now + self.status_interval;

        info!(
            recv_channels = self.channels.num_recv_channels(),
            send_channels = self.channels.num_send_channels(),
            deaf = self.deaf,
            mute = self.mute,
            "agent up"
        );

        while keep_running.load(Relaxed) {
            now = self.clock.now_secs();

            let wait = self.scheduler.next_deadline(now).saturating_sub(now).min(1);
            if self.deaf {
                std::thread::sleep(Duration::from_secs(wait));
            } else {
                let Self {
                    receiver,
                    channels,
                    hosts,
                    ..
                } = self;
                receiver.pump(channels, hosts, now, Duration::from_secs(wait));
            }

            now = self.clock.now_secs();
            if !self.mute {
                let Self {
                    scheduler,
                    channels,
                    source,
                    ..
                } = self;
                scheduler.tick(now, source.as_mut(), |bytes| channels.send_all(bytes));
            }

            if self.host_stale_secs > 0 && now >= next_evict {
                let evicted = self.hosts.evict_stale(now, self.host_stale_secs);
                if evicted > 0 {
                    info!(evicted, "dropped stale hosts");
                }
                next_evict = now + EVICT_CHECK_SECS;
            }

            if now >= next_status {
                self.log_status();
                next_status = now + self.status_interval;
            }
        }

        info!("agent finished");
    }

    fn log_status(&self) {
        let snapshot = self.hosts.snapshot();
        let num_metrics: usize = snapshot.hosts.iter().map(|h| h.metrics.len()).sum();

        info!(
            hosts = snapshot.hosts.len(),
            metrics = num_metrics,
            recv = ?self.receiver.metrics(),
            send = ?self.scheduler.metrics(),
            "status"
        );
    }
}
