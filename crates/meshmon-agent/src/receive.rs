use std::io;
use std::time::Duration;

use meshmon_protocol::{MAX_DATAGRAM_LEN, MetricMessage};
use tracing::warn;

use crate::channel::ChannelLayer;
use crate::hosts::HostTable;
use crate::metrics::RecvMetrics;

/// Most datagrams drained from one channel in a row, so a busy channel
/// cannot starve the rest of the pollset.
const RECV_BATCH_SIZE: usize = 64;

#[derive(Debug, Eq, PartialEq)]
enum DrainResult {
    /// Channel was drained, no more data
    Empty,
    /// There may be more data left
    MoreData,
}

/// Pulls datagrams off ready channels and routes them into the host
/// table. Every per-datagram failure is counted and dropped; only a
/// handle-level failure has a lasting effect, and that is limited to
/// the handle itself.
#[derive(Debug, Default)]
pub struct ReceiveEngine {
    metrics: RecvMetrics,
}

impl ReceiveEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// One receive pass: wait up to `timeout` for traffic, then drain
    /// every ready channel completely, round-robin in batches. The
    /// pollset wakes are edge-style, so a ready channel must be read to
    /// `WouldBlock` before the next wait. Within one channel datagrams
    /// are processed in arrival order.
    pub fn pump(
        &mut self,
        channels: &mut ChannelLayer,
        hosts: &mut HostTable,
        now: u64,
        timeout: Duration,
    ) {
        let mut ready = channels.poll(Some(timeout));

        while !ready.is_empty() {
            ready.retain(|&idx| {
                self.drain_channel(channels, hosts, idx, now) == DrainResult::MoreData
            });
        }
    }

    fn drain_channel(
        &mut self,
        channels: &mut ChannelLayer,
        hosts: &mut HostTable,
        idx: usize,
        now: u64,
    ) -> DrainResult {
        let mut buf = [0u8; MAX_DATAGRAM_LEN];

        for _ in 0..RECV_BATCH_SIZE {
            let Some(channel) = channels.recv_channel(idx) else {
                return DrainResult::Empty;
            };
            let protocol = channel.protocol;
            let allow = channel.allow;

            let (nbytes, src_addr) = match channel.socket.recv_from(&mut buf) {
                Ok(received) => received,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return DrainResult::Empty,
                Err(e) if is_transient(&e) => {
                    self.metrics.num_transient_recv_errors += 1;
                    continue;
                }
                Err(e) => {
                    // This handle is gone; the rest keep running.
                    warn!(channel = idx, "receive failed, removing handle from pollset: {e}");
                    self.metrics.num_dead_handles += 1;
                    channels.disable_recv(idx);
                    return DrainResult::Empty;
                }
            };

            if let Some(allow) = allow {
                if !allow.contains(src_addr.ip()) {
                    self.metrics.num_acl_rejects += 1;
                    continue;
                }
            }

            let msg = match MetricMessage::decode(&mut buf[..nbytes], protocol) {
                Ok(msg) => msg,
                Err(_) => {
                    self.metrics.num_decode_errors += 1;
                    continue;
                }
            };

            let ip_literal = src_addr.ip().to_string();
            let host = hosts.get_or_create(&ip_literal, &src_addr, now);
            host.update_metric(&msg, now);

            self.metrics.num_ok_msgs += 1;
            self.metrics.num_bytes += nbytes;
        }

        DrainResult::MoreData
    }

    pub fn metrics(&self) -> RecvMetrics {
        self.metrics
    }
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::Interrupted
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
    )
}
