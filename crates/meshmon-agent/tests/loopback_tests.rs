//! End-to-end exchange over real loopback sockets: one scheduler tick
//! on the sending side, one receive pass on the listening side, and the
//! measurement shows up in the host table.

use std::time::Duration;

use meshmon_agent::channel::ChannelLayer;
use meshmon_agent::clock::Clock;
use meshmon_agent::config::{GroupConfig, MetricConfig, RecvChannelConfig, SendChannelConfig};
use meshmon_agent::hosts::HostTable;
use meshmon_agent::receive::ReceiveEngine;
use meshmon_agent::resolve::Resolver;
use meshmon_agent::schedule::SendScheduler;
use meshmon_agent::source::{FixedSource, Measurement};
use meshmon_protocol::MetricValue;

fn loopback_pair() -> (ChannelLayer, ChannelLayer) {
    let recv_cfg = RecvChannelConfig {
        port: 0,
        bind: Some("127.0.0.1".to_string()),
        mcast_join: None,
        mcast_if: None,
        allow_ip: None,
        allow_mask: None,
        protocol: "xdr".to_string(),
    };
    let mut rx = ChannelLayer::new(&[recv_cfg], &[]).expect("bind receive channel");

    let port = rx
        .recv_channel(0)
        .expect("receive channel exists")
        .socket
        .local_addr()
        .expect("bound socket has an address")
        .port();

    let send_cfg = SendChannelConfig {
        ip: "127.0.0.1".to_string(),
        port,
        mcast_join: None,
        mcast_if: None,
        protocol: "xdr".to_string(),
    };
    let tx = ChannelLayer::new(&[], &[send_cfg]).expect("open send channel");

    (rx, tx)
}

#[test]
fn single_metric_round_trip() {
    let (mut rx, mut tx) = loopback_pair();

    let clock = Clock::mock(1_000);
    let mut source = FixedSource::new();
    source.set("cpu_user", Measurement::new(MetricValue::Float(12.5), "%"));

    let group = GroupConfig {
        name: "cpu".to_string(),
        collect_every: 5,
        time_threshold: 60,
        metric: vec![MetricConfig {
            name: "cpu_user".to_string(),
            value_threshold: 1.0,
        }],
    };
    let mut scheduler =
        SendScheduler::new(vec![group], false, "sender-node".to_string(), 999, clock.now_secs());

    let mut engine = ReceiveEngine::new();
    let mut hosts = HostTable::new(Resolver::Literal);

    scheduler.tick(clock.now_secs(), &mut source, |bytes| tx.send_all(bytes));
    assert_eq!(scheduler.metrics().num_announced, 1);
    assert_eq!(scheduler.metrics().num_failed_sends, 0);

    for _ in 0..5 {
        engine.pump(&mut rx, &mut hosts, clock.now_secs(), Duration::from_millis(500));
        if !hosts.is_empty() {
            break;
        }
    }

    let host = hosts.get("127.0.0.1").expect("sender admitted to the host table");
    assert_eq!(host.hostname, "127.0.0.1");
    assert_eq!(host.agent_started, 999, "remote start time recorded");
    assert_eq!(host.first_heard, 1_000);
    assert_eq!(host.last_heard, 1_000);
    assert_eq!(host.num_metrics(), 1);

    let metric = host.metric("cpu_user").expect("metric present");
    assert_eq!(metric.value, MetricValue::Float(12.5));
    assert_eq!(metric.units, "%");
    assert_eq!(metric.seen_at, 1_000);
}

#[test]
fn suppressed_tick_sends_nothing() {
    let (mut rx, mut tx) = loopback_pair();

    let clock = Clock::mock(2_000);
    let mut source = FixedSource::new();
    source.set("cpu_user", Measurement::new(MetricValue::Float(50.0), "%"));

    let group = GroupConfig {
        name: "cpu".to_string(),
        collect_every: 5,
        time_threshold: 600,
        metric: vec![MetricConfig {
            name: "cpu_user".to_string(),
            value_threshold: 25.0,
        }],
    };
    let mut scheduler =
        SendScheduler::new(vec![group], false, "sender-node".to_string(), 1, clock.now_secs());

    let mut engine = ReceiveEngine::new();
    let mut hosts = HostTable::new(Resolver::Literal);

    // First tick announces, second tick sees an unchanged value
    scheduler.tick(clock.now_secs(), &mut source, |bytes| tx.send_all(bytes));
    clock.advance(5);
    scheduler.tick(clock.now_secs(), &mut source, |bytes| tx.send_all(bytes));

    assert_eq!(scheduler.metrics().num_announced, 1);
    assert_eq!(scheduler.metrics().num_suppressed, 1);

    for _ in 0..5 {
        engine.pump(&mut rx, &mut hosts, clock.now_secs(), Duration::from_millis(500));
        if engine.metrics().num_ok_msgs >= 1 {
            break;
        }
    }

    // Exactly one datagram crossed the wire
    engine.pump(&mut rx, &mut hosts, clock.now_secs(), Duration::from_millis(200));
    assert_eq!(engine.metrics().num_ok_msgs, 1);
}
