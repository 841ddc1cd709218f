//! Operation counters. Per-datagram failures are silent drops; these
//! counters are their only trace, surfaced through the periodic status
//! log.

use std::ops::AddAssign;

use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize)]
pub struct RecvMetrics {
    pub num_ok_msgs: usize,
    pub num_acl_rejects: usize,
    pub num_decode_errors: usize,
    pub num_transient_recv_errors: usize,
    pub num_dead_handles: usize,
    pub num_bytes: usize,
}

impl AddAssign for RecvMetrics {
    fn add_assign(&mut self, rhs: Self) {
        self.num_ok_msgs += rhs.num_ok_msgs;
        self.num_acl_rejects += rhs.num_acl_rejects;
        self.num_decode_errors += rhs.num_decode_errors;
        self.num_transient_recv_errors += rhs.num_transient_recv_errors;
        self.num_dead_handles += rhs.num_dead_handles;
        self.num_bytes += rhs.num_bytes;
    }
}

#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize)]
pub struct SendMetrics {
    pub num_announced: usize,
    pub num_suppressed: usize,
    pub num_unavailable: usize,
    pub num_oversize: usize,
    pub num_failed_sends: usize,
}

impl AddAssign for SendMetrics {
    fn add_assign(&mut self, rhs: Self) {
        self.num_announced += rhs.num_announced;
        self.num_suppressed += rhs.num_suppressed;
        self.num_unavailable += rhs.num_unavailable;
        self.num_oversize += rhs.num_oversize;
        self.num_failed_sends += rhs.num_failed_sends;
    }
}

#[test]
fn recv_metrics_add_assign() {
    let mut metrics = RecvMetrics {
        num_ok_msgs: 10,
        num_acl_rejects: 2,
        num_decode_errors: 3,
        num_transient_recv_errors: 1,
        num_dead_handles: 0,
        num_bytes: 480,
    };

    metrics += RecvMetrics {
        num_ok_msgs: 5,
        num_acl_rejects: 1,
        num_decode_errors: 0,
        num_transient_recv_errors: 2,
        num_dead_handles: 1,
        num_bytes: 220,
    };

    assert_eq!(metrics.num_ok_msgs, 15);
    assert_eq!(metrics.num_acl_rejects, 3);
    assert_eq!(metrics.num_decode_errors, 3);
    assert_eq!(metrics.num_transient_recv_errors, 3);
    assert_eq!(metrics.num_dead_handles, 1);
    assert_eq!(metrics.num_bytes, 700);
}

#[test]
fn send_metrics_add_assign() {
    let mut metrics = SendMetrics {
        num_announced: 4,
        num_suppressed: 6,
        num_unavailable: 1,
        num_oversize: 0,
        num_failed_sends: 2,
    };

    metrics += SendMetrics {
        num_announced: 1,
        num_suppressed: 1,
        num_unavailable: 1,
        num_oversize: 1,
        num_failed_sends: 1,
    };

    assert_eq!(metrics.num_announced, 5);
    assert_eq!(metrics.num_suppressed, 7);
    assert_eq!(metrics.num_unavailable, 2);
    assert_eq!(metrics.num_oversize, 1);
    assert_eq!(metrics.num_failed_sends, 3);
}
