//! The agent's already-parsed configuration tree.
//!
//! The binary reads this from a JSON file; the core only ever sees the
//! parsed value. Options handled by the wrapper process rather than the
//! core (`daemonize`, `setuid`, `user`, `debug_level`) are accepted so
//! existing configs parse, and otherwise ignored here.

use std::fs;
use std::net::{IpAddr, Ipv4Addr};

use meshmon_protocol::Protocol;
use serde::Deserialize;

use crate::error::Error;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Disable every receive channel.
    #[serde(default)]
    pub deaf: bool,

    /// Disable every send channel and the scheduler.
    #[serde(default)]
    pub mute: bool,

    /// Hosts silent for longer than this many seconds are evicted.
    /// Zero disables the sweep.
    #[serde(default)]
    pub host_stale_secs: u64,

    #[serde(default)]
    pub udp_recv_channel: Vec<RecvChannelConfig>,

    #[serde(default)]
    pub udp_send_channel: Vec<SendChannelConfig>,

    #[serde(default)]
    pub collection_group: Vec<GroupConfig>,

    // Recognized but handled outside the core.
    #[serde(default)]
    pub daemonize: bool,
    #[serde(default)]
    pub setuid: bool,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub debug_level: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecvChannelConfig {
    pub port: u16,

    /// Local address to bind; wildcard when absent. Ignored for
    /// multicast channels, which bind the group address.
    #[serde(default)]
    pub bind: Option<String>,

    /// Multicast group to join on this channel.
    #[serde(default)]
    pub mcast_join: Option<String>,

    /// Local interface address for the multicast join; the OS picks
    /// one when absent.
    #[serde(default)]
    pub mcast_if: Option<String>,

    /// With `allow_mask`, restricts accepted senders to one subnet.
    #[serde(default)]
    pub allow_ip: Option<String>,

    #[serde(default)]
    pub allow_mask: Option<String>,

    #[serde(default = "default_protocol")]
    pub protocol: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendChannelConfig {
    /// Destination address, unicast or multicast.
    pub ip: String,

    pub port: u16,

    #[serde(default)]
    pub mcast_join: Option<String>,

    /// Local interface address for outbound multicast.
    #[serde(default)]
    pub mcast_if: Option<String>,

    #[serde(default = "default_protocol")]
    pub protocol: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupConfig {
    pub name: String,

    /// Seconds between measurement passes over this group.
    pub collect_every: u64,

    /// Longest interval a metric of this group may go unannounced.
    pub time_threshold: u64,

    #[serde(default)]
    pub metric: Vec<MetricConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricConfig {
    pub name: String,

    /// Minimum relative change, in percent, that announces a numeric
    /// metric ahead of its time threshold. Zero announces every
    /// collection.
    #[serde(default)]
    pub value_threshold: f64,
}

fn default_protocol() -> String {
    "xdr".to_string()
}

impl AgentConfig {
    pub fn from_file(path: &str) -> Result<Self, Error> {
        let contents =
            fs::read_to_string(path).map_err(|e| Error::ConfigRead(path.to_string(), e))?;

        let config: AgentConfig = serde_json::from_str(&contents)
            .map_err(|e| Error::ConfigParse(path.to_string(), e))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the agent cannot meaningfully run.
    pub fn validate(&self) -> Result<(), Error> {
        if self.deaf && self.mute {
            return Err(Error::DeafAndMute);
        }

        for channel in &self.udp_recv_channel {
            channel.protocol.parse::<Protocol>()?;

            if channel.allow_ip.is_some() != channel.allow_mask.is_some() {
                return Err(Error::IncompleteSubnet);
            }
            if let (Some(ip), Some(mask)) = (&channel.allow_ip, &channel.allow_mask) {
                Subnet::parse(ip, mask)?;
            }
        }

        for channel in &self.udp_send_channel {
            // The text framing cannot be emitted, so a text send channel
            // can never carry traffic.
            if channel.protocol.parse::<Protocol>()? == Protocol::Text {
                return Err(Error::Protocol(meshmon_protocol::Error::TextUnsupported));
            }
        }

        for group in &self.collection_group {
            if group.collect_every == 0 {
                return Err(Error::ZeroCollectInterval(group.name.clone()));
            }
        }

        Ok(())
    }
}

/// IPv4 subnet used for per-channel access control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subnet {
    addr: Ipv4Addr,
    mask: Ipv4Addr,
}

impl Subnet {
    pub fn parse(addr: &str, mask: &str) -> Result<Self, Error> {
        let invalid = || Error::InvalidSubnet(addr.to_string(), mask.to_string());

        Ok(Self {
            addr: addr.parse().map_err(|_| invalid())?,
            mask: mask.parse().map_err(|_| invalid())?,
        })
    }

    /// True when `ip` lies inside this subnet. IPv6 sources never
    /// match.
    pub fn contains(&self, ip: IpAddr) -> bool {
        match ip {
            IpAddr::V4(v4) => {
                let mask = u32::from(self.mask);
                (u32::from(v4) & mask) == (u32::from(self.addr) & mask)
            }
            IpAddr::V6(_) => false,
        }
    }
}
