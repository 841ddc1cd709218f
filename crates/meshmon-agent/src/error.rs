use std::io;

use thiserror::Error;

/// Startup failures. Everything here is fatal: the process logs the
/// error and exits non-zero. Runtime failures never reach this type;
/// they are counted per datagram or per channel and dropped.
#[derive(Error, Debug)]
pub enum Error {
    #[error("nothing to do: configured both deaf and mute")]
    DeafAndMute,

    #[error("invalid address '{0}'")]
    InvalidAddress(String),

    #[error("invalid subnet: ip={0} mask={1}")]
    InvalidSubnet(String, String),

    #[error("allow_ip and allow_mask must be given together")]
    IncompleteSubnet,

    #[error("collection group '{0}': collect_every must be greater than zero")]
    ZeroCollectInterval(String),

    #[error("{0}")]
    Protocol(#[from] meshmon_protocol::Error),

    #[error("channel setup failed: {0}")]
    ChannelSetup(#[from] io::Error),

    #[error("cannot read config file '{0}': {1}")]
    ConfigRead(String, io::Error),

    #[error("cannot parse config file '{0}': {1}")]
    ConfigParse(String, serde_json::Error),
}
