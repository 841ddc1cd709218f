//! Socket ownership: the receive pollset and the send fan-out set.
//! Sockets are opened at startup and live for the life of the process.

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket as StdUdpSocket};
use std::time::Duration;

use meshmon_protocol::Protocol;
use mio::net::UdpSocket as MioUdpSocket;
use mio::{Events, Interest, Poll, Token};
use socket2::{Domain, Socket, Type};
use tracing::{debug, warn};

use crate::config::{RecvChannelConfig, SendChannelConfig, Subnet};
use crate::error::Error;

/// One bound receive socket with its routing metadata. The ACL check
/// itself belongs to the receive engine; the subnet is only carried
/// here.
pub struct RecvChannel {
    pub socket: MioUdpSocket,
    pub protocol: Protocol,
    pub allow: Option<Subnet>,
}

/// One connected send socket.
struct SendChannel {
    socket: StdUdpSocket,
    dest: SocketAddr,
}

pub struct ChannelLayer {
    poll: Poll,
    events: Events,
    /// Indexed by poll token. A slot goes `None` when its handle is
    /// withdrawn after an unrecoverable error.
    recv: Vec<Option<RecvChannel>>,
    send: Vec<SendChannel>,
}

impl ChannelLayer {
    pub fn new(
        recv_cfgs: &[RecvChannelConfig],
        send_cfgs: &[SendChannelConfig],
    ) -> Result<Self, Error> {
        let poll = Poll::new().map_err(Error::ChannelSetup)?;

        let mut recv = Vec::with_capacity(recv_cfgs.len());
        for (idx, cfg) in recv_cfgs.iter().enumerate() {
            let mut socket = bind_recv_socket(cfg)?;
            poll.registry()
                .register(&mut socket, Token(idx), Interest::READABLE)
                .map_err(Error::ChannelSetup)?;

            let allow = match (&cfg.allow_ip, &cfg.allow_mask) {
                (Some(ip), Some(mask)) => Some(Subnet::parse(ip, mask)?),
                _ => None,
            };

            debug!(
                port = cfg.port,
                mcast_join = ?cfg.mcast_join,
                protocol = %cfg.protocol,
                "receive channel up"
            );

            recv.push(Some(RecvChannel {
                socket,
                protocol: cfg.protocol.parse()?,
                allow,
            }));
        }

        let mut send = Vec::with_capacity(send_cfgs.len());
        for cfg in send_cfgs {
            send.push(open_send_socket(cfg)?);
        }

        Ok(Self {
            poll,
            events: Events::with_capacity(64),
            recv,
            send,
        })
    }

    /// Wait up to `timeout` for readable receive channels; `None`
    /// blocks until one is ready and `Some(0)` polls without blocking.
    /// Returns the indexes of ready channels; an empty list is a
    /// permitted spurious wake.
    pub fn poll(&mut self, timeout: Option<Duration>) -> Vec<usize> {
        if let Err(e) = self.poll.poll(&mut self.events, timeout) {
            if e.kind() != io::ErrorKind::Interrupted {
                warn!("pollset error: {e}");
            }
            return Vec::new();
        }

        let mut ready: Vec<usize> = self
            .events
            .iter()
            .map(|event| event.token().0)
            .filter(|&idx| matches!(self.recv.get(idx), Some(Some(_))))
            .collect();
        ready.sort_unstable();
        ready.dedup();
        ready
    }

    pub fn recv_channel(&mut self, idx: usize) -> Option<&mut RecvChannel> {
        self.recv.get_mut(idx).and_then(|slot| slot.as_mut())
    }

    pub fn num_recv_channels(&self) -> usize {
        self.recv.iter().flatten().count()
    }

    /// Withdraw a handle that reported an unrecoverable error. The rest
    /// of the pollset keeps running.
    pub fn disable_recv(&mut self, idx: usize) {
        if let Some(slot) = self.recv.get_mut(idx) {
            if let Some(channel) = slot.as_mut() {
                let _ = self.poll.registry().deregister(&mut channel.socket);
            }
            *slot = None;
        }
    }

    /// Best-effort fan-out of one datagram to every send channel.
    /// Returns the number of channels that failed; a failure never
    /// aborts the remainder.
    pub fn send_all(&mut self, buf: &[u8]) -> usize {
        let mut failures = 0;
        for channel in &self.send {
            if let Err(e) = channel.socket.send(buf) {
                debug!(dest = %channel.dest, "send failed: {e}");
                failures += 1;
            }
        }
        failures
    }

    pub fn num_send_channels(&self) -> usize {
        self.send.len()
    }
}

fn parse_ipv4(text: &str) -> Result<Ipv4Addr, Error> {
    text.parse().map_err(|_| Error::InvalidAddress(text.to_string()))
}

fn bind_recv_socket(cfg: &RecvChannelConfig) -> Result<MioUdpSocket, Error> {
    let socket = if let Some(group) = &cfg.mcast_join {
        let group = parse_ipv4(group)?;
        if !group.is_multicast() {
            return Err(Error::InvalidAddress(group.to_string()));
        }

        let iface = match &cfg.mcast_if {
            Some(addr) => parse_ipv4(addr)?,
            None => Ipv4Addr::UNSPECIFIED,
        };

        let socket = Socket::new(Domain::IPV4, Type::DGRAM, None).map_err(Error::ChannelSetup)?;
        socket.set_nonblocking(true).map_err(Error::ChannelSetup)?;
        // Several agents on one box must be able to share the group.
        socket.set_reuse_address(true).map_err(Error::ChannelSetup)?;

        let bind_addr = SocketAddr::new(IpAddr::V4(group), cfg.port);
        socket.bind(&bind_addr.into()).map_err(Error::ChannelSetup)?;
        socket
            .join_multicast_v4(&group, &iface)
            .map_err(Error::ChannelSetup)?;
        socket
    } else {
        let bind_ip: IpAddr = match &cfg.bind {
            Some(addr) => addr
                .parse()
                .map_err(|_| Error::InvalidAddress(addr.clone()))?,
            None => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        };
        let bind_addr = SocketAddr::new(bind_ip, cfg.port);

        let socket =
            Socket::new(Domain::for_address(bind_addr), Type::DGRAM, None).map_err(Error::ChannelSetup)?;
        socket.set_nonblocking(true).map_err(Error::ChannelSetup)?;
        socket.bind(&bind_addr.into()).map_err(Error::ChannelSetup)?;
        socket
    };

    let std_socket: StdUdpSocket = socket.into();
    Ok(MioUdpSocket::from_std(std_socket))
}

fn open_send_socket(cfg: &SendChannelConfig) -> Result<SendChannel, Error> {
    let ip: IpAddr = cfg
        .ip
        .parse()
        .map_err(|_| Error::InvalidAddress(cfg.ip.clone()))?;
    let dest = SocketAddr::new(ip, cfg.port);

    let socket =
        Socket::new(Domain::for_address(dest), Type::DGRAM, None).map_err(Error::ChannelSetup)?;
    socket.set_nonblocking(true).map_err(Error::ChannelSetup)?;

    if ip.is_multicast() || cfg.mcast_join.is_some() {
        match ip {
            IpAddr::V4(_) => {
                if let Some(addr) = &cfg.mcast_if {
                    socket
                        .set_multicast_if_v4(&parse_ipv4(addr)?)
                        .map_err(Error::ChannelSetup)?;
                }
                // TTL 1: announcements stay on the local segment.
                socket.set_multicast_ttl_v4(1).map_err(Error::ChannelSetup)?;
            }
            IpAddr::V6(_) => return Err(Error::InvalidAddress(cfg.ip.clone())),
        }
    }

    socket.connect(&dest.into()).map_err(Error::ChannelSetup)?;

    debug!(%dest, protocol = %cfg.protocol, "send channel up");

    Ok(SendChannel {
        socket: socket.into(),
        dest,
    })
}
