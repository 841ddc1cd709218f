use crate::cursor::{XdrCursor, string_wire_size};
use crate::error::Error;
use crate::error::Error::{LegacyEncode, MessageTooLarge, TextUnsupported};
use crate::value::MetricValue;
use crate::wire::{FromWire, ToWire};
use crate::{CURRENT_INDEX, MAX_DATAGRAM_LEN, Protocol};

/// One metric announcement.
///
/// Both layouts share the three-field header {index, host, name}. An
/// index below [`CURRENT_INDEX`] selects the legacy layout, which stops
/// after the value payload; the current layout inserts the sending
/// agent's start time ahead of the value and appends the units, tmax,
/// and dmax descriptors. The legacy layout is decoded for
/// interoperability with old agents but never emitted.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricMessage {
    pub index: u32,
    /// Hostname of the agent that measured the value.
    pub host: String,
    pub name: String,
    /// Epoch seconds at which the sending agent started; zero when the
    /// legacy layout did not carry one.
    pub agent_started: u32,
    pub value: MetricValue,
    pub units: String,
    /// Longest interval, in seconds, the sender will let pass between
    /// announcements of this metric.
    pub tmax: u32,
    /// Seconds after which a receiver may discard the metric; zero
    /// keeps it indefinitely.
    pub dmax: u32,
}

impl MetricMessage {
    pub fn new(
        host: impl Into<String>,
        name: impl Into<String>,
        value: MetricValue,
        units: impl Into<String>,
        agent_started: u32,
        tmax: u32,
        dmax: u32,
    ) -> Self {
        Self {
            index: CURRENT_INDEX,
            host: host.into(),
            name: name.into(),
            agent_started,
            value,
            units: units.into(),
            tmax,
            dmax,
        }
    }

    pub fn is_legacy(&self) -> bool {
        self.index < CURRENT_INDEX
    }

    /// Decode one datagram according to the channel's protocol tag.
    pub fn decode(buf: &mut [u8], protocol: Protocol) -> Result<Self, Error> {
        match protocol {
            Protocol::Xdr => {
                let mut cursor = XdrCursor::new(buf);
                Self::from_wire(&mut cursor)
            }
            Protocol::Text => Err(TextUnsupported),
        }
    }

    /// Encode for the given protocol tag.
    ///
    /// Fails with [`MessageTooLarge`] when the result would not fit in
    /// one datagram, and with [`LegacyEncode`] for messages carrying a
    /// legacy index.
    pub fn encode(&self, protocol: Protocol) -> Result<Vec<u8>, Error> {
        match protocol {
            Protocol::Xdr => {
                if self.is_legacy() {
                    return Err(LegacyEncode(self.index));
                }

                let size = self.wire_size();
                if size > MAX_DATAGRAM_LEN {
                    return Err(MessageTooLarge(size));
                }

                self.as_bytes()
            }
            Protocol::Text => Err(TextUnsupported),
        }
    }
}

impl ToWire for MetricMessage {
    fn wire_size(&self) -> usize {
        4 + string_wire_size(&self.host)
            + string_wire_size(&self.name)
            + 4 // agent_started
            + self.value.wire_size()
            + string_wire_size(&self.units)
            + 4 // tmax
            + 4 // dmax
    }

    fn to_wire(&self, cursor: &mut XdrCursor) -> Result<(), Error> {
        cursor.try_put_u32(self.index)?;
        cursor.try_put_string(&self.host)?;
        cursor.try_put_string(&self.name)?;
        cursor.try_put_u32(self.agent_started)?;
        self.value.to_wire(cursor)?;
        cursor.try_put_string(&self.units)?;
        cursor.try_put_u32(self.tmax)?;
        cursor.try_put_u32(self.dmax)
    }
}

impl FromWire for MetricMessage {
    fn from_wire(cursor: &mut XdrCursor) -> Result<Self, Error> {
        let index = cursor.try_get_u32()?;
        let host = cursor.try_get_string()?;
        let name = cursor.try_get_string()?;

        if index < CURRENT_INDEX {
            // Legacy layout ends at the value payload.
            let value = MetricValue::from_wire(cursor)?;
            return Ok(Self {
                index,
                host,
                name,
                agent_started: 0,
                value,
                units: String::new(),
                tmax: 0,
                dmax: 0,
            });
        }

        let agent_started = cursor.try_get_u32()?;
        let value = MetricValue::from_wire(cursor)?;
        let units = cursor.try_get_string()?;
        let tmax = cursor.try_get_u32()?;
        let dmax = cursor.try_get_u32()?;

        Ok(Self {
            index,
            host,
            name,
            agent_started,
            value,
            units,
            tmax,
            dmax,
        })
    }
}
