use crate::cursor::XdrCursor;
use crate::error::Error;

/// Implementations can serialize themselves into the metric wire format
pub trait ToWire {
    fn wire_size(&self) -> usize;
    fn to_wire(&self, cursor: &mut XdrCursor) -> Result<(), Error>;

    /// Convenience method to serialize this value into a new `Vec<u8>`.
    ///
    /// In performance-critical cases consider `to_wire` instead.
    fn as_bytes(&self) -> Result<Vec<u8>, Error> {
        let mut buf = vec![0u8; self.wire_size()];
        let mut cursor = XdrCursor::new(&mut buf);
        self.to_wire(&mut cursor)?;
        Ok(buf)
    }
}

pub trait FromWire: Sized {
    fn from_wire(cursor: &mut XdrCursor) -> Result<Self, Error>;
}
