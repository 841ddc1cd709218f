use std::fmt::{self, Display, Formatter};
use std::mem::size_of;

use MetricValue::{Float, Int, Str, Uint};

use crate::cursor::{XdrCursor, string_wire_size};
use crate::error::Error;
use crate::error::Error::InvalidValueKind;
use crate::wire::{FromWire, ToWire};

/// Type tag preceding every value payload on the wire.
#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ValueKind {
    Int = 0,
    Uint = 1,
    Float = 2,
    Str = 3,
}

impl ToWire for ValueKind {
    fn wire_size(&self) -> usize {
        size_of::<u32>()
    }

    fn to_wire(&self, cursor: &mut XdrCursor) -> Result<(), Error> {
        cursor.try_put_u32(*self as u32)
    }
}

impl FromWire for ValueKind {
    fn from_wire(cursor: &mut XdrCursor) -> Result<Self, Error> {
        let value = cursor.try_get_u32()?;
        match value {
            0 => Ok(ValueKind::Int),
            1 => Ok(ValueKind::Uint),
            2 => Ok(ValueKind::Float),
            3 => Ok(ValueKind::Str),
            _ => Err(InvalidValueKind(value)),
        }
    }
}

/// A single measured value as carried on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    Int(i32),
    Uint(u32),
    Float(f32),
    Str(String),
}

impl MetricValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            Int(_) => ValueKind::Int,
            Uint(_) => ValueKind::Uint,
            Float(_) => ValueKind::Float,
            Str(_) => ValueKind::Str,
        }
    }

    /// Numeric projection used for threshold comparisons. Strings have
    /// none.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Int(v) => Some(*v as f64),
            Uint(v) => Some(*v as f64),
            Float(v) => Some(*v as f64),
            Str(_) => None,
        }
    }
}

impl Display for MetricValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Int(v) => write!(f, "{v}"),
            Uint(v) => write!(f, "{v}"),
            Float(v) => write!(f, "{v}"),
            Str(v) => f.write_str(v),
        }
    }
}

impl ToWire for MetricValue {
    fn wire_size(&self) -> usize {
        let payload = match self {
            Int(_) | Uint(_) | Float(_) => size_of::<u32>(),
            Str(s) => string_wire_size(s),
        };
        self.kind().wire_size() + payload
    }

    fn to_wire(&self, cursor: &mut XdrCursor) -> Result<(), Error> {
        self.kind().to_wire(cursor)?;
        match self {
            Int(v) => cursor.try_put_u32(*v as u32),
            Uint(v) => cursor.try_put_u32(*v),
            Float(v) => cursor.try_put_u32(v.to_bits()),
            Str(s) => cursor.try_put_string(s),
        }
    }
}

impl FromWire for MetricValue {
    fn from_wire(cursor: &mut XdrCursor) -> Result<Self, Error> {
        match ValueKind::from_wire(cursor)? {
            ValueKind::Int => Ok(Int(cursor.try_get_u32()? as i32)),
            ValueKind::Uint => Ok(Uint(cursor.try_get_u32()?)),
            ValueKind::Float => Ok(Float(f32::from_bits(cursor.try_get_u32()?))),
            ValueKind::Str => Ok(Str(cursor.try_get_string()?)),
        }
    }
}
