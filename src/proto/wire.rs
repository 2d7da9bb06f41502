// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Proto wire-format primitives: varints, tags, and the field cursor.

use crate::blob::IntervalReader;
use crate::blob::Region;
use crate::io::Read as _;
use crate::proto::Error;

/// The key field number of a proto map entry.
pub const MAP_KEY: u32 = 1;
/// The value field number of a proto map entry.
pub const MAP_VALUE: u32 = 2;

/// A proto wire type, the low three bits of a field tag.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum WireType {
    /// A base-128 varint.
    Varint,
    /// A fixed 64-bit value.
    Fixed64,
    /// A length-delimited value: bytes, strings, and nested messages.
    Delimited,
    /// A fixed 32-bit value.
    Fixed32,
}

impl WireType {
    fn from_wire_value(wire: u64) -> Option<Self> {
        match wire {
            0 => Some(Self::Varint),
            1 => Some(Self::Fixed64),
            2 => Some(Self::Delimited),
            5 => Some(Self::Fixed32),
            // 3 and 4 are the long-deprecated group markers, which no
            // producer of this format emits.
            _ => None,
        }
    }
}

/// Reads a base-128 varint from `r`.
///
/// At most ten bytes are consumed; a varint that does not terminate within
/// them, or that overflows 64 bits, is malformed.
pub fn read_varint(r: &mut IntervalReader) -> Result<u64, Error> {
    let mut value = 0u64;
    let mut shift = 0u32;
    loop {
        let mut byte = [0u8; 1];
        r.read_bytes(&mut byte).map_err(|_| Error::Malformed)?;
        let bits = (byte[0] & 0x7f) as u64;
        if shift == 63 && bits > 1 {
            return Err(Error::Malformed);
        }
        value |= bits << shift;
        if byte[0] & 0x80 == 0 {
            return Ok(value);
        }
        shift += 7;
        if shift > 63 {
            return Err(Error::Malformed);
        }
    }
}

/// A single field scanned out of a message region.
///
/// The payload of a delimited field is described by a [`Region`]; its bytes
/// have not been read.
#[derive(Copy, Clone, Debug)]
pub enum RawField {
    /// A varint-encoded scalar.
    Varint {
        /// The field number.
        field: u32,
        /// The decoded value.
        value: u64,
    },
    /// A length-delimited payload.
    Delimited {
        /// The field number.
        field: u32,
        /// The payload interval.
        region: Region,
    },
    /// A fixed-width value (32 or 64 bits), skipped over by this crate.
    Fixed {
        /// The field number.
        field: u32,
    },
}

impl RawField {
    /// Returns the field number.
    pub fn field(&self) -> u32 {
        match *self {
            Self::Varint { field, .. }
            | Self::Delimited { field, .. }
            | Self::Fixed { field } => field,
        }
    }
}

/// A forward-only scanner over the fields of one message region.
pub struct FieldCursor<'b> {
    reader: IntervalReader<'b>,
}

impl<'b> FieldCursor<'b> {
    /// Creates a cursor at the start of `region` of `blob`.
    pub fn new(reader: IntervalReader<'b>) -> Self {
        Self { reader }
    }

    /// Decodes the next field, or `None` at the end of the region.
    pub fn next_field(&mut self) -> Result<Option<RawField>, Error> {
        if self.reader.remaining_data() == 0 {
            return Ok(None);
        }

        let tag = read_varint(&mut self.reader)?;
        let field = tag >> 3;
        if field == 0 || field > u32::MAX as u64 {
            return Err(Error::Malformed);
        }
        let field = field as u32;

        let wire =
            WireType::from_wire_value(tag & 0x7).ok_or(Error::Malformed)?;
        match wire {
            WireType::Varint => {
                let value = read_varint(&mut self.reader)?;
                Ok(Some(RawField::Varint { field, value }))
            }
            WireType::Delimited => {
                let len = read_varint(&mut self.reader)?;
                let region = Region::new(self.reader.current_offset(), len);
                self.reader.skip(len).map_err(|_| Error::Malformed)?;
                Ok(Some(RawField::Delimited { field, region }))
            }
            WireType::Fixed64 => {
                self.reader.skip(8).map_err(|_| Error::Malformed)?;
                Ok(Some(RawField::Fixed { field }))
            }
            WireType::Fixed32 => {
                self.reader.skip(4).map_err(|_| Error::Malformed)?;
                Ok(Some(RawField::Fixed { field }))
            }
        }
    }
}
