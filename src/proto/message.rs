// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Lazy message views and typed field accessors.

use crate::blob::Blob;
use crate::blob::IntervalReader;
use crate::blob::Region;
use crate::io::Read as _;
use crate::proto::wire::FieldCursor;
use crate::proto::wire::RawField;
use crate::proto::wire::MAP_KEY;
use crate::proto::wire::MAP_VALUE;
use crate::proto::Error;

/// A lazy view of a serialized proto message.
///
/// A `Message` is nothing but a [`Region`] of a [`Blob`] plus accessors;
/// creating one, and every accessor on it, reads at most a handful of
/// bytes. Accessors that yield nested values (`bytes`, `message`, the
/// iterators and maps) return further descriptors over the same blob.
///
/// For singular fields, the first occurrence in the message wins.
#[derive(Copy, Clone)]
pub struct Message<'b> {
    source: &'b dyn Blob,
    region: Region,
}

impl core::fmt::Debug for Message<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Message").field("region", &self.region).finish()
    }
}

impl<'b> Message<'b> {
    /// Creates a message view over `region` of `source`.
    pub fn new(source: &'b dyn Blob, region: Region) -> Self {
        Self { source, region }
    }

    /// Creates a message view spanning all of `source`.
    pub fn from_blob(source: &'b dyn Blob) -> Result<Self, Error> {
        let len = source.size()?;
        Ok(Self::new(source, Region::new(0, len)))
    }

    /// Returns the entire serialized message as a [`Bytes`] descriptor.
    ///
    /// This is how signature subjects are obtained: the exact bytes the
    /// producer serialized, not a re-encoding.
    pub fn as_bytes(&self) -> Bytes<'b> {
        Bytes {
            source: self.source,
            region: self.region,
        }
    }

    /// Returns the region this view covers.
    pub fn region(&self) -> Region {
        self.region
    }

    fn cursor(&self) -> FieldCursor<'b> {
        FieldCursor::new(IntervalReader::new(self.source, self.region))
    }

    /// Scans for the first occurrence of `field`.
    fn find(&self, field: u32) -> Result<RawField, Error> {
        let mut cursor = self.cursor();
        while let Some(raw) = cursor.next_field()? {
            if raw.field() == field {
                return Ok(raw);
            }
        }
        Err(Error::FieldNotFound)
    }

    fn find_varint(&self, field: u32) -> Result<u64, Error> {
        match self.find(field)? {
            RawField::Varint { value, .. } => Ok(value),
            _ => Err(Error::WrongWireType),
        }
    }

    fn find_delimited(&self, field: u32) -> Result<Region, Error> {
        match self.find(field)? {
            RawField::Delimited { region, .. } => Ok(region),
            _ => Err(Error::WrongWireType),
        }
    }

    /// Reads `field` as a `uint32`.
    pub fn uint32(&self, field: u32) -> Result<u32, Error> {
        u32::try_from(self.find_varint(field)?).map_err(|_| Error::Malformed)
    }

    /// Reads `field` as a `uint64`.
    pub fn uint64(&self, field: u32) -> Result<u64, Error> {
        self.find_varint(field)
    }

    /// Reads `field` as a `bytes` descriptor.
    pub fn bytes(&self, field: u32) -> Result<Bytes<'b>, Error> {
        Ok(Bytes {
            source: self.source,
            region: self.find_delimited(field)?,
        })
    }

    /// Reads `field` as a `string` descriptor.
    pub fn string(&self, field: u32) -> Result<Str<'b>, Error> {
        Ok(Str(self.bytes(field)?))
    }

    /// Reads `field` as a nested message view.
    pub fn message(&self, field: u32) -> Result<Message<'b>, Error> {
        Ok(Message::new(self.source, self.find_delimited(field)?))
    }

    /// Returns an iterator over every occurrence of the repeated message
    /// `field`.
    pub fn repeated_messages(&self, field: u32) -> RepeatedMessages<'b> {
        RepeatedMessages {
            inner: Repeated::new(*self, field),
        }
    }

    /// Returns an iterator over every occurrence of the repeated bytes
    /// `field`.
    pub fn repeated_bytes(&self, field: u32) -> RepeatedBytes<'b> {
        RepeatedBytes {
            inner: Repeated::new(*self, field),
        }
    }

    /// Returns a lookup view of `field` as a `map<string, message>`.
    pub fn message_map(&self, field: u32) -> MessageMap<'b> {
        MessageMap {
            message: *self,
            field,
        }
    }

    /// Returns a lookup view of `field` as a `map<string, bytes>`.
    pub fn bytes_map(&self, field: u32) -> BytesMap<'b> {
        BytesMap {
            message: *self,
            field,
        }
    }
}

/// A lazy descriptor for a `bytes` field.
///
/// The payload has not been read; it is streamed on demand through
/// [`Bytes::reader()`] or compared in place with [`Bytes::equals()`].
#[derive(Copy, Clone)]
pub struct Bytes<'b> {
    source: &'b dyn Blob,
    region: Region,
}

impl<'b> Bytes<'b> {
    /// Returns the payload length in bytes.
    pub fn len(&self) -> u64 {
        self.region.len
    }

    /// Returns whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.region.len == 0
    }

    /// Returns an [`IntervalReader`] over the payload.
    pub fn reader(&self) -> IntervalReader<'b> {
        IntervalReader::new(self.source, self.region)
    }

    /// Reinterprets the payload as a nested message view.
    pub fn as_message(&self) -> Message<'b> {
        Message::new(self.source, self.region)
    }

    /// Reads the payload into a fixed-size array.
    ///
    /// Fails with [`Error::Malformed`] unless the payload is exactly `N`
    /// bytes, which is how all fixed-width cryptographic fields (key ids,
    /// digests, signatures, public keys) are read.
    pub fn read_fixed<const N: usize>(&self) -> Result<[u8; N], Error> {
        if self.region.len != N as u64 {
            return Err(Error::Malformed);
        }
        let mut out = [0u8; N];
        self.reader().read_bytes(&mut out)?;
        Ok(out)
    }

    /// Compares the payload against an in-memory slice without loading it
    /// whole, one small chunk at a time.
    pub fn equals(&self, other: &[u8]) -> Result<bool, Error> {
        if self.region.len != other.len() as u64 {
            return Ok(false);
        }
        let mut reader = self.reader();
        let mut chunk = [0u8; 32];
        let mut rest = other;
        while !rest.is_empty() {
            let n = rest.len().min(chunk.len());
            reader.read_bytes(&mut chunk[..n])?;
            if chunk[..n] != rest[..n] {
                return Ok(false);
            }
            rest = &rest[n..];
        }
        Ok(true)
    }
}

/// A lazy descriptor for a `string` field.
#[derive(Copy, Clone)]
pub struct Str<'b>(Bytes<'b>);

impl<'b> Str<'b> {
    /// Returns the string length in bytes.
    pub fn len(&self) -> u64 {
        self.0.len()
    }

    /// Returns whether the string is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the underlying [`Bytes`] descriptor.
    pub fn as_bytes(&self) -> Bytes<'b> {
        self.0
    }

    /// Reads the string into `buf`, returning the filled prefix.
    ///
    /// Fails with [`Error::BufferTooSmall`] if `buf` cannot hold the whole
    /// string, and with [`Error::Malformed`] if the bytes are not UTF-8.
    pub fn read<'s>(&self, buf: &'s mut [u8]) -> Result<&'s str, Error> {
        let len = usize::try_from(self.0.len())
            .map_err(|_| Error::BufferTooSmall)?;
        if len > buf.len() {
            return Err(Error::BufferTooSmall);
        }
        self.0.reader().read_bytes(&mut buf[..len])?;
        core::str::from_utf8(&buf[..len]).map_err(|_| Error::Malformed)
    }
}

/// Shared machinery for the repeated-field iterators: scan for `field`,
/// yield its delimited payloads, and fuse on the first error.
struct Repeated<'b> {
    source: &'b dyn Blob,
    cursor: FieldCursor<'b>,
    field: u32,
    done: bool,
}

impl<'b> Repeated<'b> {
    fn new(message: Message<'b>, field: u32) -> Self {
        Self {
            source: message.source,
            cursor: message.cursor(),
            field,
            done: false,
        }
    }

    fn next_region(&mut self) -> Option<Result<Region, Error>> {
        if self.done {
            return None;
        }
        loop {
            match self.cursor.next_field() {
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
                Ok(None) => {
                    self.done = true;
                    return None;
                }
                Ok(Some(RawField::Delimited { field, region }))
                    if field == self.field =>
                {
                    return Some(Ok(region));
                }
                Ok(Some(raw)) if raw.field() == self.field => {
                    self.done = true;
                    return Some(Err(Error::WrongWireType));
                }
                Ok(Some(_)) => continue,
            }
        }
    }
}

/// An iterator over the occurrences of a repeated message field.
///
/// The iterator is fused: after yielding an error it yields nothing more.
pub struct RepeatedMessages<'b> {
    inner: Repeated<'b>,
}

impl<'b> Iterator for RepeatedMessages<'b> {
    type Item = Result<Message<'b>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let region = self.inner.next_region()?;
        Some(region.map(|r| Message::new(self.inner.source, r)))
    }
}

/// An iterator over the occurrences of a repeated bytes field.
///
/// The iterator is fused: after yielding an error it yields nothing more.
pub struct RepeatedBytes<'b> {
    inner: Repeated<'b>,
}

impl<'b> Iterator for RepeatedBytes<'b> {
    type Item = Result<Bytes<'b>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let region = self.inner.next_region()?;
        Some(region.map(|r| Bytes {
            source: self.inner.source,
            region: r,
        }))
    }
}

/// A lookup view of a `map<string, message>` field.
///
/// Proto maps are repeated entry messages with the key at field 1 and the
/// value at field 2. Lookup compares raw key bytes (no UTF-8 validation),
/// so byte strings such as 32-byte key ids can serve as keys; the first
/// matching entry wins.
#[derive(Copy, Clone)]
pub struct MessageMap<'b> {
    message: Message<'b>,
    field: u32,
}

impl<'b> MessageMap<'b> {
    /// Looks up `key`, returning [`Error::FieldNotFound`] if no entry
    /// matches.
    pub fn get(&self, key: &[u8]) -> Result<Message<'b>, Error> {
        map_lookup(self.message, self.field, key)?.message(MAP_VALUE)
    }
}

/// A lookup view of a `map<string, bytes>` field.
///
/// See [`MessageMap`] for the entry encoding and lookup rules.
#[derive(Copy, Clone)]
pub struct BytesMap<'b> {
    message: Message<'b>,
    field: u32,
}

impl<'b> BytesMap<'b> {
    /// Looks up `key`, returning [`Error::FieldNotFound`] if no entry
    /// matches.
    pub fn get(&self, key: &[u8]) -> Result<Bytes<'b>, Error> {
        map_lookup(self.message, self.field, key)?.bytes(MAP_VALUE)
    }
}

fn map_lookup<'b>(
    message: Message<'b>,
    field: u32,
    key: &[u8],
) -> Result<Message<'b>, Error> {
    for entry in message.repeated_messages(field) {
        let entry = entry?;
        if entry.bytes(MAP_KEY)?.equals(key)? {
            return Ok(entry);
        }
    }
    Err(Error::FieldNotFound)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::blob::Ram;

    // Hand-encoded test message:
    //
    //   1: varint 7
    //   2: "abc"
    //   3: message { 1: varint 300 }
    //   4: "x" (first occurrence)
    //   4: "y"
    //   5: map { "k1" -> message { 1: varint 1 },
    //            "k2" -> message { 1: varint 2 } }
    const MESSAGE: &[u8] = &[
        0x08, 0x07, // 1: 7
        0x12, 0x03, b'a', b'b', b'c', // 2: "abc"
        0x1a, 0x03, 0x08, 0xac, 0x02, // 3: { 1: 300 }
        0x22, 0x01, b'x', // 4: "x"
        0x22, 0x01, b'y', // 4: "y"
        0x2a, 0x08, // 5: entry
        0x0a, 0x02, b'k', b'1', // key "k1"
        0x12, 0x02, 0x08, 0x01, // value { 1: 1 }
        0x2a, 0x08, // 5: entry
        0x0a, 0x02, b'k', b'2', // key "k2"
        0x12, 0x02, 0x08, 0x02, // value { 1: 2 }
    ];

    fn message(bytes: &'static [u8]) -> Message<'static> {
        let blob: &'static Ram<&'static [u8]> = Box::leak(Box::new(Ram(bytes)));
        Message::new(blob, Region::new(0, bytes.len() as u64))
    }

    #[test]
    fn scalars() {
        let msg = message(MESSAGE);
        assert_eq!(msg.uint32(1).unwrap(), 7);
        assert_eq!(msg.uint64(1).unwrap(), 7);
        assert_eq!(msg.uint32(9).unwrap_err(), Error::FieldNotFound);
        assert_eq!(msg.uint32(2).unwrap_err(), Error::WrongWireType);
    }

    #[test]
    fn bytes_field() {
        let msg = message(MESSAGE);
        let bytes = msg.bytes(2).unwrap();
        assert_eq!(bytes.len(), 3);
        assert!(bytes.equals(b"abc").unwrap());
        assert!(!bytes.equals(b"abd").unwrap());
        assert!(!bytes.equals(b"ab").unwrap());
        assert_eq!(&bytes.read_fixed::<3>().unwrap(), b"abc");
        assert_eq!(
            bytes.read_fixed::<4>().unwrap_err(),
            Error::Malformed
        );
    }

    #[test]
    fn string_field() {
        let msg = message(MESSAGE);
        let mut buf = [0u8; 8];
        assert_eq!(msg.string(2).unwrap().read(&mut buf).unwrap(), "abc");

        let mut small = [0u8; 2];
        assert_eq!(
            msg.string(2).unwrap().read(&mut small).unwrap_err(),
            Error::BufferTooSmall
        );
    }

    #[test]
    fn nested_message() {
        let msg = message(MESSAGE);
        assert_eq!(msg.message(3).unwrap().uint32(1).unwrap(), 300);
    }

    #[test]
    fn first_occurrence_wins() {
        let msg = message(MESSAGE);
        assert!(msg.bytes(4).unwrap().equals(b"x").unwrap());
    }

    #[test]
    fn repeated() {
        let msg = message(MESSAGE);
        let values = msg
            .repeated_bytes(4)
            .map(|b| {
                let b = b.unwrap();
                b.read_fixed::<1>().unwrap()[0]
            })
            .collect::<Vec<_>>();
        assert_eq!(values, [b'x', b'y']);

        assert_eq!(msg.repeated_messages(9).count(), 0);
    }

    #[test]
    fn repeated_fuses_on_error() {
        // field 1 delimited, then a truncated field.
        let bad = &[0x0a, 0x01, 0xff, 0x08][..];
        let msg = message(bad);
        let mut iter = msg.repeated_messages(1);
        assert!(iter.next().unwrap().is_ok());
        assert!(iter.next().unwrap().is_err());
        assert!(iter.next().is_none());
    }

    #[test]
    fn maps() {
        let msg = message(MESSAGE);
        let map = msg.message_map(5);
        assert_eq!(map.get(b"k1").unwrap().uint32(1).unwrap(), 1);
        assert_eq!(map.get(b"k2").unwrap().uint32(1).unwrap(), 2);
        assert_eq!(map.get(b"k3").unwrap_err(), Error::FieldNotFound);
    }

    #[test]
    fn whole_message_as_bytes() {
        let blob = Ram(MESSAGE);
        let msg = Message::from_blob(&blob).unwrap();
        assert_eq!(msg.as_bytes().len(), MESSAGE.len() as u64);
        assert!(msg.as_bytes().equals(MESSAGE).unwrap());
    }
}
