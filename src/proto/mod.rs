// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! A lazy, streaming view over protobuf-encoded messages.
//!
//! This module implements just enough of the proto wire format to look up
//! fields by number in a message that lives in [`Blob`] storage and may be
//! larger than working memory. Accessors are lazy: each returns a small
//! descriptor (a [`Region`] plus interpretation) without reading payload
//! bytes. String and bytes fields yield [`IntervalReader`]s; repeated
//! fields and maps yield iterators that decode one element per step.
//!
//! There is no schema and no generated code here. Callers supply field
//! numbers (see [`crate::bundle::format`]) and the expected interpretation;
//! a field that is absent, malformed, or of the wrong wire type surfaces a
//! typed [`Error`], which short-circuits every accessor chained after it
//! via `?`.
//!
//! [`Blob`]: crate::blob::Blob
//! [`Region`]: crate::blob::Region
//! [`IntervalReader`]: crate::blob::IntervalReader

use crate::blob;
use crate::io;

mod message;
pub(crate) mod wire;

pub use message::Bytes;
pub use message::BytesMap;
pub use message::Message;
pub use message::MessageMap;
pub use message::RepeatedBytes;
pub use message::RepeatedMessages;
pub use message::Str;

/// An error returned by a proto-view accessor.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Error {
    /// Indicates that the requested field (or map entry) is not present in
    /// the message.
    FieldNotFound,

    /// Indicates that a field is present but encoded with a different wire
    /// type than the accessor expects.
    WrongWireType,

    /// Indicates structurally invalid wire data: a truncated or overlong
    /// varint, a length that runs past the enclosing message, an unknown
    /// wire type, or a value that does not fit the requested width.
    Malformed,

    /// Indicates that a caller-provided buffer is too small to hold the
    /// value being read.
    BufferTooSmall,

    /// Indicates an error in the underlying [`blob`] storage.
    Blob(blob::Error),

    /// Indicates an error in a low-level [`io`] type.
    Io(io::Error),
}

impl From<blob::Error> for Error {
    fn from(e: blob::Error) -> Self {
        Self::Blob(e)
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}
