// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! I/O interfaces, in lieu of [`std::io`].
//!
//! These functions and traits are mostly intended for manipulating byte
//! buffers, but they could be implemented on other types that provide a
//! read/write interface.

use core::mem;

use static_assertions::assert_obj_safe;

/// A generic, low-level I/O error.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Error {
    /// Indicates that some underlying buffer has been completely used up,
    /// either for reading from or writing to.
    ///
    /// This is typically a fatal error, since it is probably not possible
    /// to re-allocate that underlying buffer.
    BufferExhausted,

    /// Indicates that an unspecified, internal failure occurred.
    Internal,
}

/// Represents a place that bytes can be read from, such as a `&[u8]`.
///
/// # Relation with [`std::io::Read`]
/// [`std::io::Read`] is distinct from `Read`, since `Read` must know,
/// a-priori, the total length of the underlying buffer.
pub trait Read {
    /// Reads exactly `out.len()` bytes from `self`.
    fn read_bytes(&mut self, out: &mut [u8]) -> Result<(), Error>;

    /// Returns the number of bytes still available to read.
    fn remaining_data(&self) -> usize;
}
assert_obj_safe!(Read);

impl<R: Read + ?Sized> Read for &mut R {
    #[inline]
    fn read_bytes(&mut self, out: &mut [u8]) -> Result<(), Error> {
        R::read_bytes(*self, out)
    }

    #[inline]
    fn remaining_data(&self) -> usize {
        R::remaining_data(*self)
    }
}

impl Read for &[u8] {
    fn read_bytes(&mut self, out: &mut [u8]) -> Result<(), Error> {
        let n = out.len();
        if self.len() < n {
            return Err(Error::BufferExhausted);
        }

        out.copy_from_slice(&self[..n]);
        *self = &self[n..];
        Ok(())
    }

    fn remaining_data(&self) -> usize {
        self.len()
    }
}

/// Represents a place that bytes can be written to, such as a `&[u8]`.
///
/// # Relation with [`std::io::Write`]
/// [`std::io::Write`] provides approximately a superset of `Write`, with
/// more detailed errors. [`StdWrite`] provides an implementation of
/// `Write` in terms of [`std::io::Write`].
pub trait Write {
    /// Attempt to write `buf` exactly to `self`.
    ///
    /// This function does not perform partial writes: it will either block
    /// until completion or return an error.
    fn write_bytes(&mut self, buf: &[u8]) -> Result<(), Error>;
}
assert_obj_safe!(Write);

impl<W: Write + ?Sized> Write for &mut W {
    #[inline]
    fn write_bytes(&mut self, buf: &[u8]) -> Result<(), Error> {
        W::write_bytes(*self, buf)
    }
}

impl Write for &mut [u8] {
    fn write_bytes(&mut self, buf: &[u8]) -> Result<(), Error> {
        let n = buf.len();
        if self.len() < n {
            return Err(Error::BufferExhausted);
        }

        let (dest, rest) = mem::take(self).split_at_mut(n);
        dest.copy_from_slice(buf);
        *self = rest;
        Ok(())
    }
}

// This allows us to refer to types via the `wyvern` prefix in the
// doc comments below, which is useful for clarity between `std` and
// `wyvern` IO traits.
#[cfg(doc)]
use crate as wyvern;

/// Converts a [`std::io::Write`] into a [`wyvern::io::Write`].
///
/// [`wyvern::io::Write::write_bytes()`] is implemented by simply calling
/// [`std::io::Write::write()`] repeatedly until every byte is written;
/// [`wyvern::io::Write`] should be implemented directly if possible.
///
/// This type is provided instead of implementing [`wyvern::io::Write`]
/// directly for every [`std::io::Write`] due to trait coherence issues
/// involving the blanket impl on `&mut _`.
#[cfg(feature = "std")]
pub struct StdWrite<W>(pub W);

#[cfg(feature = "std")]
impl<W: std::io::Write> Write for StdWrite<W> {
    fn write_bytes(&mut self, mut buf: &[u8]) -> Result<(), Error> {
        while !buf.is_empty() {
            let n = self.0.write(buf).map_err(|_| Error::Internal)?;
            if n == 0 {
                return Err(Error::BufferExhausted);
            }
            buf = &buf[n..];
        }
        Ok(())
    }
}
