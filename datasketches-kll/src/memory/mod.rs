// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Byte-level storage behind a sketch.
//!
//! Every sketch reads and writes its state through a [`BufferView`]. There are two
//! implementations, chosen when the sketch is constructed:
//!
//! * [`HeapBuffer`] owns a `Vec<u8>` and grows by reallocating.
//! * [`DirectBuffer`] borrows caller memory for `'a`. It is read-only when built from a
//!   shared slice. A writable one can only grow by asking its [`MemoryRequestServer`] for a
//!   larger caller-owned slice; without a server, or when the server declines, growth fails
//!   with [`ErrorKind::OutOfSpace`](crate::error::ErrorKind::OutOfSpace).
//!
//! A view never frees memory it does not own: when a direct buffer moves to a larger slice
//! the previous one is simply released back to its owner, unchanged.

use std::ops::Range;

use byteorder::ByteOrder;
use byteorder::LittleEndian;

use crate::error::Error;

mod direct;
mod heap;

pub use self::direct::DirectBuffer;
pub use self::heap::HeapBuffer;

/// Capability used by a [`DirectBuffer`] to obtain more caller-owned memory.
///
/// `current` is the live content of the buffer; `required` is the minimum length of the
/// replacement. Returning `None`, or a slice shorter than `required`, declines the request.
///
/// Any `FnMut(&[u8], usize) -> Option<&'a mut [u8]>` closure is a server.
pub trait MemoryRequestServer<'a> {
    /// Returns a replacement buffer of at least `required` bytes, or `None` to decline.
    fn request(&mut self, current: &[u8], required: usize) -> Option<&'a mut [u8]>;
}

impl<'a, F> MemoryRequestServer<'a> for F
where
    F: FnMut(&[u8], usize) -> Option<&'a mut [u8]>,
{
    fn request(&mut self, current: &[u8], required: usize) -> Option<&'a mut [u8]> {
        self(current, required)
    }
}

/// Uniform little-endian access to the bytes backing a sketch.
///
/// Offsets are absolute positions within [`as_bytes`](BufferView::as_bytes). Reads past the
/// end panic; callers validate the layout before reading.
pub trait BufferView {
    /// Returns the bytes currently in use.
    fn as_bytes(&self) -> &[u8];

    /// Returns the bytes currently in use for writing.
    ///
    /// Fails with [`ErrorKind::ReadOnly`](crate::error::ErrorKind::ReadOnly) for read-only
    /// views.
    fn as_bytes_mut(&mut self) -> Result<&mut [u8], Error>;

    /// Returns true if the bytes may be written.
    fn is_writable(&self) -> bool;

    /// Returns true if the bytes are owned by the caller.
    fn is_direct(&self) -> bool;

    /// Changes the number of bytes in use.
    ///
    /// Growing keeps the existing content; the bytes beyond the old length are unspecified.
    /// On failure the view is left untouched.
    fn resize(&mut self, new_len: usize) -> Result<(), Error>;

    /// Returns the number of bytes in use.
    fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Returns true if no bytes are in use.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get_u8(&self, offset: usize) -> u8 {
        self.as_bytes()[offset]
    }

    fn get_u16(&self, offset: usize) -> u16 {
        LittleEndian::read_u16(&self.as_bytes()[offset..])
    }

    fn get_u32(&self, offset: usize) -> u32 {
        LittleEndian::read_u32(&self.as_bytes()[offset..])
    }

    fn get_u64(&self, offset: usize) -> u64 {
        LittleEndian::read_u64(&self.as_bytes()[offset..])
    }

    fn get_slice(&self, offset: usize, len: usize) -> &[u8] {
        &self.as_bytes()[offset..offset + len]
    }

    fn put_u8(&mut self, offset: usize, value: u8) -> Result<(), Error> {
        self.as_bytes_mut()?[offset] = value;
        Ok(())
    }

    fn put_u16(&mut self, offset: usize, value: u16) -> Result<(), Error> {
        LittleEndian::write_u16(&mut self.as_bytes_mut()?[offset..], value);
        Ok(())
    }

    fn put_u32(&mut self, offset: usize, value: u32) -> Result<(), Error> {
        LittleEndian::write_u32(&mut self.as_bytes_mut()?[offset..], value);
        Ok(())
    }

    fn put_u64(&mut self, offset: usize, value: u64) -> Result<(), Error> {
        LittleEndian::write_u64(&mut self.as_bytes_mut()?[offset..], value);
        Ok(())
    }

    fn get_slice_mut(&mut self, offset: usize, len: usize) -> Result<&mut [u8], Error> {
        Ok(&mut self.as_bytes_mut()?[offset..offset + len])
    }

    /// Copies `src` to `dest` within the buffer; the regions may overlap.
    fn copy_within(&mut self, src: Range<usize>, dest: usize) -> Result<(), Error> {
        self.as_bytes_mut()?.copy_within(src, dest);
        Ok(())
    }
}
