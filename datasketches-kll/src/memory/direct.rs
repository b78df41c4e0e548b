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

use std::fmt;

use super::BufferView;
use super::MemoryRequestServer;
use crate::error::Error;

enum Region<'a> {
    ReadOnly(&'a [u8]),
    Writable(&'a mut [u8]),
}

/// Caller-owned storage borrowed for `'a`.
///
/// Only the first [`len`](BufferView::len) bytes of the region are in use; the rest is spare
/// room the sketch may grow into without asking for more memory.
pub struct DirectBuffer<'a> {
    region: Region<'a>,
    len: usize,
    server: Option<Box<dyn MemoryRequestServer<'a> + 'a>>,
}

impl<'a> DirectBuffer<'a> {
    /// Creates a read-only view over all of `mem`.
    pub fn read_only(mem: &'a [u8]) -> Self {
        Self {
            len: mem.len(),
            region: Region::ReadOnly(mem),
            server: None,
        }
    }

    /// Creates a writable view over all of `mem`, growing through `server` when the region
    /// is exhausted.
    pub fn writable(
        mem: &'a mut [u8],
        server: Option<Box<dyn MemoryRequestServer<'a> + 'a>>,
    ) -> Self {
        Self {
            len: mem.len(),
            region: Region::Writable(mem),
            server,
        }
    }

    /// Returns the size of the borrowed region, including spare room.
    pub fn capacity(&self) -> usize {
        match &self.region {
            Region::ReadOnly(mem) => mem.len(),
            Region::Writable(mem) => mem.len(),
        }
    }
}

impl BufferView for DirectBuffer<'_> {
    fn as_bytes(&self) -> &[u8] {
        match &self.region {
            Region::ReadOnly(mem) => &mem[..self.len],
            Region::Writable(mem) => &mem[..self.len],
        }
    }

    fn as_bytes_mut(&mut self) -> Result<&mut [u8], Error> {
        match &mut self.region {
            Region::ReadOnly(_) => Err(Error::read_only("write")),
            Region::Writable(mem) => Ok(&mut mem[..self.len]),
        }
    }

    fn is_writable(&self) -> bool {
        matches!(self.region, Region::Writable(_))
    }

    fn is_direct(&self) -> bool {
        true
    }

    fn resize(&mut self, new_len: usize) -> Result<(), Error> {
        let Self { region, len, server } = self;
        let mem = match region {
            Region::ReadOnly(_) => return Err(Error::read_only("resize")),
            Region::Writable(mem) => mem,
        };
        if new_len <= mem.len() {
            *len = new_len;
            return Ok(());
        }

        let available = mem.len();
        let Some(server) = server.as_mut() else {
            return Err(Error::out_of_space(new_len, available));
        };
        match server.request(&mem[..*len], new_len) {
            Some(fresh) if fresh.len() >= new_len => {
                fresh[..*len].copy_from_slice(&mem[..*len]);
                *region = Region::Writable(fresh);
                *len = new_len;
                Ok(())
            }
            _ => Err(Error::out_of_space(new_len, available)),
        }
    }
}

impl fmt::Debug for DirectBuffer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectBuffer")
            .field("writable", &self.is_writable())
            .field("len", &self.len)
            .field("capacity", &self.capacity())
            .field("has_server", &self.server.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_read_only_rejects_writes() {
        let mem = [0u8; 8];
        let mut buffer = DirectBuffer::read_only(&mem);
        assert!(!buffer.is_writable());
        assert_eq!(buffer.put_u8(0, 1).unwrap_err().kind(), ErrorKind::ReadOnly);
        assert_eq!(buffer.resize(4).unwrap_err().kind(), ErrorKind::ReadOnly);
    }

    #[test]
    fn test_grow_within_region() {
        let mut mem = [0u8; 16];
        let mut buffer = DirectBuffer::writable(&mut mem, None);
        buffer.resize(4).unwrap();
        assert_eq!(buffer.len(), 4);
        buffer.resize(16).unwrap();
        assert_eq!(buffer.len(), 16);
    }

    #[test]
    fn test_grow_without_server_fails_unchanged() {
        let mut mem = [7u8; 8];
        let mut buffer = DirectBuffer::writable(&mut mem, None);
        let err = buffer.resize(9).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfSpace);
        assert_eq!(buffer.as_bytes(), &[7u8; 8]);
    }

    #[test]
    fn test_grow_through_server() {
        let mut mem = [1u8, 2, 3, 4];
        let mut spare = [0u8; 32];
        {
            let mut offered = Some(&mut spare[..]);
            let server = move |_current: &[u8], _required: usize| offered.take();
            let mut buffer = DirectBuffer::writable(&mut mem, Some(Box::new(server)));
            buffer.resize(10).unwrap();
            assert_eq!(buffer.len(), 10);
            assert_eq!(buffer.capacity(), 32);
            assert_eq!(&buffer.as_bytes()[..4], &[1, 2, 3, 4]);
            buffer.put_u8(9, 9).unwrap();

            // the server has nothing left to offer
            let err = buffer.resize(64).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::OutOfSpace);
            assert_eq!(buffer.len(), 10);
        }
        assert_eq!(mem, [1, 2, 3, 4]);
        assert_eq!(spare[9], 9);
    }

    #[test]
    fn test_short_offer_is_declined() {
        let mut mem = [0u8; 4];
        let mut small = [0u8; 6];
        let mut offered = Some(&mut small[..]);
        let server = move |_current: &[u8], _required: usize| offered.take();
        let mut buffer = DirectBuffer::writable(&mut mem, Some(Box::new(server)));
        let err = buffer.resize(8).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfSpace);
        assert_eq!(buffer.len(), 4);
    }
}
