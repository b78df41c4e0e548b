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

use super::BufferView;
use crate::error::Error;

/// Privately owned, always writable storage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeapBuffer {
    bytes: Vec<u8>,
}

impl HeapBuffer {
    /// Takes ownership of `bytes`.
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

impl BufferView for HeapBuffer {
    fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn as_bytes_mut(&mut self) -> Result<&mut [u8], Error> {
        Ok(&mut self.bytes)
    }

    fn is_writable(&self) -> bool {
        true
    }

    fn is_direct(&self) -> bool {
        false
    }

    fn resize(&mut self, new_len: usize) -> Result<(), Error> {
        self.bytes.resize(new_len, 0);
        Ok(())
    }
}
