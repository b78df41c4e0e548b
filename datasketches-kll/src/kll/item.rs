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

use std::cmp::Ordering;
use std::fmt;

use byteorder::ByteOrder;
use byteorder::LittleEndian;

use super::serialization::FLAG_DOUBLES;
use super::serialization::FLAG_ITEMS;

/// The family of items a serialized sketch holds, recorded in the preamble flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    /// 32-bit floating point items.
    Floats,
    /// 64-bit floating point items.
    Doubles,
    /// Any other totally ordered item type.
    Items,
}

impl ItemKind {
    pub(super) fn flag_bits(self) -> u8 {
        match self {
            ItemKind::Floats => 0,
            ItemKind::Doubles => FLAG_DOUBLES,
            ItemKind::Items => FLAG_ITEMS,
        }
    }

    pub(super) fn from_flags(flags: u8) -> ItemKind {
        if flags & FLAG_ITEMS != 0 {
            ItemKind::Items
        } else if flags & FLAG_DOUBLES != 0 {
            ItemKind::Doubles
        } else {
            ItemKind::Floats
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKind::Floats => write!(f, "floats"),
            ItemKind::Doubles => write!(f, "doubles"),
            ItemKind::Items => write!(f, "items"),
        }
    }
}

/// Trait implemented by item types supported by [`KllSketch`](super::KllSketch).
///
/// Items are stored in fixed-width little-endian slots, so every implementation has a
/// constant [`SERIALIZED_SIZE`](KllItem::SERIALIZED_SIZE).
///
/// # Examples
///
/// ```
/// # use std::cmp::Ordering;
/// # use datasketches_kll::kll::{ItemKind, KllItem, KllSketch};
/// #[derive(Debug, Clone, Copy, PartialEq)]
/// struct Millis(u32);
///
/// impl KllItem for Millis {
///     const KIND: ItemKind = ItemKind::Items;
///     const SERIALIZED_SIZE: usize = 4;
///
///     fn cmp(a: &Self, b: &Self) -> Ordering {
///         a.0.cmp(&b.0)
///     }
///
///     fn empty_sentinel() -> Self {
///         Millis(0)
///     }
///
///     fn read_le(bytes: &[u8]) -> Self {
///         Millis(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
///     }
///
///     fn write_le(value: &Self, bytes: &mut [u8]) {
///         bytes[..4].copy_from_slice(&value.0.to_le_bytes());
///     }
/// }
///
/// let mut sketch = KllSketch::<Millis>::new(20);
/// for i in 1..=100 {
///     sketch.update(Millis(i)).unwrap();
/// }
/// assert_eq!(sketch.quantile(1.0).unwrap(), Millis(100));
/// ```
pub trait KllItem: Copy + PartialEq + fmt::Debug {
    /// The kind recorded in the preamble flags.
    const KIND: ItemKind;

    /// Size of one serialized item in bytes.
    const SERIALIZED_SIZE: usize;

    /// Compare two items.
    fn cmp(a: &Self, b: &Self) -> Ordering;

    /// Returns true if the item is NaN. Such items are never inserted.
    fn is_nan(_value: &Self) -> bool {
        false
    }

    /// Value stored in the min and max slots of an empty updatable image.
    fn empty_sentinel() -> Self;

    /// Reads one item from the first [`SERIALIZED_SIZE`](KllItem::SERIALIZED_SIZE) bytes.
    fn read_le(bytes: &[u8]) -> Self;

    /// Writes one item into the first [`SERIALIZED_SIZE`](KllItem::SERIALIZED_SIZE) bytes.
    fn write_le(value: &Self, bytes: &mut [u8]);
}

impl KllItem for f32 {
    const KIND: ItemKind = ItemKind::Floats;
    const SERIALIZED_SIZE: usize = 4;

    fn cmp(a: &Self, b: &Self) -> Ordering {
        a.partial_cmp(b).unwrap_or(Ordering::Greater)
    }

    fn is_nan(value: &Self) -> bool {
        value.is_nan()
    }

    fn empty_sentinel() -> Self {
        f32::NAN
    }

    fn read_le(bytes: &[u8]) -> Self {
        LittleEndian::read_f32(bytes)
    }

    fn write_le(value: &Self, bytes: &mut [u8]) {
        LittleEndian::write_f32(bytes, *value);
    }
}

impl KllItem for f64 {
    const KIND: ItemKind = ItemKind::Doubles;
    const SERIALIZED_SIZE: usize = 8;

    fn cmp(a: &Self, b: &Self) -> Ordering {
        a.partial_cmp(b).unwrap_or(Ordering::Greater)
    }

    fn is_nan(value: &Self) -> bool {
        value.is_nan()
    }

    fn empty_sentinel() -> Self {
        f64::NAN
    }

    fn read_le(bytes: &[u8]) -> Self {
        LittleEndian::read_f64(bytes)
    }

    fn write_le(value: &Self, bytes: &mut [u8]) {
        LittleEndian::write_f64(bytes, *value);
    }
}

impl KllItem for i64 {
    const KIND: ItemKind = ItemKind::Items;
    const SERIALIZED_SIZE: usize = 8;

    fn cmp(a: &Self, b: &Self) -> Ordering {
        a.cmp(b)
    }

    fn empty_sentinel() -> Self {
        0
    }

    fn read_le(bytes: &[u8]) -> Self {
        LittleEndian::read_i64(bytes)
    }

    fn write_le(value: &Self, bytes: &mut [u8]) {
        LittleEndian::write_i64(bytes, *value);
    }
}
