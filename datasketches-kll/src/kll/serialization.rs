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

//! Binary layout of KLL sketch images.
//!
//! Every image starts with an 8 byte preamble:
//!
//! ```text
//! byte 0     preamble ints (2 for compact empty and single-item images, 5 otherwise)
//! byte 1     serial version (2 for compact single-item images, 1 otherwise)
//! byte 2     family id (15)
//! byte 3     flags
//! bytes 4-5  k
//! byte 6     m
//! byte 7     unused
//! ```
//!
//! Full compact and updatable images continue with n (8 bytes), min k (2 bytes), the number
//! of levels (1 byte) and an unused byte, then the levels array, the min and max items and
//! the items. A compact image omits the final level offset and stores only retained items;
//! an updatable image stores every offset and the whole items array, slack included.

use super::DEFAULT_M;
use super::MAX_K;
use super::MIN_K;
use super::helper::compute_total_capacity;
use super::helper::sum_the_sample_weights;
use super::item::ItemKind;
use super::item::KllItem;
use super::layout::Layout;
use super::layout::SketchImage;
use crate::codec::Family;
use crate::codec::SketchBytes;
use crate::codec::SketchSlice;
use crate::error::Error;

/// Serialization version for empty, full and updatable images.
pub(super) const SERIAL_VERSION_1: u8 = 1;
/// Serialization version for compact single-item images.
pub(super) const SERIAL_VERSION_2: u8 = 2;

/// Preamble ints for compact empty and single-item images.
pub(super) const PREAMBLE_INTS_SHORT: u8 = 2;
/// Preamble ints for full compact and updatable images.
pub(super) const PREAMBLE_INTS_FULL: u8 = 5;

pub(super) const FLAG_EMPTY: u8 = 1 << 0;
pub(super) const FLAG_LEVEL_ZERO_SORTED: u8 = 1 << 1;
pub(super) const FLAG_SINGLE_ITEM: u8 = 1 << 2;
pub(super) const FLAG_DOUBLES: u8 = 1 << 3;
pub(super) const FLAG_UPDATABLE: u8 = 1 << 4;
pub(super) const FLAG_ITEMS: u8 = 1 << 5;

pub(super) const FLAGS_BYTE: usize = 3;
pub(super) const K_SHORT: usize = 4;
pub(super) const N_LONG: usize = 8;
pub(super) const MIN_K_SHORT: usize = 16;
pub(super) const NUM_LEVELS_BYTE: usize = 18;

/// Serialized size of an empty compact image in bytes.
pub(super) const EMPTY_SIZE_BYTES: usize = 8;
/// Data offset for compact single-item images.
pub(super) const DATA_START_SINGLE_ITEM: usize = 8;
/// Data offset for full compact and updatable images.
pub(super) const DATA_START: usize = 20;

// Deepest level the capacity function supports.
const MAX_NUM_LEVELS: usize = 61;

pub(super) fn compact_size_bytes<T: KllItem>(n: u64, num_levels: usize, num_retained: usize) -> usize {
    match n {
        0 => EMPTY_SIZE_BYTES,
        1 => DATA_START_SINGLE_ITEM + T::SERIALIZED_SIZE,
        _ => DATA_START + num_levels * 4 + (num_retained + 2) * T::SERIALIZED_SIZE,
    }
}

pub(super) fn updatable_size_bytes<T: KllItem>(num_levels: usize, capacity: usize) -> usize {
    DATA_START + (num_levels + 1) * 4 + (capacity + 2) * T::SERIALIZED_SIZE
}

fn write_preamble(
    bytes: &mut SketchBytes,
    preamble_ints: u8,
    serial_version: u8,
    flags: u8,
    k: u16,
) {
    bytes.write_u8(preamble_ints);
    bytes.write_u8(serial_version);
    bytes.write_u8(Family::KLL.id);
    bytes.write_u8(flags);
    bytes.write_u16_le(k);
    bytes.write_u8(DEFAULT_M);
    bytes.write_u8(0);
}

fn write_item<T: KllItem>(bytes: &mut SketchBytes, item: &T) {
    T::write_le(item, bytes.reserve_slice(T::SERIALIZED_SIZE));
}

/// Encodes the compact form: retained items only.
pub(super) fn encode_compact<T: KllItem>(image: &SketchImage<T>) -> Vec<u8> {
    let num_levels = image.num_levels();
    let size = compact_size_bytes::<T>(image.n, num_levels, image.num_retained());
    let mut bytes = SketchBytes::with_capacity(size);

    let is_empty = image.n == 0;
    let is_single_item = image.n == 1;

    let mut flags = T::KIND.flag_bits();
    if is_empty {
        flags |= FLAG_EMPTY;
    }
    if image.level_zero_sorted {
        flags |= FLAG_LEVEL_ZERO_SORTED;
    }
    if is_single_item {
        flags |= FLAG_SINGLE_ITEM;
    }

    if is_empty {
        write_preamble(&mut bytes, PREAMBLE_INTS_SHORT, SERIAL_VERSION_1, flags, image.k);
        return bytes.into_bytes();
    }
    if is_single_item {
        write_preamble(&mut bytes, PREAMBLE_INTS_SHORT, SERIAL_VERSION_2, flags, image.k);
        for item in image.retained() {
            write_item(&mut bytes, item);
        }
        return bytes.into_bytes();
    }

    write_preamble(&mut bytes, PREAMBLE_INTS_FULL, SERIAL_VERSION_1, flags, image.k);
    bytes.write_u64_le(image.n);
    bytes.write_u16_le(image.min_k);
    bytes.write_u8(num_levels as u8);
    bytes.write_u8(0);
    for offset in &image.levels[..num_levels] {
        bytes.write_u32_le(*offset);
    }
    write_item(&mut bytes, &image.min_item.unwrap_or_else(T::empty_sentinel));
    write_item(&mut bytes, &image.max_item.unwrap_or_else(T::empty_sentinel));
    for item in image.retained() {
        write_item(&mut bytes, item);
    }
    bytes.into_bytes()
}

/// Encodes the updatable form: every level offset and the whole items array.
pub(super) fn encode_updatable<T: KllItem>(image: &SketchImage<T>) -> Vec<u8> {
    let num_levels = image.num_levels();
    let size = updatable_size_bytes::<T>(num_levels, image.items.len());
    let mut bytes = SketchBytes::with_capacity(size);

    let mut flags = T::KIND.flag_bits() | FLAG_UPDATABLE;
    if image.n == 0 {
        flags |= FLAG_EMPTY;
    }
    if image.level_zero_sorted {
        flags |= FLAG_LEVEL_ZERO_SORTED;
    }

    write_preamble(&mut bytes, PREAMBLE_INTS_FULL, SERIAL_VERSION_1, flags, image.k);
    bytes.write_u64_le(image.n);
    bytes.write_u16_le(image.min_k);
    bytes.write_u8(num_levels as u8);
    bytes.write_u8(0);
    for offset in &image.levels {
        bytes.write_u32_le(*offset);
    }
    write_item(&mut bytes, &image.min_item.unwrap_or_else(T::empty_sentinel));
    write_item(&mut bytes, &image.max_item.unwrap_or_else(T::empty_sentinel));
    for item in &image.items {
        write_item(&mut bytes, item);
    }
    bytes.into_bytes()
}

/// Validates a serialized image and returns its layout and length in bytes.
///
/// Nothing past the returned length is part of the image.
pub(super) fn check_image<T: KllItem>(bytes: &[u8]) -> Result<(Layout, usize), Error> {
    fn make_error(tag: &'static str) -> impl FnOnce(std::io::Error) -> Error {
        move |err| Error::insufficient_data(tag).set_source(err)
    }

    let mut cursor = SketchSlice::new(bytes);

    let preamble_ints = cursor.read_u8().map_err(make_error("preamble_ints"))?;
    let serial_version = cursor.read_u8().map_err(make_error("serial_version"))?;
    let family_id = cursor.read_u8().map_err(make_error("family_id"))?;
    let flags = cursor.read_u8().map_err(make_error("flags"))?;
    let k = cursor.read_u16_le().map_err(make_error("k"))?;
    let m = cursor.read_u8().map_err(make_error("m"))?;
    let _unused = cursor.read_u8().map_err(make_error("unused"))?;

    Family::KLL.validate_id(family_id)?;
    if serial_version != SERIAL_VERSION_1 && serial_version != SERIAL_VERSION_2 {
        return Err(Error::unsupported_serial_version(serial_version));
    }
    Family::KLL.validate_pre_ints(preamble_ints)?;
    if m != DEFAULT_M {
        return Err(Error::deserial(format!(
            "invalid m: expected {DEFAULT_M}, got {m}"
        )));
    }
    if !(MIN_K..=MAX_K).contains(&k) {
        return Err(Error::deserial(format!("k out of range: {k}")));
    }
    let kind = ItemKind::from_flags(flags);
    if kind != T::KIND {
        return Err(Error::type_mismatch(T::KIND, kind));
    }

    let is_empty = (flags & FLAG_EMPTY) != 0;
    let is_single_item = (flags & FLAG_SINGLE_ITEM) != 0;
    let is_updatable = (flags & FLAG_UPDATABLE) != 0;
    let layout = if is_updatable {
        Layout::Updatable
    } else if is_empty {
        Layout::CompactEmpty
    } else if is_single_item && serial_version == SERIAL_VERSION_2 {
        Layout::CompactSingle
    } else {
        // includes legacy single-item images written in the full format
        Layout::CompactFull
    };

    let (expected_pre_ints, expected_serial_version) = match layout {
        Layout::CompactEmpty => (PREAMBLE_INTS_SHORT, SERIAL_VERSION_1),
        Layout::CompactSingle => (PREAMBLE_INTS_SHORT, SERIAL_VERSION_2),
        Layout::CompactFull | Layout::Updatable => (PREAMBLE_INTS_FULL, SERIAL_VERSION_1),
    };
    if preamble_ints != expected_pre_ints {
        return Err(Error::invalid_preamble_ints(expected_pre_ints, preamble_ints));
    }
    if serial_version != expected_serial_version {
        return Err(Error::deserial(format!(
            "serial version {serial_version} does not match the image form, expected {expected_serial_version}"
        )));
    }

    match layout {
        Layout::CompactEmpty => return Ok((layout, EMPTY_SIZE_BYTES)),
        Layout::CompactSingle => {
            let len = DATA_START_SINGLE_ITEM + T::SERIALIZED_SIZE;
            if bytes.len() < len {
                return Err(Error::insufficient_data("single_item"));
            }
            return Ok((layout, len));
        }
        Layout::CompactFull | Layout::Updatable => {}
    }

    let n = cursor.read_u64_le().map_err(make_error("n"))?;
    let min_k = cursor.read_u16_le().map_err(make_error("min_k"))?;
    let num_levels = cursor.read_u8().map_err(make_error("num_levels"))? as usize;
    let _unused = cursor.read_u8().map_err(make_error("unused2"))?;

    if num_levels == 0 || num_levels > MAX_NUM_LEVELS {
        return Err(Error::deserial(format!(
            "num_levels must be in [1, {MAX_NUM_LEVELS}], got {num_levels}"
        )));
    }
    if min_k < MIN_K || min_k > k {
        return Err(Error::deserial(format!(
            "min_k must be in [{MIN_K}, {k}], got {min_k}"
        )));
    }

    let stored_levels = if is_updatable {
        num_levels + 1
    } else {
        num_levels
    };
    let mut levels = Vec::with_capacity(num_levels + 1);
    for _ in 0..stored_levels {
        let offset = cursor.read_u32_le().map_err(make_error("levels"))?;
        levels.push(offset);
    }
    let capacity = compute_total_capacity(k, DEFAULT_M, num_levels);
    if !is_updatable {
        levels.push(capacity);
    }

    if levels[num_levels] != capacity {
        return Err(Error::deserial(format!(
            "levels last offset must equal capacity {capacity}, got {}",
            levels[num_levels]
        )));
    }
    if levels.windows(2).any(|window| window[1] < window[0]) {
        return Err(Error::deserial("levels array must be non-decreasing"));
    }
    let total_weight =
        sum_the_sample_weights(levels.windows(2).map(|window| (window[1] - window[0]) as usize))
            .ok_or_else(|| Error::deserial("retained weight overflows"))?;
    if total_weight != n {
        return Err(Error::deserial(format!(
            "retained weight {total_weight} does not match n {n}"
        )));
    }

    let num_items = if is_updatable {
        capacity as usize
    } else {
        (capacity - levels[0]) as usize
    };
    let len = cursor.position() + (num_items + 2) * T::SERIALIZED_SIZE;
    if bytes.len() < len {
        return Err(Error::insufficient_data("items"));
    }
    Ok((layout, len))
}
