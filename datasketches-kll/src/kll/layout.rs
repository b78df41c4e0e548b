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

use super::DEFAULT_M;
use super::helper::compute_total_capacity;
use super::item::KllItem;
use super::serialization::DATA_START;
use super::serialization::DATA_START_SINGLE_ITEM;
use super::serialization::FLAG_EMPTY;
use super::serialization::FLAG_LEVEL_ZERO_SORTED;
use super::serialization::FLAGS_BYTE;
use super::serialization::K_SHORT;
use super::serialization::MIN_K_SHORT;
use super::serialization::N_LONG;
use super::serialization::NUM_LEVELS_BYTE;
use crate::error::Error;
use crate::memory::BufferView;

/// Form of the image behind a sketch, fixed when the sketch is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Layout {
    CompactEmpty,
    CompactSingle,
    CompactFull,
    Updatable,
}

impl Layout {
    pub fn k<B: BufferView>(self, mem: &B) -> u16 {
        mem.get_u16(K_SHORT)
    }

    pub fn flags<B: BufferView>(self, mem: &B) -> u8 {
        mem.get_u8(FLAGS_BYTE)
    }

    pub fn level_zero_sorted<B: BufferView>(self, mem: &B) -> bool {
        self.flags(mem) & FLAG_LEVEL_ZERO_SORTED != 0
    }

    pub fn n<B: BufferView>(self, mem: &B) -> u64 {
        match self {
            Layout::CompactEmpty => 0,
            Layout::CompactSingle => 1,
            Layout::CompactFull | Layout::Updatable => mem.get_u64(N_LONG),
        }
    }

    pub fn min_k<B: BufferView>(self, mem: &B) -> u16 {
        match self {
            Layout::CompactEmpty | Layout::CompactSingle => self.k(mem),
            Layout::CompactFull | Layout::Updatable => mem.get_u16(MIN_K_SHORT),
        }
    }

    pub fn num_levels<B: BufferView>(self, mem: &B) -> usize {
        match self {
            Layout::CompactEmpty | Layout::CompactSingle => 1,
            Layout::CompactFull | Layout::Updatable => mem.get_u8(NUM_LEVELS_BYTE) as usize,
        }
    }

    pub fn capacity<B: BufferView>(self, mem: &B) -> u32 {
        compute_total_capacity(self.k(mem), DEFAULT_M, self.num_levels(mem))
    }

    pub fn level<B: BufferView>(self, mem: &B, index: usize) -> u32 {
        let num_levels = self.num_levels(mem);
        match self {
            Layout::CompactEmpty => self.capacity(mem),
            Layout::CompactSingle if index == 0 => self.capacity(mem) - 1,
            Layout::CompactSingle => self.capacity(mem),
            Layout::CompactFull if index == num_levels => self.capacity(mem),
            Layout::CompactFull | Layout::Updatable => mem.get_u32(DATA_START + index * 4),
        }
    }

    /// Returns all `num_levels + 1` level offsets.
    pub fn levels<B: BufferView>(self, mem: &B) -> Vec<u32> {
        (0..=self.num_levels(mem))
            .map(|index| self.level(mem, index))
            .collect()
    }

    pub fn num_retained<B: BufferView>(self, mem: &B) -> usize {
        (self.level(mem, self.num_levels(mem)) - self.level(mem, 0)) as usize
    }

    fn min_max_offset(self, num_levels: usize) -> usize {
        match self {
            Layout::CompactEmpty | Layout::CompactSingle => DATA_START_SINGLE_ITEM,
            Layout::CompactFull => DATA_START + num_levels * 4,
            Layout::Updatable => DATA_START + (num_levels + 1) * 4,
        }
    }

    /// Byte offset of the item slot at `index` of the items array.
    fn item_offset<T: KllItem, B: BufferView>(self, mem: &B, index: u32) -> usize {
        let num_levels = self.num_levels(mem);
        let size = T::SERIALIZED_SIZE;
        match self {
            Layout::CompactEmpty | Layout::CompactSingle => DATA_START_SINGLE_ITEM,
            Layout::CompactFull => {
                let first = self.level(mem, 0);
                self.min_max_offset(num_levels) + 2 * size + (index - first) as usize * size
            }
            Layout::Updatable => self.min_max_offset(num_levels) + (2 + index as usize) * size,
        }
    }

    pub fn item<T: KllItem, B: BufferView>(self, mem: &B, index: u32) -> T {
        let offset = self.item_offset::<T, B>(mem, index);
        T::read_le(mem.get_slice(offset, T::SERIALIZED_SIZE))
    }

    pub fn min_item<T: KllItem, B: BufferView>(self, mem: &B) -> Option<T> {
        if self.n(mem) == 0 {
            return None;
        }
        let offset = self.min_max_offset(self.num_levels(mem));
        Some(T::read_le(mem.get_slice(offset, T::SERIALIZED_SIZE)))
    }

    pub fn max_item<T: KllItem, B: BufferView>(self, mem: &B) -> Option<T> {
        if self.n(mem) == 0 {
            return None;
        }
        let offset = match self {
            Layout::CompactSingle => DATA_START_SINGLE_ITEM,
            _ => self.min_max_offset(self.num_levels(mem)) + T::SERIALIZED_SIZE,
        };
        Some(T::read_le(mem.get_slice(offset, T::SERIALIZED_SIZE)))
    }

    /// Returns the retained items of every level, level 0 first.
    pub fn read_levels<T: KllItem, B: BufferView>(self, mem: &B) -> Vec<Vec<T>> {
        let levels = self.levels(mem);
        levels
            .windows(2)
            .map(|bounds| {
                (bounds[0]..bounds[1])
                    .map(|index| self.item::<T, B>(mem, index))
                    .collect()
            })
            .collect()
    }

    pub fn read_image<T: KllItem, B: BufferView>(self, mem: &B) -> SketchImage<T> {
        let k = self.k(mem);
        let min_k = self.min_k(mem);
        let n = self.n(mem);
        let level_zero_sorted = self.level_zero_sorted(mem);
        let min_item = self.min_item(mem);
        let max_item = self.max_item(mem);
        if self != Layout::Updatable {
            let levels = self.read_levels(mem);
            return SketchImage::from_levels(
                k,
                min_k,
                n,
                level_zero_sorted,
                levels,
                min_item,
                max_item,
            );
        }
        let levels = self.levels(mem);
        let items = (0..self.capacity(mem))
            .map(|index| self.item::<T, B>(mem, index))
            .collect();
        SketchImage {
            k,
            min_k,
            n,
            level_zero_sorted,
            levels,
            items,
            min_item,
            max_item,
        }
    }
}

// In-place writes, valid for updatable images only.
impl Layout {
    pub fn put_n<B: BufferView>(self, mem: &mut B, n: u64) -> Result<(), Error> {
        debug_assert_eq!(self, Layout::Updatable);
        mem.put_u64(N_LONG, n)
    }

    pub fn put_level<B: BufferView>(
        self,
        mem: &mut B,
        index: usize,
        offset: u32,
    ) -> Result<(), Error> {
        debug_assert_eq!(self, Layout::Updatable);
        mem.put_u32(DATA_START + index * 4, offset)
    }

    pub fn put_flags<B: BufferView>(
        self,
        mem: &mut B,
        empty: bool,
        level_zero_sorted: bool,
    ) -> Result<(), Error> {
        debug_assert_eq!(self, Layout::Updatable);
        let mut flags = self.flags(mem) & !(FLAG_EMPTY | FLAG_LEVEL_ZERO_SORTED);
        if empty {
            flags |= FLAG_EMPTY;
        }
        if level_zero_sorted {
            flags |= FLAG_LEVEL_ZERO_SORTED;
        }
        mem.put_u8(FLAGS_BYTE, flags)
    }

    pub fn put_min_max<T: KllItem, B: BufferView>(
        self,
        mem: &mut B,
        min: &T,
        max: &T,
    ) -> Result<(), Error> {
        debug_assert_eq!(self, Layout::Updatable);
        let size = T::SERIALIZED_SIZE;
        let offset = self.min_max_offset(self.num_levels(mem));
        T::write_le(min, mem.get_slice_mut(offset, size)?);
        T::write_le(max, mem.get_slice_mut(offset + size, size)?);
        Ok(())
    }

    pub fn put_item<T: KllItem, B: BufferView>(
        self,
        mem: &mut B,
        index: u32,
        item: &T,
    ) -> Result<(), Error> {
        debug_assert_eq!(self, Layout::Updatable);
        let offset = self.item_offset::<T, B>(mem, index);
        T::write_le(item, mem.get_slice_mut(offset, T::SERIALIZED_SIZE)?);
        Ok(())
    }

    /// Moves the item slots `[start, end)` so that they begin at slot `dest`.
    pub fn move_items<T: KllItem, B: BufferView>(
        self,
        mem: &mut B,
        start: u32,
        end: u32,
        dest: u32,
    ) -> Result<(), Error> {
        debug_assert_eq!(self, Layout::Updatable);
        let src_begin = self.item_offset::<T, B>(mem, start);
        let src_end = self.item_offset::<T, B>(mem, end);
        let dest = self.item_offset::<T, B>(mem, dest);
        mem.copy_within(src_begin..src_end, dest)
    }
}

/// A fully decoded sketch, laid out as in the updatable form.
///
/// `levels` has `num_levels + 1` entries and its last entry equals `items.len()`. The slots
/// before `levels[0]` are free space that level 0 grows into.
#[derive(Debug, Clone)]
pub(super) struct SketchImage<T> {
    pub k: u16,
    pub min_k: u16,
    pub n: u64,
    pub level_zero_sorted: bool,
    pub levels: Vec<u32>,
    pub items: Vec<T>,
    pub min_item: Option<T>,
    pub max_item: Option<T>,
}

impl<T: KllItem> SketchImage<T> {
    pub fn empty(k: u16, level_zero_sorted: bool) -> Self {
        Self::from_levels(k, k, 0, level_zero_sorted, vec![Vec::new()], None, None)
    }

    /// Places `levels` at the top of an items array sized for their count.
    pub fn from_levels(
        k: u16,
        min_k: u16,
        n: u64,
        level_zero_sorted: bool,
        levels: Vec<Vec<T>>,
        min_item: Option<T>,
        max_item: Option<T>,
    ) -> Self {
        let capacity = compute_total_capacity(k, DEFAULT_M, levels.len());
        let retained: usize = levels.iter().map(|level| level.len()).sum();
        debug_assert!(retained <= capacity as usize, "retained items exceed capacity");

        let mut offset = capacity - retained as u32;
        let mut offsets = Vec::with_capacity(levels.len() + 1);
        let mut items = vec![T::empty_sentinel(); offset as usize];
        offsets.push(offset);
        for level in levels {
            offset += level.len() as u32;
            offsets.push(offset);
            items.extend(level);
        }

        Self {
            k,
            min_k,
            n,
            level_zero_sorted,
            levels: offsets,
            items,
            min_item,
            max_item,
        }
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len() - 1
    }

    pub fn num_retained(&self) -> usize {
        (self.levels[self.num_levels()] - self.levels[0]) as usize
    }

    pub fn level(&self, index: usize) -> &[T] {
        &self.items[self.levels[index] as usize..self.levels[index + 1] as usize]
    }

    pub fn retained(&self) -> &[T] {
        &self.items[self.levels[0] as usize..]
    }
}
