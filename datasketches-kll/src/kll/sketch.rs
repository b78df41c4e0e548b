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
use std::marker::PhantomData;

use super::DEFAULT_K;
use super::DEFAULT_M;
use super::MAX_K;
use super::MIN_K;
use super::compaction::compress_while_updating;
use super::helper::compute_total_capacity;
use super::helper::normalized_rank_error;
use super::helper::ub_on_num_levels;
use super::item::KllItem;
use super::layout::Layout;
use super::layout::SketchImage;
use super::merge::merge_images;
use super::serialization::check_image;
use super::serialization::compact_size_bytes;
use super::serialization::encode_compact;
use super::serialization::encode_updatable;
use super::serialization::updatable_size_bytes;
use super::sorted_view::SortedView;
use crate::common::random::XorShift64;
use crate::error::Error;
use crate::memory::BufferView;
use crate::memory::DirectBuffer;
use crate::memory::HeapBuffer;
use crate::memory::MemoryRequestServer;

/// KLL sketch for estimating quantiles and ranks.
///
/// The state of the sketch lives in a byte buffer `B` holding an image of the sketch. A
/// sketch built by [`new`](KllSketch::new) or [`heapify`](KllSketch::heapify) owns a
/// [`HeapBuffer`] and is always writable. A [`KllDirectSketch`] works on caller memory; it is
/// writable only when it wraps an updatable image through a writable slice.
///
/// See the [kll module level documentation](crate::kll) for more.
#[derive(Debug, Clone)]
pub struct KllSketch<T: KllItem, B: BufferView = HeapBuffer> {
    mem: B,
    layout: Layout,
    random: XorShift64,
    sorted_level_zero: bool,
    _item: PhantomData<T>,
}

/// A [`KllSketch`] whose image lives in memory borrowed from the caller.
pub type KllDirectSketch<'a, T> = KllSketch<T, DirectBuffer<'a>>;

/// Optional source of larger caller memory for a growing direct sketch.
pub type MemoryServer<'a> = Option<Box<dyn MemoryRequestServer<'a> + 'a>>;

impl<T: KllItem> Default for KllSketch<T> {
    fn default() -> Self {
        Self::new(DEFAULT_K)
    }
}

impl<T: KllItem> KllSketch<T> {
    /// Creates a new sketch with the given value of k.
    ///
    /// # Panics
    ///
    /// Panics if k is not in [MIN_K, MAX_K].
    ///
    /// # Examples
    ///
    /// ```
    /// # use datasketches_kll::kll::KllSketch;
    /// let sketch = KllSketch::<f64>::new(200);
    /// assert_eq!(sketch.k(), 200);
    /// assert!(sketch.is_empty());
    /// ```
    pub fn new(k: u16) -> Self {
        Self::with_options(k, false)
    }

    /// Creates a new sketch that keeps level 0 sorted as items arrive.
    ///
    /// Inserts cost a search in level 0, but compacting level 0 no longer needs a sort.
    ///
    /// # Panics
    ///
    /// Panics if k is not in [MIN_K, MAX_K].
    pub fn with_sorted_level_zero(k: u16) -> Self {
        Self::with_options(k, true)
    }

    fn with_options(k: u16, sorted_level_zero: bool) -> Self {
        check_k(k);
        let image = SketchImage::<T>::empty(k, sorted_level_zero);
        let mem = HeapBuffer::from_vec(encode_updatable(&image));
        Self::from_parts(mem, Layout::Updatable, sorted_level_zero)
    }

    /// Builds a heap sketch from a compact or updatable image, copying its content.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::MalformedDeserializeData`](crate::error::ErrorKind::MalformedDeserializeData)
    /// for corrupt or truncated images and
    /// [`ErrorKind::TypeMismatch`](crate::error::ErrorKind::TypeMismatch) when the image holds
    /// another kind of item.
    ///
    /// # Examples
    ///
    /// ```
    /// # use datasketches_kll::kll::KllSketch;
    /// let mut sketch = KllSketch::<f32>::new(200);
    /// sketch.update(1.5).unwrap();
    /// let copy = KllSketch::<f32>::heapify(&sketch.serialize()).unwrap();
    /// assert_eq!(copy.n(), 1);
    /// assert_eq!(copy.min_item(), Some(1.5));
    /// ```
    pub fn heapify(bytes: &[u8]) -> Result<Self, Error> {
        let (layout, len) = check_image::<T>(bytes)?;
        let bytes = &bytes[..len];
        let mem = match layout {
            Layout::Updatable => HeapBuffer::from_vec(bytes.to_vec()),
            _ => {
                let image = layout.read_image::<T, _>(&DirectBuffer::read_only(bytes));
                HeapBuffer::from_vec(encode_updatable(&image))
            }
        };
        Ok(Self::from_parts(mem, Layout::Updatable, false))
    }

    /// Returns an upper bound on the serialized size of a sketch with parameter k after `n`
    /// updates.
    ///
    /// Use it to size the memory handed to a [`KllDirectSketch`].
    pub fn max_serialized_size_bytes(k: u16, n: u64, updatable: bool) -> usize {
        let num_levels = ub_on_num_levels(n);
        let capacity = compute_total_capacity(k, DEFAULT_M, num_levels) as usize;
        if updatable {
            updatable_size_bytes::<T>(num_levels, capacity)
        } else {
            compact_size_bytes::<T>(n, num_levels, capacity)
        }
    }
}

impl<'a, T: KllItem> KllSketch<T, DirectBuffer<'a>> {
    /// Creates an empty sketch whose updatable image is written to the start of `mem`.
    ///
    /// When the sketch outgrows `mem`, it asks `server` for a larger slice.
    ///
    /// # Panics
    ///
    /// Panics if k is not in [MIN_K, MAX_K].
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::OutOfSpace`](crate::error::ErrorKind::OutOfSpace) if `mem` is
    /// too small for an empty image and `server` cannot supply more.
    ///
    /// # Examples
    ///
    /// ```
    /// # use datasketches_kll::kll::{KllDirectSketch, KllSketch};
    /// let mut mem = vec![0u8; KllSketch::<f64>::max_serialized_size_bytes(20, 100, true)];
    /// let mut sketch = KllDirectSketch::<f64>::new_direct(20, &mut mem, None).unwrap();
    /// for i in 0..100 {
    ///     sketch.update(i as f64).unwrap();
    /// }
    /// assert_eq!(sketch.n(), 100);
    /// ```
    pub fn new_direct(k: u16, mem: &'a mut [u8], server: MemoryServer<'a>) -> Result<Self, Error> {
        check_k(k);
        let bytes = encode_updatable(&SketchImage::<T>::empty(k, false));
        let mut mem = DirectBuffer::writable(mem, server);
        mem.resize(bytes.len())?;
        mem.as_bytes_mut()?.copy_from_slice(&bytes);
        Ok(Self::from_parts(mem, Layout::Updatable, false))
    }

    /// Wraps a compact or updatable image read-only, without copying it.
    pub fn wrap(bytes: &'a [u8]) -> Result<Self, Error> {
        let (layout, len) = check_image::<T>(bytes)?;
        Ok(Self::from_parts(
            DirectBuffer::read_only(&bytes[..len]),
            layout,
            false,
        ))
    }

    /// Wraps an image in place.
    ///
    /// An updatable image becomes a writable sketch that updates `mem` directly; a compact
    /// one is wrapped read-only and `server` is dropped.
    pub fn writable_wrap(mem: &'a mut [u8], server: MemoryServer<'a>) -> Result<Self, Error> {
        let (layout, len) = check_image::<T>(mem)?;
        if layout != Layout::Updatable {
            return Self::wrap(mem);
        }
        let mut buffer = DirectBuffer::writable(mem, server);
        buffer.resize(len)?;
        Ok(Self::from_parts(buffer, layout, false))
    }
}

impl<T: KllItem, B: BufferView> KllSketch<T, B> {
    fn from_parts(mem: B, layout: Layout, sorted_level_zero: bool) -> Self {
        Self {
            mem,
            layout,
            random: XorShift64::default(),
            sorted_level_zero,
            _item: PhantomData,
        }
    }

    /// Returns parameter k used to configure this sketch.
    pub fn k(&self) -> u16 {
        self.layout.k(&self.mem)
    }

    /// Returns the smallest k of this sketch and every sketch merged into it.
    pub fn min_k(&self) -> u16 {
        self.layout.min_k(&self.mem)
    }

    /// Returns total weight of the stream.
    pub fn n(&self) -> u64 {
        self.layout.n(&self.mem)
    }

    /// Returns true if the sketch has not seen any data.
    pub fn is_empty(&self) -> bool {
        self.n() == 0
    }

    /// Returns the number of retained items.
    pub fn num_retained(&self) -> usize {
        self.layout.num_retained(&self.mem)
    }

    /// Returns true once a compaction happened, i.e. answers may be approximate.
    pub fn is_estimation_mode(&self) -> bool {
        self.num_levels() > 1
    }

    pub fn num_levels(&self) -> usize {
        self.layout.num_levels(&self.mem)
    }

    /// Returns the `num_levels + 1` offsets of the levels in the items array.
    ///
    /// The first entry is where the retained items start and the last one is the capacity of
    /// the items array.
    pub fn levels_array(&self) -> Vec<u32> {
        self.layout.levels(&self.mem)
    }

    pub fn is_level_zero_sorted(&self) -> bool {
        self.layout.level_zero_sorted(&self.mem)
    }

    /// Returns the minimum item seen by the sketch.
    pub fn min_item(&self) -> Option<T> {
        self.layout.min_item(&self.mem)
    }

    /// Returns the maximum item seen by the sketch.
    pub fn max_item(&self) -> Option<T> {
        self.layout.max_item(&self.mem)
    }

    /// Returns true if mutating operations fail with
    /// [`ErrorKind::ReadOnly`](crate::error::ErrorKind::ReadOnly).
    pub fn is_read_only(&self) -> bool {
        !self.mem.is_writable() || self.layout != Layout::Updatable
    }

    /// Returns true if the image lives in caller memory.
    pub fn is_direct(&self) -> bool {
        self.mem.is_direct()
    }

    /// Returns every retained item with its weight, level 0 first.
    pub fn retained_items(&self) -> Vec<(T, u64)> {
        self.layout
            .read_levels::<T, B>(&self.mem)
            .into_iter()
            .enumerate()
            .flat_map(|(level, items)| items.into_iter().map(move |item| (item, 1u64 << level)))
            .collect()
    }

    /// Updates the sketch with a new item.
    ///
    /// NaN values are ignored for floating-point types.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::ReadOnly`](crate::error::ErrorKind::ReadOnly) on a read-only
    /// sketch and with [`ErrorKind::OutOfSpace`](crate::error::ErrorKind::OutOfSpace) when a
    /// direct sketch needs more memory than it can get. The sketch is unchanged on failure.
    pub fn update(&mut self, item: T) -> Result<(), Error> {
        self.check_writable("update")?;
        if T::is_nan(&item) {
            return Ok(());
        }
        if self.layout.level(&self.mem, 0) == 0 {
            self.make_room()?;
        }

        let layout = self.layout;
        let n = layout.n(&self.mem);
        let (min, max) = match (
            layout.min_item::<T, B>(&self.mem),
            layout.max_item::<T, B>(&self.mem),
        ) {
            (Some(min), Some(max)) => (
                if T::cmp(&item, &min) == Ordering::Less {
                    item
                } else {
                    min
                },
                if T::cmp(&max, &item) == Ordering::Less {
                    item
                } else {
                    max
                },
            ),
            _ => (item, item),
        };

        let level_zero_sorted = self.sorted_level_zero && layout.level_zero_sorted(&self.mem);
        let start = layout.level(&self.mem, 0) - 1;
        let slot = if level_zero_sorted {
            let pos = self.level_zero_insert_point(&item);
            layout.move_items::<T, B>(&mut self.mem, start + 1, pos, start)?;
            pos - 1
        } else {
            start
        };

        layout.put_item(&mut self.mem, slot, &item)?;
        layout.put_level(&mut self.mem, 0, start)?;
        layout.put_n(&mut self.mem, n + 1)?;
        layout.put_min_max(&mut self.mem, &min, &max)?;
        layout.put_flags(&mut self.mem, false, level_zero_sorted)
    }

    /// Merges another sketch into this one.
    ///
    /// The other sketch may have a different k and be of any storage; it is left untouched.
    /// `min_k` drops to the other's `min_k` when that is smaller.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::ReadOnly`](crate::error::ErrorKind::ReadOnly) on a read-only
    /// sketch and with [`ErrorKind::OutOfSpace`](crate::error::ErrorKind::OutOfSpace) when a
    /// direct sketch needs more memory than it can get. The sketch is unchanged on failure.
    ///
    /// # Examples
    ///
    /// ```
    /// # use datasketches_kll::kll::KllSketch;
    /// let mut a = KllSketch::<f64>::new(20);
    /// let mut b = KllSketch::<f64>::new(20);
    /// for i in 1..=21 {
    ///     a.update(i as f64).unwrap();
    ///     b.update((i + 100) as f64).unwrap();
    /// }
    /// a.merge(&b).unwrap();
    /// assert_eq!(a.n(), 42);
    /// assert_eq!(a.min_item(), Some(1.0));
    /// assert_eq!(a.max_item(), Some(121.0));
    /// ```
    pub fn merge<B2: BufferView>(&mut self, other: &KllSketch<T, B2>) -> Result<(), Error> {
        self.check_writable("merge")?;
        if other.is_empty() {
            return Ok(());
        }
        let merged = merge_images(&self.image(), &other.image(), DEFAULT_M, &mut self.random);
        self.write_image(&merged)
    }

    /// Returns the sketch to its empty state. k is kept; min k is reset to k.
    pub fn reset(&mut self) -> Result<(), Error> {
        self.check_writable("reset")?;
        let image = SketchImage::empty(self.k(), self.sorted_level_zero);
        self.write_image(&image)
    }

    /// Returns the normalized rank of the given item.
    pub fn rank(&self, item: &T, inclusive: bool) -> Option<f64> {
        if self.is_empty() {
            return None;
        }
        Some(self.sorted_view().rank(item, inclusive))
    }

    /// Returns the item at the given normalized rank, using the inclusive criterion.
    ///
    /// Ranks 0 and 1 return the exact minimum and maximum items.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::InvalidArgument`](crate::error::ErrorKind::InvalidArgument) if
    /// the sketch is empty or rank is not in [0.0, 1.0].
    pub fn quantile(&self, rank: f64) -> Result<T, Error> {
        if self.is_empty() {
            return Err(Error::invalid_argument("quantile of an empty sketch"));
        }
        check_rank(rank)?;
        Ok(self.quantile_in(&self.sorted_view(), rank))
    }

    /// Returns the items at the given normalized ranks, or `None` if the sketch is empty.
    pub fn quantiles(&self, ranks: &[f64]) -> Result<Option<Vec<T>>, Error> {
        if self.is_empty() {
            return Ok(None);
        }
        for &rank in ranks {
            check_rank(rank)?;
        }
        let view = self.sorted_view();
        Ok(Some(
            ranks
                .iter()
                .map(|&rank| self.quantile_in(&view, rank))
                .collect(),
        ))
    }

    /// Returns the items at `num` evenly spaced ranks from 0 to 1.
    pub fn quantiles_evenly_spaced(&self, num: usize) -> Result<Option<Vec<T>>, Error> {
        if num < 2 {
            return Err(Error::invalid_argument(format!(
                "the number of evenly spaced ranks must be at least 2, got {num}"
            )));
        }
        let step = (num - 1) as f64;
        let ranks: Vec<f64> = (0..num).map(|i| i as f64 / step).collect();
        self.quantiles(&ranks)
    }

    /// Returns the quantile at `rank` plus the normalized rank error, capped at 1.
    pub fn quantile_upper_bound(&self, rank: f64) -> Result<T, Error> {
        check_rank(rank)?;
        let eps = self.normalized_rank_error(false);
        self.quantile((rank + eps).min(1.0))
    }

    /// Returns the quantile at `rank` minus the normalized rank error, floored at 0.
    pub fn quantile_lower_bound(&self, rank: f64) -> Result<T, Error> {
        check_rank(rank)?;
        let eps = self.normalized_rank_error(false);
        self.quantile((rank - eps).max(0.0))
    }

    /// Returns the approximate CDF for the given split points.
    ///
    /// # Panics
    ///
    /// Panics if the split points contain NaN or are not strictly increasing.
    pub fn cdf(&self, split_points: &[T], inclusive: bool) -> Option<Vec<f64>> {
        if self.is_empty() {
            return None;
        }
        Some(self.sorted_view().cdf(split_points, inclusive))
    }

    /// Returns the approximate PMF for the given split points.
    ///
    /// # Panics
    ///
    /// Panics if the split points contain NaN or are not strictly increasing.
    pub fn pmf(&self, split_points: &[T], inclusive: bool) -> Option<Vec<f64>> {
        if self.is_empty() {
            return None;
        }
        Some(self.sorted_view().pmf(split_points, inclusive))
    }

    /// Returns normalized rank error for the min k of this sketch.
    pub fn normalized_rank_error(&self, pmf: bool) -> f64 {
        normalized_rank_error(self.min_k(), pmf)
    }

    /// Returns the size of [`serialize`](Self::serialize) or
    /// [`serialize_updatable`](Self::serialize_updatable) output.
    pub fn serialized_size_bytes(&self, updatable: bool) -> usize {
        let num_levels = self.num_levels();
        if updatable {
            let capacity = self.layout.capacity(&self.mem) as usize;
            updatable_size_bytes::<T>(num_levels, capacity)
        } else {
            compact_size_bytes::<T>(self.n(), num_levels, self.num_retained())
        }
    }

    /// Serializes the sketch to the compact form.
    pub fn serialize(&self) -> Vec<u8> {
        encode_compact(&self.image())
    }

    /// Serializes the sketch to the updatable form.
    ///
    /// An updatable image is returned byte for byte, free slots included.
    pub fn serialize_updatable(&self) -> Vec<u8> {
        match self.layout {
            Layout::Updatable => self.mem.as_bytes().to_vec(),
            _ => encode_updatable(&self.image()),
        }
    }

    fn check_writable(&self, operation: &'static str) -> Result<(), Error> {
        if self.is_read_only() {
            return Err(Error::read_only(operation));
        }
        Ok(())
    }

    fn image(&self) -> SketchImage<T> {
        self.layout.read_image(&self.mem)
    }

    fn sorted_view(&self) -> SortedView<T> {
        SortedView::new(&self.layout.read_levels(&self.mem))
    }

    fn quantile_in(&self, view: &SortedView<T>, rank: f64) -> T {
        let exact = if rank == 0.0 {
            self.min_item()
        } else if rank == 1.0 {
            self.max_item()
        } else {
            None
        };
        exact.unwrap_or_else(|| view.quantile(rank, true))
    }

    /// Compacts a full items array so that level 0 has a free slot.
    fn make_room(&mut self) -> Result<(), Error> {
        let mut image = self.image();
        let level = compress_while_updating(&mut image, DEFAULT_M, &mut self.random);
        if level == 0 {
            image.level_zero_sorted = self.sorted_level_zero;
        }
        self.write_image(&image)
    }

    /// Replaces the whole image. Growing the buffer is the only step that can fail.
    fn write_image(&mut self, image: &SketchImage<T>) -> Result<(), Error> {
        let bytes = encode_updatable(image);
        self.mem.resize(bytes.len())?;
        self.mem.as_bytes_mut()?.copy_from_slice(&bytes);
        Ok(())
    }

    /// Returns the first slot of level 0 holding an item not less than `item`.
    fn level_zero_insert_point(&self, item: &T) -> u32 {
        let mut lo = self.layout.level(&self.mem, 0);
        let mut hi = self.layout.level(&self.mem, 1);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let probe = self.layout.item::<T, B>(&self.mem, mid);
            if T::cmp(&probe, item) == Ordering::Less {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }
}

fn check_k(k: u16) {
    assert!(
        (MIN_K..=MAX_K).contains(&k),
        "k must be in [{MIN_K}, {MAX_K}], got {k}"
    );
}

fn check_rank(rank: f64) -> Result<(), Error> {
    if (0.0..=1.0).contains(&rank) {
        Ok(())
    } else {
        Err(Error::invalid_argument(format!(
            "rank must be in [0.0, 1.0], got {rank}"
        )))
    }
}
