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

//! Level compaction.
//!
//! A compaction halves one level: after setting aside an odd item, it sorts the level (level
//! zero only), keeps every other item starting at a random parity and merges the survivors
//! into the level above, where each of them weighs twice as much.

use std::cmp::Ordering;

use super::helper::compute_total_capacity;
use super::helper::level_capacity;
use super::item::KllItem;
use super::layout::SketchImage;
use crate::common::random::RandomSource;

/// Compacts the lowest full level of an image whose items array is completely full, adding a
/// level on top when that is the one to compact.
///
/// The freed slots end up below level 0. Returns the index of the compacted level.
pub(super) fn compress_while_updating<T: KllItem>(
    image: &mut SketchImage<T>,
    m: u8,
    random: &mut impl RandomSource,
) -> usize {
    let level = find_level_to_compact(image.k, m, &image.levels);
    if level + 1 == image.num_levels() {
        add_empty_top_level(image, m);
    }

    let raw_beg = image.levels[level] as usize;
    let raw_end = image.levels[level + 1] as usize;
    let above_end = image.levels[level + 2] as usize;

    let current = image.items[raw_beg..raw_end].to_vec();
    let above = image.items[raw_end..above_end].to_vec();
    let sort = level == 0 && !image.level_zero_sorted;
    let (leftover, promoted) = compact_into(current, above, sort, random);

    let half = (raw_end - raw_beg) / 2;
    let above_beg = raw_end - half;
    image.items[above_beg..above_end].copy_from_slice(&promoted);
    image.levels[level + 1] = above_beg as u32;
    match leftover {
        Some(item) => {
            image.items[above_beg - 1] = item;
            image.levels[level] = (above_beg - 1) as u32;
        }
        None => image.levels[level] = above_beg as u32,
    }
    debug_assert_eq!(image.levels[level] as usize, raw_beg + half);

    // shift the levels below up into the freed slots
    let live_start = image.levels[0] as usize;
    if level > 0 {
        image.items.copy_within(live_start..raw_beg, live_start + half);
        for offset in &mut image.levels[..level] {
            *offset += half as u32;
        }
    }
    level
}

/// Returns the lowest level whose population reached its nominal capacity.
fn find_level_to_compact(k: u16, m: u8, levels: &[u32]) -> usize {
    let num_levels = levels.len() - 1;
    (0..num_levels)
        .find(|&level| {
            let pop = levels[level + 1] - levels[level];
            pop >= level_capacity(k, num_levels, level, m)
        })
        .unwrap_or_else(|| panic!("no level to compact in levels {levels:?}"))
}

/// Grows the items array of a full image by the capacity of a new level 0, turning the
/// previous top level boundary into an empty top level.
fn add_empty_top_level<T: KllItem>(image: &mut SketchImage<T>, m: u8) {
    debug_assert_eq!(image.levels[0], 0, "only a full image grows");
    let num_levels = image.num_levels();
    let delta = level_capacity(image.k, num_levels + 1, 0, m);

    for offset in &mut image.levels {
        *offset += delta;
    }
    let top = image.levels[num_levels];
    image.levels.push(top);

    let mut items = vec![T::empty_sentinel(); delta as usize];
    items.extend_from_slice(&image.items);
    image.items = items;
    debug_assert_eq!(
        image.items.len(),
        compute_total_capacity(image.k, m, num_levels + 1) as usize
    );
}

/// Halves `current` into `above`.
///
/// Returns the item left behind when `current` has odd length, and the new contents of the
/// level above. `above` must be sorted; `current` must be sorted unless `sort` is set.
fn compact_into<T: KllItem>(
    mut current: Vec<T>,
    above: Vec<T>,
    sort: bool,
    random: &mut impl RandomSource,
) -> (Option<T>, Vec<T>) {
    let leftover = if current.len() % 2 == 1 {
        Some(current.remove(0))
    } else {
        None
    };
    if sort {
        current.sort_by(T::cmp);
    }

    let use_up = above.is_empty();
    let promoted = downsample(current, random.next_bool(), use_up);
    let merged = if use_up {
        promoted
    } else {
        merge_sorted_vec(promoted, above)
    };
    (leftover, merged)
}

/// Keeps every other item of an even-length level.
///
/// Going up, the kept items are those whose distance from the last item has the parity of
/// `odd`; going down, those whose index has it.
fn downsample<T: KllItem>(items: Vec<T>, odd: bool, use_up: bool) -> Vec<T> {
    let len = items.len();
    debug_assert!(len % 2 == 0, "length must be even");
    let offset = odd as usize;
    let parity = if use_up {
        (len.wrapping_sub(1 + offset)) % 2
    } else {
        offset
    };

    items
        .into_iter()
        .enumerate()
        .filter_map(|(idx, item)| (idx % 2 == parity).then_some(item))
        .collect()
}

pub(super) fn merge_sorted_vec<T: KllItem>(left: Vec<T>, right: Vec<T>) -> Vec<T> {
    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();

    loop {
        let take_left = match (left.peek(), right.peek()) {
            (Some(l), Some(r)) => T::cmp(l, r) == Ordering::Less,
            _ => break,
        };
        let next = if take_left { left.next() } else { right.next() };
        merged.extend(next);
    }
    merged.extend(left);
    merged.extend(right);
    merged
}

/// Compacts levels bottom-up until the retained items fit the total capacity of the
/// resulting number of levels.
///
/// Level 0 may be unsorted unless `level_zero_sorted` is set; every other level must be
/// sorted. Levels are moved as they are while the sketch still has room or while they are
/// below their own capacity.
pub(super) fn general_compress<T: KllItem>(
    mut levels_in: Vec<Vec<T>>,
    k: u16,
    m: u8,
    level_zero_sorted: bool,
    random: &mut impl RandomSource,
) -> Vec<Vec<T>> {
    let mut num_levels = levels_in.len();
    let mut item_count: usize = levels_in.iter().map(Vec::len).sum();
    let mut target_item_count = compute_total_capacity(k, m, num_levels) as usize;
    let mut levels_out = Vec::with_capacity(num_levels + 1);

    let mut level = 0usize;
    while level < num_levels {
        if level + 1 >= levels_in.len() {
            levels_in.push(Vec::new());
        }

        let current = std::mem::take(&mut levels_in[level]);
        let cap = level_capacity(k, num_levels, level, m) as usize;
        if item_count < target_item_count || current.len() < cap {
            levels_out.push(current);
            level += 1;
            continue;
        }

        let half = current.len() / 2;
        let above = std::mem::take(&mut levels_in[level + 1]);
        let sort = level == 0 && !level_zero_sorted;
        let (leftover, promoted) = compact_into(current, above, sort, random);
        levels_in[level + 1] = promoted;
        levels_out.push(leftover.into_iter().collect());
        item_count -= half;

        if level + 1 == num_levels {
            num_levels += 1;
            target_item_count += level_capacity(k, num_levels, 0, m) as usize;
        }
        level += 1;
    }

    levels_out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::random::XorShift64;
    use crate::kll::DEFAULT_M;

    fn full_image(k: u16, values: impl IntoIterator<Item = f64>) -> SketchImage<f64> {
        let items: Vec<f64> = values.into_iter().collect();
        SketchImage::from_levels(
            k,
            k,
            items.len() as u64,
            false,
            vec![items],
            None,
            None,
        )
    }

    #[test]
    fn test_first_compaction_adds_a_level() {
        let mut image = full_image(20, (1..=20).rev().map(f64::from));
        let mut random = XorShift64::seeded(7);
        let level = compress_while_updating(&mut image, DEFAULT_M, &mut random);

        assert_eq!(level, 0);
        assert_eq!(image.levels, vec![23, 23, 33]);
        assert_eq!(image.items.len(), 33);
        let promoted = image.level(1);
        assert_eq!(promoted.len(), 10);
        assert!(promoted.windows(2).all(|w| w[0] < w[1]));
        // one of each adjacent pair survives
        for (i, item) in promoted.iter().enumerate() {
            let pair = [2.0 * i as f64 + 1.0, 2.0 * i as f64 + 2.0];
            assert!(pair.contains(item), "{item} not from pair {pair:?}");
        }
    }

    #[test]
    fn test_odd_level_keeps_its_first_item() {
        let mut image = full_image(9, [5.0, 1.0, 2.0, 3.0, 4.0, 6.0, 7.0, 8.0, 9.0]);
        let mut random = XorShift64::seeded(3);
        compress_while_updating(&mut image, DEFAULT_M, &mut random);

        assert_eq!(image.num_levels(), 2);
        assert_eq!(image.level(0), &[5.0]);
        assert_eq!(image.level(1).len(), 4);
        assert_eq!(image.levels[2] as usize, image.items.len());
    }

    #[test]
    fn test_downsample_parities() {
        let items: Vec<i64> = vec![1, 2, 3, 4, 5, 6];
        assert_eq!(downsample(items.clone(), false, false), vec![1, 3, 5]);
        assert_eq!(downsample(items.clone(), true, false), vec![2, 4, 6]);
        assert_eq!(downsample(items.clone(), false, true), vec![2, 4, 6]);
        assert_eq!(downsample(items, true, true), vec![1, 3, 5]);
    }

    #[test]
    fn test_merge_sorted_vec() {
        let merged = merge_sorted_vec(vec![1i64, 4, 9], vec![2, 3, 10, 11]);
        assert_eq!(merged, vec![1, 2, 3, 4, 9, 10, 11]);
        assert_eq!(merge_sorted_vec(Vec::new(), vec![1i64]), vec![1]);
    }

    #[test]
    fn test_general_compress_fits_capacity() {
        let mut random = XorShift64::seeded(11);
        let level_zero: Vec<i64> = (0..60).rev().collect();
        let levels = general_compress(vec![level_zero], 20, DEFAULT_M, false, &mut random);

        let retained: usize = levels.iter().map(Vec::len).sum();
        let capacity = compute_total_capacity(20, DEFAULT_M, levels.len()) as usize;
        assert!(levels.len() > 1);
        assert!(retained <= capacity, "{retained} > {capacity}");
        let weight: u64 = levels
            .iter()
            .enumerate()
            .map(|(level, items)| (items.len() as u64) << level)
            .sum();
        assert_eq!(weight, 60);
        for level in &levels[1..] {
            assert!(level.windows(2).all(|w| w[0] <= w[1]));
        }
    }

    #[test]
    fn test_general_compress_leaves_roomy_levels_alone() {
        let mut random = XorShift64::seeded(5);
        let levels_in: Vec<Vec<i64>> = vec![vec![3, 1, 2], vec![7, 9]];
        let levels = general_compress(levels_in.clone(), 20, DEFAULT_M, false, &mut random);
        assert_eq!(levels, levels_in);
    }
}
