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

use super::compaction::general_compress;
use super::compaction::merge_sorted_vec;
use super::item::KllItem;
use super::layout::SketchImage;
use crate::common::random::RandomSource;

/// Returns the image of `target` after absorbing `other`. Neither input is modified.
///
/// Level 0 of the result holds both level-0 populations; higher levels are merged pairwise.
/// The union is then compacted against the capacity of `target`'s k.
pub(super) fn merge_images<T: KllItem>(
    target: &SketchImage<T>,
    other: &SketchImage<T>,
    m: u8,
    random: &mut impl RandomSource,
) -> SketchImage<T> {
    let target_empty = target.n == 0;
    let num_levels = target.num_levels().max(other.num_levels());

    let mut work_levels = Vec::with_capacity(num_levels);
    for level in 0..num_levels {
        let mine = if level < target.num_levels() {
            target.level(level)
        } else {
            &[]
        };
        let theirs = if level < other.num_levels() {
            other.level(level)
        } else {
            &[]
        };
        let merged = if level == 0 {
            let mut items = Vec::with_capacity(mine.len() + theirs.len());
            items.extend_from_slice(mine);
            items.extend_from_slice(theirs);
            items
        } else {
            merge_sorted_vec(mine.to_vec(), theirs.to_vec())
        };
        work_levels.push(merged);
    }

    // an empty target takes over the other's level 0 as it is
    let level_zero_sorted = target_empty && other.level_zero_sorted;
    let levels = general_compress(work_levels, target.k, m, level_zero_sorted, random);

    SketchImage::from_levels(
        target.k,
        target.min_k.min(other.min_k),
        target.n + other.n,
        level_zero_sorted,
        levels,
        pick(target.min_item, other.min_item, Ordering::Less),
        pick(target.max_item, other.max_item, Ordering::Greater),
    )
}

/// Returns whichever of two optional extrema compares as `wanted` against the other.
fn pick<T: KllItem>(mine: Option<T>, theirs: Option<T>, wanted: Ordering) -> Option<T> {
    match (mine, theirs) {
        (Some(a), Some(b)) if T::cmp(&b, &a) == wanted => Some(b),
        (Some(a), _) => Some(a),
        (None, b) => b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::random::XorShift64;
    use crate::kll::DEFAULT_M;

    fn image(k: u16, levels: Vec<Vec<i64>>) -> SketchImage<i64> {
        let n = levels
            .iter()
            .enumerate()
            .map(|(level, items)| (items.len() as u64) << level)
            .sum();
        let all: Vec<i64> = levels.iter().flatten().copied().collect();
        let min = all.iter().min().copied();
        let max = all.iter().max().copied();
        SketchImage::from_levels(k, k, n, false, levels, min, max)
    }

    #[test]
    fn test_structural_merge_without_compaction() {
        let target = image(20, vec![vec![5, 3], vec![10, 12]]);
        let other = image(20, vec![vec![1]]);
        let merged = merge_images(&target, &other, DEFAULT_M, &mut XorShift64::seeded(1));

        assert_eq!(merged.n, 7);
        assert_eq!(merged.num_levels(), 2);
        assert_eq!(merged.level(0), &[5, 3, 1]);
        assert_eq!(merged.level(1), &[10, 12]);
        assert_eq!(merged.min_item, Some(1));
        assert_eq!(merged.max_item, Some(12));
        assert!(!merged.level_zero_sorted);
    }

    #[test]
    fn test_smaller_min_k_wins() {
        let target = image(200, vec![vec![1, 2]]);
        let mut other = image(50, vec![vec![3]]);
        other.min_k = 40;
        let merged = merge_images(&target, &other, DEFAULT_M, &mut XorShift64::seeded(1));
        assert_eq!(merged.k, 200);
        assert_eq!(merged.min_k, 40);
    }

    #[test]
    fn test_higher_levels_from_other_are_added() {
        let target = image(20, vec![vec![4]]);
        let other = image(20, vec![vec![], vec![1, 7], vec![3]]);
        let merged = merge_images(&target, &other, DEFAULT_M, &mut XorShift64::seeded(1));
        assert_eq!(merged.num_levels(), 3);
        assert_eq!(merged.n, 1 + 4 + 4);
        assert_eq!(merged.level(1), &[1, 7]);
    }
}
