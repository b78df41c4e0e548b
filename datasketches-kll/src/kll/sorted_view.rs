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

use super::item::KllItem;

/// Retained items in ascending order with their cumulative weights.
#[derive(Debug, Clone)]
pub(super) struct SortedView<T> {
    items: Vec<T>,
    cumulative_weights: Vec<u64>,
    total_weight: u64,
}

impl<T: KllItem> SortedView<T> {
    /// Builds the view of levels whose items weigh `2^level`.
    pub fn new(levels: &[Vec<T>]) -> Self {
        let mut entries: Vec<(T, u64)> = levels
            .iter()
            .enumerate()
            .flat_map(|(level, items)| items.iter().map(move |item| (*item, 1u64 << level)))
            .collect();
        entries.sort_by(|a, b| T::cmp(&a.0, &b.0));

        let mut total_weight = 0u64;
        let mut items = Vec::with_capacity(entries.len());
        let mut cumulative_weights = Vec::with_capacity(entries.len());
        for (item, weight) in entries {
            total_weight += weight;
            items.push(item);
            cumulative_weights.push(total_weight);
        }
        Self {
            items,
            cumulative_weights,
            total_weight,
        }
    }

    pub fn rank(&self, item: &T, inclusive: bool) -> f64 {
        let idx = if inclusive {
            self.items
                .partition_point(|probe| T::cmp(probe, item) != Ordering::Greater)
        } else {
            self.items
                .partition_point(|probe| T::cmp(probe, item) == Ordering::Less)
        };
        match idx {
            0 => 0.0,
            _ => self.cumulative_weights[idx - 1] as f64 / self.total_weight as f64,
        }
    }

    /// Returns the item at `rank`, which must be in `[0, 1]` on a non-empty view.
    pub fn quantile(&self, rank: f64, inclusive: bool) -> T {
        let total = self.total_weight as f64;
        let idx = if inclusive {
            let weight = (rank * total).ceil() as u64;
            self.cumulative_weights.partition_point(|&w| w < weight)
        } else {
            let weight = (rank * total) as u64;
            self.cumulative_weights.partition_point(|&w| w <= weight)
        };
        self.items[idx.min(self.items.len() - 1)]
    }

    pub fn cdf(&self, split_points: &[T], inclusive: bool) -> Vec<f64> {
        check_split_points(split_points);
        split_points
            .iter()
            .map(|item| self.rank(item, inclusive))
            .chain(std::iter::once(1.0))
            .collect()
    }

    pub fn pmf(&self, split_points: &[T], inclusive: bool) -> Vec<f64> {
        let mut buckets = self.cdf(split_points, inclusive);
        for i in (1..buckets.len()).rev() {
            buckets[i] -= buckets[i - 1];
        }
        buckets
    }
}

fn check_split_points<T: KllItem>(split_points: &[T]) {
    if split_points.iter().any(T::is_nan) {
        panic!("split_points must not contain NaN values");
    }
    let increasing = split_points
        .windows(2)
        .all(|pair| T::cmp(&pair[0], &pair[1]) == Ordering::Less);
    assert!(
        increasing,
        "split_points must be unique and monotonically increasing"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weighted_ranks() {
        // 1 and 2 weigh one each, 10 weighs two
        let view = SortedView::new(&[vec![2.0, 1.0], vec![10.0]]);
        assert_eq!(view.rank(&1.0, true), 0.25);
        assert_eq!(view.rank(&1.0, false), 0.0);
        assert_eq!(view.rank(&10.0, false), 0.5);
        assert_eq!(view.rank(&10.0, true), 1.0);
        assert_eq!(view.quantile(0.5, true), 2.0);
        assert_eq!(view.quantile(0.5, false), 10.0);
        assert_eq!(view.quantile(1.0, true), 10.0);
        assert_eq!(view.pmf(&[2.0], true), vec![0.5, 0.5]);
    }

    #[test]
    #[should_panic(expected = "monotonically increasing")]
    fn test_unsorted_split_points() {
        let view = SortedView::new(&[vec![1.0f32]]);
        view.cdf(&[2.0, 1.0], true);
    }
}
