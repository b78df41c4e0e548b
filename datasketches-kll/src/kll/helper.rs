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

use super::MAX_K;
use super::MIN_K;

const POWERS_OF_THREE: [u64; 31] = [
    1,
    3,
    9,
    27,
    81,
    243,
    729,
    2187,
    6561,
    19683,
    59049,
    177147,
    531441,
    1594323,
    4782969,
    14348907,
    43046721,
    129140163,
    387420489,
    1162261467,
    3486784401,
    10460353203,
    31381059609,
    94143178827,
    282429536481,
    847288609443,
    2541865828329,
    7625597484987,
    22876792454961,
    68630377364883,
    205891132094649,
];

// Smallest epsilon reachable with MAX_K.
const MIN_EPSILON: f64 = 4.7634e-5;

/// Returns the number of item slots of a sketch with `num_levels` levels.
pub(super) fn compute_total_capacity(k: u16, m: u8, num_levels: usize) -> u32 {
    let mut total: u32 = 0;
    for level in 0..num_levels {
        total += level_capacity(k, num_levels, level, m);
    }
    total
}

/// Returns the nominal capacity of level `height` in a sketch with `num_levels` levels.
pub(super) fn level_capacity(k: u16, num_levels: usize, height: usize, min_wid: u8) -> u32 {
    assert!(height < num_levels, "height must be < num_levels");
    let depth = num_levels - height - 1;
    let cap = int_cap_aux(k, depth as u8);
    std::cmp::max(min_wid as u32, cap as u32)
}

fn int_cap_aux(k: u16, depth: u8) -> u16 {
    assert!(depth <= 60, "depth must be <= 60");
    if depth <= 30 {
        return int_cap_aux_aux(k, depth);
    }
    let half = depth / 2;
    let rest = depth - half;
    let tmp = int_cap_aux_aux(k, half);
    int_cap_aux_aux(tmp, rest)
}

fn int_cap_aux_aux(k: u16, depth: u8) -> u16 {
    assert!(depth <= 30, "depth must be <= 30");
    let twok = (k as u64) << 1;
    let tmp = (twok << depth) / POWERS_OF_THREE[depth as usize];
    let result = (tmp + 1) >> 1;
    assert!(result <= k as u64, "capacity result exceeds k");
    result as u16
}

/// Returns the total weight represented by levels of the given sizes, or `None` if it does
/// not fit in a `u64`.
pub(super) fn sum_the_sample_weights(level_sizes: impl IntoIterator<Item = usize>) -> Option<u64> {
    let mut total = 0u64;
    let mut weight = 1u64;
    for size in level_sizes {
        if size > 0 {
            total = total.checked_add(weight.checked_mul(size as u64)?)?;
        }
        weight = weight.checked_mul(2)?;
    }
    Some(total)
}

/// Returns an upper bound on the number of levels a sketch of `n` items can have.
pub(super) fn ub_on_num_levels(n: u64) -> usize {
    if n == 0 {
        return 1;
    }
    1 + (63 - n.leading_zeros() as usize)
}

/// Returns the normalized rank error for the given k.
///
/// The constants are the best fit to the 99th percentile of the empirically measured
/// maximum error. With `pmf` set, the error applies to PMF queries; otherwise it applies
/// to single-rank queries.
///
/// # Examples
///
/// ```
/// # use datasketches_kll::kll::normalized_rank_error;
/// let eps = normalized_rank_error(200, false);
/// assert!(eps > 0.013 && eps < 0.0135);
/// assert!(normalized_rank_error(200, true) > eps);
/// ```
pub fn normalized_rank_error(k: u16, pmf: bool) -> f64 {
    let k = k as f64;
    if pmf {
        2.446 / k.powf(0.9433)
    } else {
        2.296 / k.powf(0.9723)
    }
}

/// Returns the smallest k whose [`normalized_rank_error`] does not exceed `epsilon`.
///
/// The result is clamped to [`MIN_K`, `MAX_K`].
///
/// # Examples
///
/// ```
/// # use datasketches_kll::kll::{k_from_epsilon, normalized_rank_error};
/// let eps = normalized_rank_error(200, false);
/// assert_eq!(k_from_epsilon(eps, false), 200);
/// ```
pub fn k_from_epsilon(epsilon: f64, pmf: bool) -> u16 {
    let eps = epsilon.max(MIN_EPSILON);
    let kdbl = if pmf {
        ((2.446 / eps).ln() / 0.9433).exp()
    } else {
        ((2.296 / eps).ln() / 0.9723).exp()
    };
    let krnd = kdbl.round();
    let k = if (krnd - kdbl).abs() < 1e-6 {
        krnd
    } else {
        kdbl.ceil()
    };
    k.clamp(MIN_K as f64, MAX_K as f64) as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kll::DEFAULT_M;

    fn default_total_capacity(k: u16, num_levels: usize) -> u32 {
        compute_total_capacity(k, DEFAULT_M, num_levels)
    }

    #[test]
    fn test_level_capacities_shrink_towards_level_zero() {
        assert_eq!(level_capacity(20, 1, 0, DEFAULT_M), 20);
        assert_eq!(level_capacity(20, 2, 1, DEFAULT_M), 20);
        assert_eq!(level_capacity(20, 2, 0, DEFAULT_M), 13);
        assert_eq!(level_capacity(20, 3, 0, DEFAULT_M), 9);
        assert_eq!(level_capacity(20, 4, 0, DEFAULT_M), 8);
        assert_eq!(level_capacity(200, 2, 0, DEFAULT_M), 133);
    }

    #[test]
    fn test_total_capacity() {
        assert_eq!(default_total_capacity(20, 1), 20);
        assert_eq!(default_total_capacity(20, 2), 33);
        assert_eq!(default_total_capacity(20, 3), 42);
        assert_eq!(default_total_capacity(8, 2), 16);
    }

    #[test]
    fn test_sample_weights() {
        assert_eq!(sum_the_sample_weights([1, 10]), Some(21));
        assert_eq!(sum_the_sample_weights([0, 0, 3]), Some(12));

        let mut sizes = vec![0; 60];
        sizes.push(16);
        assert_eq!(sum_the_sample_weights(sizes), None);
    }

    #[test]
    fn test_ub_on_num_levels() {
        assert_eq!(ub_on_num_levels(0), 1);
        assert_eq!(ub_on_num_levels(1), 1);
        assert_eq!(ub_on_num_levels(2), 2);
        assert_eq!(ub_on_num_levels(1023), 10);
        assert_eq!(ub_on_num_levels(1024), 11);
    }

    #[test]
    fn test_k_from_epsilon_inverts_rank_error() {
        for k in [MIN_K, 20, 200, 1000] {
            assert_eq!(k_from_epsilon(normalized_rank_error(k, false), false), k);
            assert_eq!(k_from_epsilon(normalized_rank_error(k, true), true), k);
        }
        assert_eq!(k_from_epsilon(1.0, false), MIN_K);
        assert_eq!(k_from_epsilon(0.0, false), MAX_K);
    }
}
