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

use std::sync::OnceLock;

/// Number of depths whose `(2/3)^depth` factor is precomputed.
pub(crate) const HEIGHT_TABLE_SIZE: usize = 64;

/// Most levels a sketch may hold, so that every weight `2^height` fits in a `u64`.
pub(crate) const MAX_NUM_LEVELS: usize = u64::BITS as usize;

fn height_table() -> &'static [f64; HEIGHT_TABLE_SIZE] {
    static TABLE: OnceLock<[f64; HEIGHT_TABLE_SIZE]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = [0.0; HEIGHT_TABLE_SIZE];
        for (depth, factor) in table.iter_mut().enumerate() {
            *factor = (2.0f64 / 3.0).powi(depth as i32);
        }
        table
    })
}

/// Returns `(2/3)^depth`, from the table when it covers `depth`.
pub(crate) fn height_factor(depth: usize) -> f64 {
    match height_table().get(depth) {
        Some(factor) => *factor,
        None => (2.0f64 / 3.0).powi(depth.min(i32::MAX as usize) as i32),
    }
}

/// Maximum occupancy of the level at `height` in a sketch with `num_levels` levels.
///
/// The top level gets `k + 1`; every step down multiplies the `k` part by 2/3.
pub(crate) fn level_capacity(k: usize, num_levels: usize, height: usize) -> usize {
    assert!(height < num_levels, "height must be < num_levels");
    let depth = num_levels - height - 1;
    (k as f64 * height_factor(depth)).ceil() as usize + 1
}

pub(crate) fn compute_total_capacity(k: usize, num_levels: usize) -> usize {
    (0..num_levels)
        .map(|height| level_capacity(k, num_levels, height))
        .sum()
}

pub(crate) fn sum_the_sample_weights(level_sizes: impl IntoIterator<Item = usize>) -> u64 {
    let mut total = 0u64;
    let mut weight = 1u64;
    for size in level_sizes {
        total += weight * size as u64;
        weight <<= 1;
    }
    total
}

/// Returns the total weight of levels with the given sizes, or `None` when a
/// non-empty level sits too high or the total does not fit in a `u64`.
pub(crate) fn checked_total_weight(level_sizes: impl IntoIterator<Item = usize>) -> Option<u64> {
    let mut total = 0u64;
    for (height, size) in level_sizes.into_iter().enumerate() {
        if size == 0 {
            continue;
        }
        let weight = 1u64.checked_shl(u32::try_from(height).ok()?)?;
        total = total.checked_add(weight.checked_mul(size as u64)?)?;
    }
    Some(total)
}
