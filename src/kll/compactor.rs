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

/// Buffers at or below this length are sorted by insertion.
const INSERTION_SORT_THRESHOLD: usize = 32;

/// Orders floats ascending with every NaN after every number.
pub(crate) fn cmp_f64(a: &f64, b: &f64) -> Ordering {
    a.partial_cmp(b)
        .unwrap_or_else(|| a.is_nan().cmp(&b.is_nan()))
}

/// The values retained at one height of a sketch.
///
/// Order inside a compactor carries no meaning; it is sorted on demand when
/// the level is compacted.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Compactor {
    values: Vec<f64>,
}

impl Compactor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_values(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }

    pub fn push(&mut self, value: f64) {
        self.values.push(value);
    }

    pub fn extend_from_slice(&mut self, values: &[f64]) {
        self.values.extend_from_slice(values);
    }

    pub fn sort(&mut self) {
        if self.values.len() <= INSERTION_SORT_THRESHOLD {
            insertion_sort(&mut self.values);
        } else {
            self.values.sort_unstable_by(cmp_f64);
        }
    }

    /// Halves this level into `dst` and leaves at most one value behind.
    ///
    /// After sorting, values are paired from the top end. `offset` (0 or 1)
    /// picks the lower or the upper value of every pair, so a single coin
    /// flip chooses between the even and the odd half. With an odd length
    /// the smallest value has no partner and stays at this level.
    pub fn compact(&mut self, offset: u32, dst: &mut Compactor) {
        self.sort();
        let offset = (offset & 1) as usize;
        dst.values.reserve(self.values.len() / 2);
        while self.values.len() >= 2 {
            let l = self.values.len() - 2;
            dst.values.push(self.values[l + offset]);
            self.values.truncate(l);
        }
    }
}

fn insertion_sort(values: &mut [f64]) {
    for i in 1..values.len() {
        let mut j = i;
        while j > 0 && cmp_f64(&values[j - 1], &values[j]) == Ordering::Greater {
            values.swap(j - 1, j);
            j -= 1;
        }
    }
}
