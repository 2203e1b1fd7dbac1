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

use super::compactor::cmp_f64;

/// One step of a [`Cdf`]: the fraction `q` of the stream at or below `v`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantile {
    /// Cumulative normalized weight in `[0, 1]`.
    pub q: f64,
    /// The retained value.
    pub v: f64,
}

/// The weighted cumulative distribution of every value a sketch retains.
///
/// Entries are sorted ascending by value and their probabilities never
/// decrease; the last entry always carries probability `1`.
///
/// # Examples
///
/// ```
/// # use kll_stream::kll::Sketch;
/// let mut sketch = Sketch::new(100);
/// for i in 1..=4 {
///     sketch.update(i as f64);
/// }
/// let cdf = sketch.cdf();
/// assert_eq!(cdf.quantile(2.0), 0.5);
/// assert_eq!(cdf.query(0.5), 2.0);
/// assert_eq!(cdf.quantile_li(2.5), 0.625);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cdf {
    entries: Vec<Quantile>,
}

impl Cdf {
    pub(crate) fn from_levels<'a>(levels: impl IntoIterator<Item = &'a [f64]>) -> Self {
        let mut weighted = Vec::new();
        for (height, level) in levels.into_iter().enumerate() {
            let weight = 1u64 << height;
            weighted.extend(level.iter().map(|&v| (v, weight)));
        }
        weighted.sort_by(|a, b| {
            cmp_f64(&a.0, &b.0).then_with(|| a.0.total_cmp(&b.0))
        });

        let total: u64 = weighted.iter().map(|&(_, weight)| weight).sum();
        let mut running = 0u64;
        let entries = weighted
            .into_iter()
            .map(|(v, weight)| {
                running += weight;
                Quantile {
                    q: running as f64 / total as f64,
                    v,
                }
            })
            .collect();
        Self { entries }
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the distribution has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the entries, sorted by value.
    pub fn as_slice(&self) -> &[Quantile] {
        &self.entries
    }

    /// Iterates over the entries in ascending value order.
    pub fn iter(&self) -> std::slice::Iter<'_, Quantile> {
        self.entries.iter()
    }

    /// Returns the cumulative probability of the greatest entry not above `x`,
    /// or 0 when every entry is above `x`.
    pub fn quantile(&self, x: f64) -> f64 {
        match self.upper_bound(x) {
            0 => 0.0,
            idx => self.entries[idx - 1].q,
        }
    }

    /// Returns the value of the least entry whose cumulative probability
    /// reaches `p`, saturating at the largest value.
    ///
    /// Returns NaN when the distribution is empty.
    pub fn query(&self, p: f64) -> f64 {
        let idx = self.lower_bound_by_probability(p);
        match self.entries.get(idx).or_else(|| self.entries.last()) {
            Some(entry) => entry.v,
            None => f64::NAN,
        }
    }

    /// Like [`Cdf::quantile`], but interpolates linearly between the two
    /// entries around `x`.
    ///
    /// Below the first value the result is 0; at or above the last it is 1.
    pub fn quantile_li(&self, x: f64) -> f64 {
        let idx = self.upper_bound(x);
        if idx == 0 {
            return 0.0;
        }
        if idx == self.entries.len() {
            return 1.0;
        }
        let lo = self.entries[idx - 1];
        let hi = self.entries[idx];
        let width = hi.v - lo.v;
        if width == 0.0 {
            return hi.q;
        }
        if !width.is_finite() {
            return lo.q;
        }
        lo.q + (x - lo.v) / width * (hi.q - lo.q)
    }

    /// Like [`Cdf::query`], but interpolates linearly between the two entries
    /// whose probabilities bracket `p`.
    ///
    /// At or below the first probability the first value is returned; beyond
    /// the last probability, the last value. Returns NaN when empty.
    pub fn query_li(&self, p: f64) -> f64 {
        let Some(last) = self.entries.last() else {
            return f64::NAN;
        };
        let idx = self.lower_bound_by_probability(p);
        if idx == 0 {
            return self.entries[0].v;
        }
        if idx == self.entries.len() {
            return last.v;
        }
        let lo = self.entries[idx - 1];
        let hi = self.entries[idx];
        let width = hi.q - lo.q;
        if width == 0.0 || !(hi.v - lo.v).is_finite() {
            return hi.v;
        }
        lo.v + (p - lo.q) / width * (hi.v - lo.v)
    }

    // index of the first entry above x
    fn upper_bound(&self, x: f64) -> usize {
        self.entries.partition_point(|entry| entry.v <= x)
    }

    // index of the first entry with probability >= p
    fn lower_bound_by_probability(&self, p: f64) -> usize {
        self.entries.partition_point(|entry| entry.q < p)
    }
}

impl<'a> IntoIterator for &'a Cdf {
    type Item = &'a Quantile;
    type IntoIter = std::slice::Iter<'a, Quantile>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
