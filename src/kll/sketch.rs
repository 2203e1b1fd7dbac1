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

use super::DEFAULT_K;
use super::MIN_K;
use super::builder::SketchBuilder;
use super::cdf::Cdf;
use super::compactor::Compactor;
use super::helper::MAX_NUM_LEVELS;
use super::helper::checked_total_weight;
use super::helper::compute_total_capacity;
use super::helper::level_capacity;
use super::helper::sum_the_sample_weights;
use super::serialization::decode_levels;
use super::serialization::encode_levels;
use crate::common::Coin;
use crate::common::RandomSource;
use crate::common::XorShift64;
use crate::error::Error;

/// An owned copy of a sketch's levels.
///
/// `levels[h]` holds the values retained at height `h`, each standing for
/// `2^h` observations. Unlike the byte encoding, a state remembers `k`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct State {
    /// The accuracy parameter of the sketch the state was taken from.
    pub k: usize,
    /// Retained values per level, freshest level first.
    pub levels: Vec<Vec<f64>>,
}

/// Streaming quantiles sketch.
///
/// See the [kll module level documentation](crate::kll) for more.
#[derive(Debug, Clone)]
pub struct Sketch<R: RandomSource = XorShift64> {
    k: usize,
    compactors: Vec<Compactor>,
    size: usize,
    max_size: usize,
    coin: Coin,
    rng: R,
}

impl Default for Sketch {
    fn default() -> Self {
        Self::new(DEFAULT_K)
    }
}

impl Sketch {
    /// Creates a new sketch with the given value of k and a time-seeded
    /// random source.
    ///
    /// # Panics
    ///
    /// Panics if k is 0.
    ///
    /// # Examples
    ///
    /// ```
    /// # use kll_stream::kll::Sketch;
    /// let sketch = Sketch::new(200);
    /// assert_eq!(sketch.k(), 200);
    /// assert!(sketch.is_empty());
    /// ```
    pub fn new(k: usize) -> Self {
        Self::with_random(k, XorShift64::default())
    }

    /// Creates a new sketch, reporting an invalid k as an error.
    pub fn try_new(k: usize) -> Result<Self, Error> {
        Self::try_with_random(k, XorShift64::default())
    }

    /// Returns a builder to configure k and the random seed.
    pub fn builder() -> SketchBuilder {
        SketchBuilder::default()
    }

    /// Decodes a sketch with parameter `k` from the canonical byte layout.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::MalformedDeserializeData`](crate::error::ErrorKind::MalformedDeserializeData)
    /// for truncated input, a malformed field, or a level index of 64 or more.
    pub fn deserialize(k: usize, bytes: &[u8]) -> Result<Self, Error> {
        Self::deserialize_with_random(k, bytes, XorShift64::default())
    }

    /// Rebuilds a sketch from a snapshot taken with [`Sketch::state`].
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::ConfigInvalid`](crate::error::ErrorKind::ConfigInvalid)
    /// if k is 0, if there are more than 64 levels, or if the total weight of
    /// the levels does not fit in a `u64`.
    pub fn from_state(state: State) -> Result<Self, Error> {
        Self::from_state_with_random(state, XorShift64::default())
    }
}

impl<R: RandomSource> Sketch<R> {
    /// Creates a new sketch drawing its compaction decisions from `rng`.
    ///
    /// # Panics
    ///
    /// Panics if k is 0.
    pub fn with_random(k: usize, rng: R) -> Self {
        assert!(k >= MIN_K, "k must be > 0, got {k}");
        Self::make(k, rng)
    }

    pub(crate) fn try_with_random(k: usize, rng: R) -> Result<Self, Error> {
        if k < MIN_K {
            return Err(Error::invalid_argument(format!("k must be > 0, got {k}")));
        }
        Ok(Self::make(k, rng))
    }

    /// Decodes a sketch with parameter `k` from the canonical byte layout.
    pub fn deserialize_with_random(k: usize, bytes: &[u8], rng: R) -> Result<Self, Error> {
        let mut sketch = Self::try_with_random(k, rng)?;
        sketch.load(bytes)?;
        Ok(sketch)
    }

    /// Rebuilds a sketch from a snapshot, drawing decisions from `rng`.
    pub fn from_state_with_random(state: State, rng: R) -> Result<Self, Error> {
        let mut sketch = Self::try_with_random(state.k, rng)?;
        if state.levels.len() > MAX_NUM_LEVELS {
            return Err(Error::invalid_argument(format!(
                "a sketch holds at most {MAX_NUM_LEVELS} levels, got {}",
                state.levels.len()
            ))
            .with_context("height", state.levels.len() - 1));
        }
        let sizes = state.levels.iter().map(Vec::len);
        if checked_total_weight(sizes).is_none() {
            return Err(Error::invalid_argument(
                "total weight of the levels overflows u64",
            ));
        }
        let mut compactors: Vec<Compactor> = state
            .levels
            .into_iter()
            .map(Compactor::from_values)
            .collect();
        if compactors.is_empty() {
            compactors.push(Compactor::new());
        }
        sketch.install(compactors);
        Ok(sketch)
    }

    fn make(k: usize, rng: R) -> Self {
        let mut sketch = Self {
            k,
            compactors: Vec::new(),
            size: 0,
            max_size: 0,
            coin: Coin::new(),
            rng,
        };
        sketch.grow();
        sketch
    }

    /// Returns parameter k used to configure this sketch.
    pub fn k(&self) -> usize {
        self.k
    }

    /// Returns the number of levels.
    pub fn num_levels(&self) -> usize {
        self.compactors.len()
    }

    /// Returns the number of retained values.
    pub fn num_retained(&self) -> usize {
        self.size
    }

    /// Returns true if the sketch holds no values.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Returns the total capacity of all levels; compaction keeps the number
    /// of retained values below it.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Returns the capacity of the level at `height`.
    ///
    /// # Panics
    ///
    /// Panics if `height` is not below [`Sketch::num_levels`].
    pub fn capacity(&self, height: usize) -> usize {
        level_capacity(self.k, self.compactors.len(), height)
    }

    /// Iterates over the values of every level, freshest level first.
    pub fn levels(&self) -> impl Iterator<Item = &[f64]> + '_ {
        self.compactors.iter().map(Compactor::as_slice)
    }

    /// Adds a value to the stream.
    pub fn update(&mut self, value: f64) {
        self.compactors[0].push(value);
        self.size += 1;
        self.compact();
    }

    /// Merges another sketch into this one.
    ///
    /// `other` is left untouched and may have more or fewer levels.
    pub fn merge<S: RandomSource>(&mut self, other: &Sketch<S>) {
        while self.compactors.len() < other.compactors.len() {
            self.grow();
        }
        for (level, other_level) in self.compactors.iter_mut().zip(&other.compactors) {
            level.extend_from_slice(other_level.as_slice());
        }
        self.size = self.retained();
        self.compact();
    }

    /// Returns the estimated number of observations in the stream.
    pub fn count(&self) -> u64 {
        sum_the_sample_weights(self.compactors.iter().map(Compactor::len))
    }

    /// Returns the estimated number of observations not greater than `x`.
    ///
    /// NaN values never count, so `rank(f64::INFINITY) == count()` only
    /// holds for streams without NaN.
    pub fn rank(&self, x: f64) -> u64 {
        let mut rank = 0u64;
        for (height, level) in self.compactors.iter().enumerate() {
            let below = level.as_slice().iter().filter(|&&v| v <= x).count() as u64;
            rank += below << height;
        }
        rank
    }

    /// Returns the estimated fraction of observations not greater than `x`.
    ///
    /// An empty sketch returns 0.
    pub fn quantile(&self, x: f64) -> f64 {
        match self.count() {
            0 => 0.0,
            count => self.rank(x) as f64 / count as f64,
        }
    }

    /// Returns the weighted cumulative distribution of all retained values.
    pub fn cdf(&self) -> Cdf {
        Cdf::from_levels(self.levels())
    }

    /// Encodes the retained values into the canonical byte layout.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::ConfigInvalid`](crate::error::ErrorKind::ConfigInvalid)
    /// when more values are retained than the 16-bit count field can describe.
    pub fn serialize(&self) -> Result<Vec<u8>, Error> {
        encode_levels(&self.compactors)
    }

    /// Replaces this sketch's levels with the ones encoded in `bytes`.
    ///
    /// On error the sketch is left exactly as it was.
    pub fn load(&mut self, bytes: &[u8]) -> Result<(), Error> {
        let compactors = decode_levels(bytes).inspect_err(|err| {
            tracing::debug!(error = %err, len = bytes.len(), "failed to decode sketch");
        })?;
        self.install(compactors);
        Ok(())
    }

    /// Takes an owned snapshot of the levels.
    pub fn state(&self) -> State {
        State {
            k: self.k,
            levels: self.levels().map(<[f64]>::to_vec).collect(),
        }
    }

    /// Consumes the sketch, moving its levels into a snapshot.
    pub fn into_state(self) -> State {
        State {
            k: self.k,
            levels: self
                .compactors
                .into_iter()
                .map(Compactor::into_values)
                .collect(),
        }
    }

    fn install(&mut self, compactors: Vec<Compactor>) {
        debug_assert!(!compactors.is_empty(), "a sketch has at least one level");
        self.compactors = compactors;
        self.max_size = compute_total_capacity(self.k, self.compactors.len());
        self.size = self.retained();
        self.compact();
    }

    fn retained(&self) -> usize {
        self.compactors.iter().map(Compactor::len).sum()
    }

    fn grow(&mut self) {
        self.compactors.push(Compactor::new());
        self.max_size = compute_total_capacity(self.k, self.compactors.len());
        tracing::trace!(
            num_levels = self.compactors.len(),
            max_size = self.max_size,
            "grew sketch"
        );
    }

    // Scans low to high and compacts every full level until the retained
    // count drops below the total capacity. While size >= max_size some
    // level is at capacity, and each compaction removes at least one value.
    fn compact(&mut self) {
        while self.size >= self.max_size {
            let mut height = 0;
            while height < self.compactors.len() {
                if self.compactors[height].len() >= self.capacity(height) {
                    if height + 1 >= self.compactors.len() {
                        self.grow();
                    }
                    let offset = self.coin.toss(&mut self.rng);
                    let (lower, upper) = self.compactors.split_at_mut(height + 1);
                    lower[height].compact(offset, &mut upper[0]);
                    self.size = self.retained();
                    tracing::trace!(height, retained = self.size, "compacted level");
                    if self.size < self.max_size {
                        break;
                    }
                }
                height += 1;
            }
        }
    }
}
