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
use super::sketch::Sketch;
use crate::common::RandomSource;
use crate::common::XorShift64;
use crate::error::Error;

/// Builder for creating [`Sketch`]es.
///
/// # Examples
///
/// ```
/// use kll_stream::kll::Sketch;
///
/// let mut sketch = Sketch::builder().k(64).seed(42).build().unwrap();
/// sketch.update(1.0);
/// assert_eq!(sketch.k(), 64);
/// assert_eq!(sketch.count(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct SketchBuilder {
    k: usize,
    seed: Option<u64>,
}

impl Default for SketchBuilder {
    fn default() -> Self {
        Self {
            k: DEFAULT_K,
            seed: None,
        }
    }
}

impl SketchBuilder {
    /// Sets the accuracy parameter.
    ///
    /// Larger values retain more values and give smaller rank errors.
    pub fn k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    /// Seeds the random source, making every compaction reproducible.
    ///
    /// Without a seed the source is seeded from the clock.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Builds the sketch.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::ConfigInvalid`](crate::error::ErrorKind::ConfigInvalid)
    /// if k is 0.
    pub fn build(self) -> Result<Sketch, Error> {
        let rng = match self.seed {
            Some(seed) => XorShift64::seeded(seed),
            None => XorShift64::default(),
        };
        Sketch::try_with_random(self.k, rng)
    }

    /// Builds the sketch around a caller supplied random source; any seed set
    /// on the builder is ignored.
    pub fn build_with_random<R: RandomSource>(self, rng: R) -> Result<Sketch<R>, Error> {
        Sketch::try_with_random(self.k, rng)
    }
}
