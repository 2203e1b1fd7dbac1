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

//! KLL sketch for estimating ranks, quantiles and cumulative distributions.
//!
//! The sketch keeps a stack of levels. A value at level `h` stands for `2^h`
//! observations. New values land in level 0; when the retained count reaches
//! the total capacity, the lowest full level is sorted and halved by a coin
//! flip that keeps either the even or the odd positions, and the survivors
//! move one level up with doubled weight. Level capacities shrink by a factor
//! 2/3 per level below the top, so memory stays `O(k)` per level.
//!
//! # References
//!
//! - Zohar Karnin, Kevin Lang, Edo Liberty, "Optimal Quantile Approximation
//!   in Streams", <https://arxiv.org/abs/1603.05346>.
//!
//! # Usage
//!
//! ```rust
//! # use kll_stream::kll::Sketch;
//! let mut sketch = Sketch::builder().k(200).seed(7).build().unwrap();
//! for i in 0..10_000 {
//!     sketch.update(i as f64);
//! }
//! assert_eq!(sketch.count(), 10_000);
//! let q = sketch.quantile(5_000.0);
//! assert!((q - 0.5).abs() < 0.05);
//!
//! let bytes = sketch.serialize().unwrap();
//! let restored = Sketch::deserialize(200, &bytes).unwrap();
//! assert_eq!(restored.count(), sketch.count());
//! ```

mod builder;
mod cdf;
mod compactor;
mod helper;
mod sampler;
mod serialization;
mod sketch;

pub use self::builder::SketchBuilder;
pub use self::cdf::Cdf;
pub use self::cdf::Quantile;
pub use self::sampler::Sampler;
pub use self::serialization::PAD_BIT;
pub use self::sketch::Sketch;
pub use self::sketch::State;

/// Default value of parameter k.
pub const DEFAULT_K: usize = 200;
/// Minimum value of parameter k.
pub const MIN_K: usize = 1;
