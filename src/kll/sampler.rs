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

use crate::common::RandomSource;

/// Streaming weighted selection of one value per `2^height` units of weight.
///
/// Values arrive with weights below the budget. The sampler keeps a single
/// candidate and the weight accumulated behind it; whenever a full budget
/// has been seen it emits the candidate at weight `2^height`. Each value ends
/// up emitted with probability proportional to its own weight, which keeps
/// the emitted total unbiased.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sampler {
    height: u32,
    weight: u64,
    candidate: f64,
}

impl Sampler {
    /// Creates a sampler emitting values of weight `2^height`.
    ///
    /// # Panics
    ///
    /// Panics if `height` is 64 or more.
    pub fn new(height: u32) -> Self {
        assert!(height < 64, "height must be < 64, got {height}");
        Self {
            height,
            weight: 0,
            candidate: 0.0,
        }
    }

    /// Returns the height whose weight emitted values carry.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns the weight each emitted value represents.
    pub fn budget(&self) -> u64 {
        1u64 << self.height
    }

    /// Returns the weight accumulated behind the current candidate.
    pub fn pending_weight(&self) -> u64 {
        self.weight
    }

    /// Feeds `value` with `weight`, pushing any emitted value onto `out`.
    pub fn update<R: RandomSource + ?Sized>(
        &mut self,
        value: f64,
        weight: u64,
        rng: &mut R,
        out: &mut Vec<f64>,
    ) {
        let budget = self.budget();
        // self.weight < budget, so the subtraction cannot underflow
        if weight <= budget - self.weight {
            self.weight += weight;
            if rng.next_f64() * (self.weight as f64) < weight as f64 {
                self.candidate = value;
            }
            if self.weight == budget {
                self.weight = 0;
                out.push(self.candidate);
            }
        } else if self.weight < weight {
            if rng.next_f64() * (budget as f64) < weight as f64 {
                out.push(value);
            }
        } else {
            if rng.next_f64() * (budget as f64) < self.weight as f64 {
                out.push(self.candidate);
            }
            self.weight = weight;
            self.candidate = value;
        }
    }

    /// Doubles the budget.
    ///
    /// # Panics
    ///
    /// Panics if the height would reach 64.
    pub fn grow(&mut self) {
        assert!(self.height < 63, "sampler height overflow");
        self.height += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::XorShift64;

    #[test]
    fn test_unit_weights_emit_once_per_budget() {
        let mut rng = XorShift64::seeded(11);
        let mut sampler = Sampler::new(3);
        let mut out = Vec::new();
        for i in 0..64 {
            sampler.update(i as f64, 1, &mut rng, &mut out);
        }
        assert_eq!(out.len(), 8);
        for (block, value) in out.iter().enumerate() {
            let lo = (block * 8) as f64;
            assert!(
                (lo..lo + 8.0).contains(value),
                "{value} outside block {block}"
            );
        }
        assert_eq!(sampler.pending_weight(), 0);
    }

    #[test]
    fn test_full_weight_value_is_always_emitted() {
        let mut rng = XorShift64::seeded(5);
        let mut sampler = Sampler::new(2);
        let mut out = Vec::new();
        sampler.update(1.0, 4, &mut rng, &mut out);
        assert_eq!(out, vec![1.0]);

        sampler.update(2.0, 1, &mut rng, &mut out);
        sampler.update(3.0, 4, &mut rng, &mut out);
        assert_eq!(out, vec![1.0, 3.0]);
        assert_eq!(sampler.pending_weight(), 1);
    }

    #[test]
    fn test_over_budget_weight_is_emitted_once() {
        let mut rng = XorShift64::seeded(17);
        let mut sampler = Sampler::new(2);
        let mut out = Vec::new();
        sampler.update(1.0, 1, &mut rng, &mut out);
        sampler.update(2.0, u64::MAX, &mut rng, &mut out);
        assert_eq!(out, vec![2.0]);
        assert_eq!(sampler.pending_weight(), 1);

        sampler.update(3.0, 9, &mut rng, &mut out);
        assert_eq!(out, vec![2.0, 3.0]);
        assert_eq!(sampler.pending_weight(), 1);

        let mut empty = Sampler::new(0);
        empty.update(4.0, u64::MAX, &mut rng, &mut out);
        assert_eq!(out, vec![2.0, 3.0, 4.0]);
        assert_eq!(empty.pending_weight(), 0);
    }

    #[test]
    fn test_expected_weight_is_preserved() {
        let mut rng = XorShift64::seeded(99);
        let mut sampler = Sampler::new(4);
        let mut out = Vec::new();
        let mut total = 0u64;
        for i in 0..100_000u64 {
            let weight = 1 + (i % 7);
            total += weight;
            sampler.update(i as f64, weight, &mut rng, &mut out);
        }
        let emitted = out.len() as f64 * sampler.budget() as f64;
        let relative = (emitted - total as f64).abs() / total as f64;
        assert!(relative < 0.05, "emitted {emitted} vs fed {total}");
    }

    #[test]
    fn test_grow_doubles_budget() {
        let mut sampler = Sampler::new(0);
        assert_eq!(sampler.budget(), 1);
        sampler.grow();
        sampler.grow();
        assert_eq!(sampler.height(), 2);
        assert_eq!(sampler.budget(), 4);
    }
}
