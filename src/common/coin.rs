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

use super::RandomSource;

// 64-bit xorshift multiply step, see Vigna, "An experimental exploration of
// Marsaglia's xorshift generators, scrambled".
const XORSHIFT_MULTIPLIER: u64 = 2685821657736338717;

fn xorshift_mult64(mut x: u64) -> u64 {
    x ^= x >> 12;
    x ^= x << 25;
    x ^= x >> 27;
    x.wrapping_mul(XORSHIFT_MULTIPLIER)
}

/// A coin that spends one random word on 64 tosses.
///
/// Each toss reads the next bit of a mixed state word. Once all 64 bits have
/// been handed out the word is mixed again; a fresh word is only requested
/// from the random source while the state is still zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Coin {
    state: u64,
    mask: u64,
}

impl Coin {
    /// Creates a coin that has not drawn any randomness yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a coin whose next toss reads `mask` out of `state` directly.
    ///
    /// Mostly useful to make toss sequences predictable in tests.
    pub fn with_state(state: u64, mask: u64) -> Self {
        Self { state, mask }
    }

    /// Returns either 0 or 1.
    pub fn toss<R: RandomSource + ?Sized>(&mut self, rng: &mut R) -> u32 {
        if self.mask == 0 {
            while self.state == 0 {
                self.state = rng.next_u64();
            }
            self.state = xorshift_mult64(self.state);
            self.mask = 1;
        }
        let bit = (self.state & self.mask != 0) as u32;
        self.mask <<= 1;
        bit
    }
}
