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

use googletest::assert_that;
use googletest::prelude::contains_substring;
use googletest::prelude::ge;
use googletest::prelude::le;
use googletest::prelude::near;
use kll_stream::common::RandomSource;
use kll_stream::common::XorShift64;
use kll_stream::error::ErrorKind;
use kll_stream::kll::DEFAULT_K;
use kll_stream::kll::Sketch;
use kll_stream::kll::State;

fn seeded(k: usize, seed: u64) -> Sketch {
    Sketch::builder().k(k).seed(seed).build().unwrap()
}

// Box-Muller over the crate's own generator.
fn standard_normal(rng: &mut XorShift64) -> f64 {
    let u1 = 1.0 - rng.next_f64();
    let u2 = rng.next_f64();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

#[test]
#[should_panic(expected = "k must be > 0")]
fn test_zero_k_panics() {
    Sketch::new(0);
}

#[test]
fn test_zero_k_is_config_invalid() {
    let err = Sketch::try_new(0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
    let err = Sketch::builder().k(0).build().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
}

#[test]
fn test_default() {
    let sketch = Sketch::default();
    assert_eq!(sketch.k(), DEFAULT_K);
    assert_eq!(sketch.num_levels(), 1);
}

#[test]
fn test_empty() {
    let sketch = seeded(DEFAULT_K, 1);
    assert!(sketch.is_empty());
    assert_eq!(sketch.count(), 0);
    assert_eq!(sketch.num_retained(), 0);
    assert_eq!(sketch.rank(0.0), 0);
    assert_eq!(sketch.quantile(0.0), 0.0);
    let cdf = sketch.cdf();
    assert!(cdf.is_empty());
    assert!(cdf.query(0.5).is_nan());
}

#[test]
fn test_one_value() {
    let mut sketch = seeded(DEFAULT_K, 1);
    sketch.update(1.0);
    assert!(!sketch.is_empty());
    assert_eq!(sketch.count(), 1);
    assert_eq!(sketch.rank(0.5), 0);
    assert_eq!(sketch.rank(1.0), 1);
    assert_eq!(sketch.quantile(1.0), 1.0);
    assert_eq!(sketch.cdf().query(0.5), 1.0);
}

#[test]
fn test_exact_mode() {
    let mut sketch = seeded(DEFAULT_K, 1);
    let n = DEFAULT_K as u64;
    for i in 1..=n {
        sketch.update(i as f64);
        assert_eq!(sketch.count(), i);
    }
    assert_eq!(sketch.num_levels(), 1);
    assert_eq!(sketch.num_retained(), n as usize);
    for i in 1..=n {
        assert_eq!(sketch.rank(i as f64), i);
        assert_eq!(sketch.quantile(i as f64), i as f64 / n as f64);
    }
    let cdf = sketch.cdf();
    assert_eq!(cdf.query(0.5), (n / 2) as f64);
}

#[test]
fn test_estimation_mode_count_is_exact() {
    let mut sketch = seeded(32, 5);
    for i in 0..100_000 {
        sketch.update(i as f64);
    }
    assert!(sketch.num_levels() > 1);
    assert_eq!(sketch.count(), 100_000);
    assert_that!(sketch.num_retained(), le(sketch.max_size()));
}

#[test]
fn test_rank_bounds_and_monotonicity() {
    let mut sketch = seeded(40, 17);
    let mut rng = XorShift64::seeded(17);
    for _ in 0..20_000 {
        sketch.update(rng.next_f64() * 100.0 - 50.0);
    }
    assert_eq!(sketch.rank(f64::NEG_INFINITY), 0);
    assert_eq!(sketch.rank(f64::INFINITY), sketch.count());

    let mut previous = 0;
    for step in -60..=60 {
        let rank = sketch.rank(step as f64);
        assert_that!(rank, ge(previous));
        previous = rank;

        let q = sketch.quantile(step as f64);
        assert_that!(q, ge(0.0));
        assert_that!(q, le(1.0));
    }
}

#[test]
fn test_cdf_is_a_distribution() {
    let mut sketch = seeded(25, 23);
    for i in 0..5_000 {
        sketch.update(((i * 37) % 1_001) as f64);
    }
    let cdf = sketch.cdf();
    assert_eq!(cdf.len(), sketch.num_retained());
    for pair in cdf.as_slice().windows(2) {
        assert_that!(pair[1].v, ge(pair[0].v));
        assert_that!(pair[1].q, ge(pair[0].q));
    }
    assert_eq!(cdf.as_slice().last().unwrap().q, 1.0);

    for x in [0.0, 250.0, 500.0, 999.0] {
        assert_that!(cdf.quantile(x), near(sketch.quantile(x), 1e-12));
        let li = cdf.quantile_li(x);
        assert_that!(li, ge(0.0));
        assert_that!(li, le(1.0));
    }
    for p in [0.0, 0.1, 0.5, 0.9, 1.0] {
        let v = cdf.query_li(p);
        assert_that!(v, ge(cdf.as_slice()[0].v));
        assert_that!(v, le(cdf.as_slice().last().unwrap().v));
    }
}

#[test]
fn test_standard_normal() {
    let mut sketch = seeded(50, 2024);
    let mut rng = XorShift64::seeded(4242);
    for _ in 0..10_000 {
        sketch.update(standard_normal(&mut rng));
    }
    assert_eq!(sketch.count(), 10_000);
    assert_that!(sketch.quantile(0.0), near(0.5, 0.07));
    let cdf = sketch.cdf();
    assert_that!(cdf.query(0.5), near(0.0, 0.2));
    assert_that!(cdf.query_li(0.5), near(0.0, 0.2));
    assert_that!(cdf.quantile_li(0.0), near(0.5, 0.07));
}

#[test]
fn test_merge() {
    let mut a = seeded(100, 1);
    let mut b = seeded(100, 2);
    for i in 1..=1000 {
        a.update(i as f64);
        b.update((i + 1000) as f64);
    }
    a.merge(&b);
    assert_eq!(a.count(), 2000);
    assert_that!(a.quantile(1000.0), near(0.5, 0.05));
    assert_that!(a.num_retained(), le(a.max_size()));
}

#[test]
fn test_merge_leaves_other_untouched() {
    let mut a = seeded(16, 3);
    let mut b = seeded(16, 4);
    for i in 0..3_000 {
        b.update(i as f64);
    }
    a.update(-1.0);
    let before = b.state();
    a.merge(&b);
    assert_eq!(b.state(), before);
    assert_eq!(a.count(), 3_001);
    assert!(a.num_levels() >= b.num_levels());
}

#[test]
fn test_merge_into_taller_sketch() {
    let mut tall = seeded(16, 5);
    for i in 0..3_000 {
        tall.update(i as f64);
    }
    let mut short = seeded(16, 6);
    for i in 0..10 {
        short.update(i as f64);
    }
    let levels = tall.num_levels();
    tall.merge(&short);
    assert_eq!(tall.count(), 3_010);
    assert_that!(tall.num_levels(), ge(levels));
}

#[test]
fn test_merge_empty() {
    let mut a = seeded(16, 7);
    for i in 0..100 {
        a.update(i as f64);
    }
    let before = a.state();
    a.merge(&seeded(16, 8));
    assert_eq!(a.state(), before);

    let mut empty = seeded(16, 9);
    empty.merge(&a);
    assert_eq!(empty.count(), a.count());
}

#[test]
fn test_nan_is_retained_but_never_ranked() {
    let mut sketch = seeded(DEFAULT_K, 1);
    sketch.update(f64::NAN);
    sketch.update(1.0);
    assert_eq!(sketch.count(), 2);
    assert_eq!(sketch.rank(f64::INFINITY), 1);
    let cdf = sketch.cdf();
    assert_eq!(cdf.as_slice()[0].v, 1.0);
    assert!(cdf.as_slice()[1].v.is_nan());
}

#[test]
fn test_from_state_rejects_out_of_range_heights() {
    let mut levels = vec![Vec::new(); 70];
    levels[69].push(1.0);
    let err = Sketch::from_state(State { k: 10, levels }).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
    assert_that!(err.to_string(), contains_substring("height: 69"));

    let mut levels = vec![Vec::new(); 64];
    levels[63] = vec![1.0, 2.0, 3.0];
    let err = Sketch::from_state(State { k: 10, levels }).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
}
