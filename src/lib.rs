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

//! A streaming quantiles sketch.
//!
//! [`kll::Sketch`] summarizes an unbounded stream of `f64` observations in
//! bounded memory and answers approximate rank, quantile and CDF queries.
//! Its state encodes into a compact, bit-packed byte layout that is exact for
//! every IEEE-754 double, NaN and infinities included.

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod common;
pub mod error;
pub mod kll;

mod codec;
