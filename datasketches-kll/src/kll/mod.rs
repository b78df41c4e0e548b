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

//! KLL sketch implementation for estimating quantiles and ranks.
//!
//! KLL is a compact, streaming quantiles sketch with lazy compaction and
//! near-optimal accuracy per retained item. It supports one-pass updates,
//! approximate quantiles, ranks, PMF, and CDF queries, and merging of sketches
//! built with different k.
//!
//! A sketch is always backed by a binary image of itself. Heap sketches own an
//! updatable image; [`KllDirectSketch`] operates on an image in caller memory,
//! either read-only or, for updatable images, in place. The compact form from
//! [`KllSketch::serialize`] holds only the retained items.
//!
//! # Usage
//!
//! ```rust
//! # use datasketches_kll::kll::{KllDirectSketch, KllSketch};
//! let mut sketch = KllSketch::<f64>::new(200);
//! for i in 1..=1000 {
//!     sketch.update(i as f64).unwrap();
//! }
//! let median = sketch.quantile(0.5).unwrap();
//! assert!((450.0..=550.0).contains(&median));
//!
//! let mut image = sketch.serialize_updatable();
//! let mut direct = KllDirectSketch::<f64>::writable_wrap(&mut image, None).unwrap();
//! direct.update(1001.0).unwrap();
//! assert_eq!(direct.n(), 1001);
//! ```

mod compaction;
mod helper;
mod item;
mod layout;
mod merge;
mod serialization;
mod sketch;
mod sorted_view;

pub use self::helper::k_from_epsilon;
pub use self::helper::normalized_rank_error;
pub use self::item::ItemKind;
pub use self::item::KllItem;
pub use self::sketch::KllDirectSketch;
pub use self::sketch::KllSketch;
pub use self::sketch::MemoryServer;

/// Default value of parameter k.
pub const DEFAULT_K: u16 = 200;
/// Default value of parameter m.
pub const DEFAULT_M: u8 = 8;
/// Minimum value of parameter k.
pub const MIN_K: u16 = DEFAULT_M as u16;
/// Maximum value of parameter k.
pub const MAX_K: u16 = u16::MAX;
