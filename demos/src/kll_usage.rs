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

use datasketches_kll::kll::KllDirectSketch;
use datasketches_kll::kll::KllSketch;

fn main() {
    println!("=== KLL Sketch Usage ===\n");

    let mut sketch = KllSketch::<f64>::new(200);
    for i in 0..100_000 {
        sketch.update(i as f64).unwrap();
    }

    println!("Stream length: {}", sketch.n());
    println!("Retained items: {}", sketch.num_retained());
    println!("Levels: {}", sketch.num_levels());
    println!(
        "Normalized rank error: {:.4}",
        sketch.normalized_rank_error(false)
    );

    println!("\nQuantiles:");
    for rank in [0.0, 0.25, 0.5, 0.75, 0.99, 1.0] {
        println!("  rank {:.2} -> {:.0}", rank, sketch.quantile(rank).unwrap());
    }
    println!(
        "Rank of 50000: {:.4}",
        sketch.rank(&50_000.0, true).unwrap()
    );

    // Merge a second stream built with a smaller k
    println!("\nMerging a sketch of 100,000 more values (k = 100)...");
    let mut other = KllSketch::<f64>::new(100);
    for i in 100_000..200_000 {
        other.update(i as f64).unwrap();
    }
    sketch.merge(&other).unwrap();
    println!("Stream length after merge: {}", sketch.n());
    println!("Min k after merge: {}", sketch.min_k());
    println!("Median after merge: {:.0}", sketch.quantile(0.5).unwrap());

    // Serialize and deserialize
    println!("\nSerializing sketch...");
    let compact = sketch.serialize();
    let updatable = sketch.serialize_updatable();
    println!("Compact size: {} bytes", compact.len());
    println!("Updatable size: {} bytes", updatable.len());

    let restored = KllSketch::<f64>::heapify(&compact).unwrap();
    println!(
        "Median after deserialization: {:.0}",
        restored.quantile(0.5).unwrap()
    );

    // Work on caller memory
    println!("\nUpdating a sketch in caller memory...");
    let mut mem = updatable;
    let mut direct = KllDirectSketch::<f64>::writable_wrap(&mut mem, None).unwrap();
    match direct.update(-1.0) {
        Ok(()) => println!("Min item now: {:?}", direct.min_item()),
        Err(err) => println!("Update in place failed: {err}"),
    }

    let mut read_only = KllDirectSketch::<f64>::wrap(&compact).unwrap();
    if let Err(err) = read_only.update(0.0) {
        println!("Compact images are read-only: {err}");
    }
}
