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

use datasketches_kll::error::ErrorKind;
use datasketches_kll::kll::KllDirectSketch;
use datasketches_kll::kll::KllSketch;
use googletest::assert_that;
use googletest::prelude::contains_substring;

fn sketch_with(k: u16, n: usize) -> KllSketch<f32> {
    let mut sketch = KllSketch::new(k);
    for i in 0..n {
        sketch.update(i as f32).unwrap();
    }
    sketch
}

fn sorted_retained<T: Copy + PartialOrd>(items: Vec<(T, u64)>) -> Vec<(T, u64)> {
    let mut items = items;
    items.sort_by(|a, b| a.partial_cmp(b).unwrap());
    items
}

#[test]
fn test_serialize_deserialize_empty() {
    let sketch = KllSketch::<f32>::new(200);
    let bytes = sketch.serialize();
    assert_eq!(bytes.len(), 8);
    assert_eq!(bytes.len(), sketch.serialized_size_bytes(false));
    assert_eq!(bytes[0], 2);
    assert_eq!(bytes[1], 1);
    assert_eq!(bytes[2], 15);
    assert_eq!(bytes[3] & 1, 1);
    assert_eq!(u16::from_le_bytes([bytes[4], bytes[5]]), 200);
    assert_eq!(bytes[6], 8);

    let restored = KllSketch::<f32>::heapify(&bytes).unwrap();
    assert!(restored.is_empty());
    assert_eq!(restored.k(), 200);
    assert_eq!(restored.min_k(), 200);
    assert_eq!(restored.num_levels(), 1);
    assert!(restored.min_item().is_none());
    assert!(restored.max_item().is_none());
    assert_eq!(restored.serialize(), bytes);
}

#[test]
fn test_serialize_deserialize_one_item() {
    let mut sketch = KllSketch::<f32>::new(200);
    sketch.update(1.0).unwrap();
    let bytes = sketch.serialize();
    assert_eq!(bytes.len(), 8 + 4);
    assert_eq!(bytes.len(), sketch.serialized_size_bytes(false));
    assert_eq!(bytes[0], 2);
    assert_eq!(bytes[1], 2);
    assert_eq!(bytes[3] & 4, 4);

    let restored = KllSketch::<f32>::heapify(&bytes).unwrap();
    assert!(!restored.is_empty());
    assert!(!restored.is_estimation_mode());
    assert_eq!(restored.n(), 1);
    assert_eq!(restored.num_retained(), 1);
    assert_eq!(restored.min_item(), Some(1.0));
    assert_eq!(restored.max_item(), Some(1.0));
    assert_eq!(restored.quantile(0.5).unwrap(), 1.0);
    assert_eq!(restored.serialize(), bytes);

    let mut sketch = KllSketch::<f64>::new(200);
    sketch.update(2.5).unwrap();
    let bytes = sketch.serialize();
    assert_eq!(bytes.len(), 8 + 8);
    let restored = KllSketch::<f64>::heapify(&bytes).unwrap();
    assert_eq!(restored.min_item(), Some(2.5));
}

#[test]
fn test_serialize_deserialize_estimation_mode() {
    let sketch = sketch_with(200, 1000);
    let bytes = sketch.serialize();
    assert_eq!(bytes.len(), sketch.serialized_size_bytes(false));
    assert_eq!(bytes[0], 5);
    assert_eq!(bytes[1], 1);
    assert_eq!(bytes[18] as usize, sketch.num_levels());

    let restored = KllSketch::<f32>::heapify(&bytes).unwrap();
    assert_eq!(restored.k(), sketch.k());
    assert_eq!(restored.min_k(), sketch.min_k());
    assert_eq!(restored.n(), sketch.n());
    assert_eq!(restored.num_levels(), sketch.num_levels());
    assert_eq!(restored.levels_array(), sketch.levels_array());
    assert_eq!(restored.num_retained(), sketch.num_retained());
    assert_eq!(restored.min_item(), sketch.min_item());
    assert_eq!(restored.max_item(), sketch.max_item());
    assert_eq!(
        sorted_retained(restored.retained_items()),
        sorted_retained(sketch.retained_items())
    );
    assert_eq!(
        restored.normalized_rank_error(false),
        sketch.normalized_rank_error(false)
    );
    assert_eq!(restored.quantile(0.5).unwrap(), sketch.quantile(0.5).unwrap());
    assert_eq!(restored.serialize(), bytes);
}

#[test]
fn test_updatable_image_round_trip() {
    let sketch = sketch_with(20, 500);
    let bytes = sketch.serialize_updatable();
    assert_eq!(bytes.len(), sketch.serialized_size_bytes(true));
    assert_eq!(bytes[3] & 16, 16);

    let restored = KllSketch::<f32>::heapify(&bytes).unwrap();
    assert_eq!(restored.serialize_updatable(), bytes);
    assert_eq!(restored.serialize(), sketch.serialize());
}

#[test]
fn test_heapify_copies_image() {
    let bytes = sketch_with(20, 100).serialize();
    let mut restored = KllSketch::<f32>::heapify(&bytes).unwrap();
    restored.update(1000.0).unwrap();
    assert_eq!(restored.n(), 101);
    assert_eq!(restored.max_item(), Some(1000.0));
    assert!(!restored.is_direct());

    // keeps working past the capacity of the compact image
    for i in 0..10_000 {
        restored.update(i as f32).unwrap();
    }
    assert_eq!(restored.n(), 10_101);
}

#[test]
fn test_trailing_bytes_are_ignored() {
    let sketch = sketch_with(200, 50);
    let mut bytes = sketch.serialize();
    let len = bytes.len();
    bytes.extend_from_slice(&[0xAB; 16]);
    let restored = KllSketch::<f32>::heapify(&bytes).unwrap();
    assert_eq!(restored.n(), 50);
    assert_eq!(restored.serialize().len(), len);
}

#[test]
fn test_max_serialized_size_bytes() {
    for n in [0u64, 1, 10, 1000, 100_000] {
        let sketch = sketch_with(200, n as usize);
        let updatable = KllSketch::<f32>::max_serialized_size_bytes(200, n, true);
        let compact = KllSketch::<f32>::max_serialized_size_bytes(200, n, false);
        assert!(sketch.serialized_size_bytes(true) <= updatable, "n = {n}");
        assert!(sketch.serialized_size_bytes(false) <= compact, "n = {n}");
    }
}

#[test]
fn test_legacy_single_item_full_format() {
    // single item written with the full preamble and serial version 1
    let mut bytes = vec![5u8, 1, 15, 4, 8, 0, 8, 0];
    bytes.extend_from_slice(&1u64.to_le_bytes());
    bytes.extend_from_slice(&8u16.to_le_bytes());
    bytes.push(1);
    bytes.push(0);
    bytes.extend_from_slice(&7u32.to_le_bytes());
    for item in [3.5f32, 3.5, 3.5] {
        bytes.extend_from_slice(&item.to_le_bytes());
    }

    let restored = KllSketch::<f32>::heapify(&bytes).unwrap();
    assert_eq!(restored.k(), 8);
    assert_eq!(restored.n(), 1);
    assert_eq!(restored.min_item(), Some(3.5));
    assert_eq!(restored.quantile(0.5).unwrap(), 3.5);

    let wrapped = KllDirectSketch::<f32>::wrap(&bytes).unwrap();
    assert_eq!(wrapped.n(), 1);
    assert_eq!(wrapped.max_item(), Some(3.5));
    // re-encoded in the short form
    assert_eq!(wrapped.serialize().len(), 12);
}

#[test]
fn test_level_weights_overflow() {
    // 61 empty stored levels, so the top level holds every retained item at weight 2^60
    let mut bytes = vec![5u8, 1, 15, 0, 8, 0, 8, 0];
    bytes.extend_from_slice(&12345u64.to_le_bytes());
    bytes.extend_from_slice(&8u16.to_le_bytes());
    bytes.push(61);
    bytes.push(0);
    for _ in 0..61 {
        bytes.extend_from_slice(&0u32.to_le_bytes());
    }
    bytes.resize(bytes.len() + 490 * 4, 0);

    let err = KllSketch::<f32>::heapify(&bytes).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedDeserializeData);
    assert_that!(err.message(), contains_substring("retained weight overflows"));

    let err = KllDirectSketch::<f32>::wrap(&bytes).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedDeserializeData);
}

#[test]
fn test_corrupt_preamble_ints() {
    let mut bytes = sketch_with(200, 100).serialize();
    bytes[0] = 3;
    let err = KllSketch::<f32>::heapify(&bytes).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedDeserializeData);
    assert_that!(err.message(), contains_substring("preamble ints"));

    bytes[0] = 9;
    let err = KllSketch::<f32>::heapify(&bytes).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedDeserializeData);
}

#[test]
fn test_corrupt_serial_version() {
    let mut bytes = sketch_with(200, 100).serialize();
    bytes[1] = 3;
    let err = KllSketch::<f32>::heapify(&bytes).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedDeserializeData);
    assert_that!(err.message(), contains_substring("serial version"));

    // a full image cannot claim the single-item serial version
    bytes[1] = 2;
    let err = KllSketch::<f32>::heapify(&bytes).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedDeserializeData);
}

#[test]
fn test_corrupt_family() {
    let mut bytes = sketch_with(200, 100).serialize();
    bytes[2] = 14;
    let err = KllSketch::<f32>::heapify(&bytes).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedDeserializeData);
    assert_that!(err.message(), contains_substring("invalid family"));
}

#[test]
fn test_corrupt_m() {
    let mut bytes = sketch_with(200, 100).serialize();
    bytes[6] = 4;
    let err = KllSketch::<f32>::heapify(&bytes).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedDeserializeData);
    assert_that!(err.message(), contains_substring("invalid m"));
}

#[test]
fn test_corrupt_k() {
    let mut bytes = sketch_with(200, 100).serialize();
    bytes[4] = 2;
    bytes[5] = 0;
    let err = KllSketch::<f32>::heapify(&bytes).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedDeserializeData);
}

#[test]
fn test_corrupt_n() {
    let mut bytes = sketch_with(200, 1000).serialize();
    bytes[8] = bytes[8].wrapping_add(1);
    let err = KllSketch::<f32>::heapify(&bytes).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedDeserializeData);
    assert_that!(err.message(), contains_substring("does not match n"));
}

#[test]
fn test_corrupt_num_levels() {
    let mut bytes = sketch_with(200, 1000).serialize();
    bytes[18] = 0;
    let err = KllSketch::<f32>::heapify(&bytes).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedDeserializeData);
    assert_that!(err.message(), contains_substring("num_levels"));
}

#[test]
fn test_truncated_images() {
    let err = KllSketch::<f32>::heapify(&[]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedDeserializeData);
    assert_that!(err.message(), contains_substring("preamble_ints"));

    let bytes = sketch_with(200, 1000).serialize();
    let err = KllSketch::<f32>::heapify(&bytes[..4]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedDeserializeData);
    assert_that!(err.message(), contains_substring("reading k"));

    let err = KllSketch::<f32>::heapify(&bytes[..12]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedDeserializeData);

    let err = KllSketch::<f32>::heapify(&bytes[..bytes.len() - 1]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedDeserializeData);
    assert_that!(err.message(), contains_substring("items"));

    let mut single = KllSketch::<f32>::new(200);
    single.update(1.0).unwrap();
    let bytes = single.serialize();
    let err = KllSketch::<f32>::heapify(&bytes[..10]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedDeserializeData);

    let bytes = sketch_with(20, 100).serialize_updatable();
    let err = KllDirectSketch::<f32>::wrap(&bytes[..bytes.len() - 4]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedDeserializeData);
}

#[test]
fn test_item_kind_mismatch() {
    let mut doubles = KllSketch::<f64>::new(200);
    doubles.update(1.0).unwrap();
    doubles.update(2.0).unwrap();
    let bytes = doubles.serialize();

    let err = KllSketch::<f32>::heapify(&bytes).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    assert_that!(err.message(), contains_substring("expected floats, got doubles"));

    let err = KllDirectSketch::<i64>::wrap(&bytes).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);

    let mut items = KllSketch::<i64>::new(200);
    items.update(-4).unwrap();
    let err = KllSketch::<f64>::heapify(&items.serialize()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);

    let restored = KllSketch::<i64>::heapify(&items.serialize()).unwrap();
    assert_eq!(restored.min_item(), Some(-4));
}

#[test]
fn test_level_zero_sorted_flag_survives_serialization() {
    let mut sketch = KllSketch::<f64>::with_sorted_level_zero(20);
    for i in (0..15).rev() {
        sketch.update(i as f64).unwrap();
    }
    let bytes = sketch.serialize();
    assert_eq!(bytes[3] & 2, 2);
    let restored = KllSketch::<f64>::heapify(&bytes).unwrap();
    assert!(restored.is_level_zero_sorted());

    let unsorted = {
        let mut sketch = KllSketch::<f64>::new(20);
        for i in 0..15 {
            sketch.update(i as f64).unwrap();
        }
        sketch
    };
    assert_eq!(unsorted.serialize()[3] & 2, 0);
}
