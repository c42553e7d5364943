//! Lookup and accounting behavior of row views sliced from one shared batch.
//!
//! The fixture below builds the shared buffers and fills the hash index with
//! the same linear-probe discipline the batch builder applies upstream; the
//! crate itself only consumes the prebuilt index.

use std::sync::Arc;

use mapcol::{
    Block, ColumnBlock, KeyHashFn, KeyOps, KeyType, MapColError, MapRow, TypeError, Value,
    HASH_MULTIPLIER,
};

const EMPTY_SLOT: i32 = -1;

fn resident_hash(ops: &KeyOps, keys: &dyn Block, position: usize) -> i64 {
    match ops.hash {
        KeyHashFn::Int64(hash) => hash(keys.i64_at(position).unwrap()).unwrap(),
        KeyHashFn::Bool(hash) => hash(keys.bool_at(position).unwrap()).unwrap(),
        KeyHashFn::Float64(hash) => hash(keys.f64_at(position).unwrap()).unwrap(),
        KeyHashFn::Bytes(hash) => hash(keys.bytes_at(position).unwrap()).unwrap(),
        KeyHashFn::Value(hash) => hash(&keys.value_at(position).unwrap()).unwrap(),
        KeyHashFn::Block(hash) => hash(keys.nested_at(position).unwrap()).unwrap(),
    }
}

fn fill_row_region(
    index: &mut [i32],
    table_offset: usize,
    table_size: usize,
    keys: &dyn Block,
    key_offset: usize,
    entry_count: usize,
    ops: &KeyOps,
) {
    for entry in 0..entry_count {
        let hash = resident_hash(ops, keys, key_offset + entry);
        let mut slot = hash.rem_euclid(table_size as i64) as usize;
        while index[table_offset + slot] != EMPTY_SLOT {
            slot += 1;
            if slot == table_size {
                slot = 0;
            }
        }
        index[table_offset + slot] = entry as i32;
    }
}

struct BatchFixture {
    keys: Arc<dyn Block>,
    values: Arc<dyn Block>,
    index: Arc<[i32]>,
    key_type: KeyType,
    ops: KeyOps,
    row_bounds: Vec<(usize, usize)>,
}

fn build_batch(
    key_type: KeyType,
    keys: ColumnBlock,
    values: ColumnBlock,
    row_entry_counts: &[usize],
) -> BatchFixture {
    let ops = KeyOps::for_type(key_type);
    let total_entries: usize = row_entry_counts.iter().sum();
    assert_eq!(total_entries, keys.len());
    assert_eq!(total_entries, values.len());

    let mut index = vec![EMPTY_SLOT; total_entries * HASH_MULTIPLIER];
    let mut row_bounds = Vec::new();
    let mut entry_offset = 0usize;
    for &entries in row_entry_counts {
        fill_row_region(
            &mut index,
            entry_offset * HASH_MULTIPLIER,
            entries * HASH_MULTIPLIER,
            &keys,
            entry_offset,
            entries,
            &ops,
        );
        row_bounds.push((entry_offset * 2, entries * 2));
        entry_offset += entries;
    }

    BatchFixture {
        keys: Arc::new(keys),
        values: Arc::new(values),
        index: index.into(),
        key_type,
        ops,
        row_bounds,
    }
}

impl BatchFixture {
    fn row(&self, r: usize) -> MapRow {
        let (offset, position_count) = self.row_bounds[r];
        MapRow::new(
            offset,
            position_count,
            Arc::clone(&self.keys),
            Arc::clone(&self.values),
            Arc::clone(&self.index),
            self.key_type,
            self.ops,
        )
    }

    fn total_size_in_bytes(&self) -> usize {
        self.keys.region_size_in_bytes(0, self.keys.position_count())
            + self
                .values
                .region_size_in_bytes(0, self.values.position_count())
            + self.index.len() * std::mem::size_of::<i32>()
    }
}

#[test]
fn test_two_row_scenario() {
    // Row 0 = {1: "a", 2: "b"}, row 1 = {5: "c"}. Row 0's hash region has
    // 8 slots, row 1's the next 4.
    let batch = build_batch(
        KeyType::Int64,
        ColumnBlock::from_i64(vec![1, 2, 5]),
        ColumnBlock::from_str_values(&["a", "b", "c"]),
        &[2, 1],
    );
    let row0 = batch.row(0);
    let row1 = batch.row(1);

    let b_position = row0.seek_key_i64(2).unwrap().unwrap();
    assert_eq!(row0.bytes_at(b_position), Ok(&b"b"[..]));

    assert_eq!(row0.seek_key_i64(5).unwrap(), None);

    let c_position = row1.seek_key_i64(5).unwrap().unwrap();
    assert_eq!(row1.bytes_at(c_position), Ok(&b"c"[..]));

    assert_eq!(row0.entry_count(), 2);
    assert_eq!(row1.entry_count(), 1);
    assert_eq!(row1.offset(), 4);
}

#[test]
fn test_exposed_sizes_split_per_row() {
    let batch = build_batch(
        KeyType::Int64,
        ColumnBlock::from_i64(vec![1, 2, 5]),
        ColumnBlock::from_str_values(&["a", "b", "c"]),
        &[2, 1],
    );
    let row0 = batch.row(0);
    let row1 = batch.row(1);

    assert!(row0.size_in_bytes() > 0);
    assert!(row1.size_in_bytes() > 0);
    assert!(row0.size_in_bytes() + row1.size_in_bytes() <= batch.total_size_in_bytes());
    // Rows of different entry counts expose different shares.
    assert!(row0.size_in_bytes() > row1.size_in_bytes());
}

#[test]
fn test_retained_size_reports_full_shared_footprint() {
    let batch = build_batch(
        KeyType::Int64,
        ColumnBlock::from_i64(vec![1, 2, 5]),
        ColumnBlock::from_str_values(&["a", "b", "c"]),
        &[2, 1],
    );
    let row0 = batch.row(0);
    let row1 = batch.row(1);

    // Sibling views retain the same shared structures: identical totals,
    // however much of the batch each row uses.
    assert_eq!(row0.retained_size_in_bytes(), row1.retained_size_in_bytes());

    // Deduping by allocation identity recovers the true aggregate: the
    // shared parts count once, the instances once each.
    let mut seen = std::collections::HashMap::new();
    for row in [&row0, &row1] {
        for (id, bytes) in row.retained_breakdown() {
            seen.insert(id, bytes);
        }
    }
    let deduped: usize = seen.values().sum();
    assert_eq!(
        deduped,
        row0.retained_size_in_bytes() + std::mem::size_of::<MapRow>()
    );
}

#[test]
fn test_byte_string_keys_round_trip() {
    let names = ["alpha", "beta", "gamma", "delta", "epsilon", "zeta"];
    let batch = build_batch(
        KeyType::String,
        ColumnBlock::from_str_values(&names),
        ColumnBlock::from_i64(vec![0, 1, 2, 3, 4, 5]),
        &[6],
    );
    let row = batch.row(0);

    for (i, name) in names.iter().enumerate() {
        let position = row.seek_key_bytes(name.as_bytes()).unwrap().unwrap();
        assert_eq!(position, i * 2 + 1);
        assert_eq!(row.i64_at(position), Ok(i as i64));
    }
    assert_eq!(row.seek_key_bytes(b"eta").unwrap(), None);
    assert_eq!(row.seek_key_bytes(b"").unwrap(), None);
}

#[test]
fn test_bool_keys_round_trip() {
    let batch = build_batch(
        KeyType::Bool,
        ColumnBlock::from_bool(&[false, true]),
        ColumnBlock::from_i64(vec![10, 20]),
        &[2],
    );
    let row = batch.row(0);

    let false_position = row.seek_key_bool(false).unwrap().unwrap();
    let true_position = row.seek_key_bool(true).unwrap().unwrap();
    assert_eq!(row.i64_at(false_position), Ok(10));
    assert_eq!(row.i64_at(true_position), Ok(20));
}

#[test]
fn test_f64_keys_hash_by_bit_pattern() {
    // Negative doubles have the sign bit set, so their bit-pattern hash is
    // negative; the floored modulo keeps the probe in range.
    let batch = build_batch(
        KeyType::Float64,
        ColumnBlock::from_f64(vec![-2.5, 0.0, 3.25]),
        ColumnBlock::from_str_values(&["n", "z", "p"]),
        &[3],
    );
    let row = batch.row(0);

    let position = row.seek_key_f64(-2.5).unwrap().unwrap();
    assert_eq!(row.bytes_at(position), Ok(&b"n"[..]));
    assert_eq!(row.seek_key_f64(-2.4).unwrap(), None);
}

#[test]
fn test_timestamp_keys_use_the_i64_path() {
    let batch = build_batch(
        KeyType::Timestamp,
        ColumnBlock::from_i64(vec![1_700_000_000_000_000, 1_700_000_060_000_000]),
        ColumnBlock::from_str_values(&["first", "second"]),
        &[2],
    );
    let row = batch.row(0);
    let position = row.seek_key_i64(1_700_000_060_000_000).unwrap().unwrap();
    assert_eq!(row.bytes_at(position), Ok(&b"second"[..]));
}

#[test]
fn test_variant_keys_round_trip_boxed() {
    let keys = vec![
        Value::String("name".into()),
        Value::Int64(7),
        Value::Bool(true),
    ];
    let batch = build_batch(
        KeyType::Variant,
        ColumnBlock::from_values(keys),
        ColumnBlock::from_str_values(&["a", "b", "c"]),
        &[3],
    );
    let row = batch.row(0);

    let position = row.seek_key(&Value::Int64(7)).unwrap().unwrap();
    assert_eq!(row.bytes_at(position), Ok(&b"b"[..]));
    assert_eq!(row.seek_key(&Value::Int64(8)).unwrap(), None);
    assert_eq!(row.seek_key(&Value::String("nome".into())).unwrap(), None);
}

#[test]
fn test_null_variant_key_surfaces_domain_error() {
    let batch = build_batch(
        KeyType::Variant,
        ColumnBlock::from_values(vec![Value::Int64(1)]),
        ColumnBlock::from_i64(vec![2]),
        &[1],
    );
    let row = batch.row(0);

    match row.seek_key(&Value::Null) {
        Err(MapColError::Type(TypeError::NullKey)) => {}
        other => panic!("expected NullKey domain error, got {:?}", other),
    }
}

#[test]
fn test_struct_keys_match_structurally() {
    let batch = build_batch(
        KeyType::Struct,
        ColumnBlock::from_nested(vec![
            ColumnBlock::from_i64(vec![1, 2]),
            ColumnBlock::from_i64(vec![3, 4]),
        ]),
        ColumnBlock::from_str_values(&["first", "second"]),
        &[2],
    );
    let row = batch.row(0);

    let candidate = ColumnBlock::from_i64(vec![3, 4]);
    let position = row.seek_key_block(&candidate).unwrap().unwrap();
    assert_eq!(row.bytes_at(position), Ok(&b"second"[..]));

    let miss = ColumnBlock::from_i64(vec![3, 5]);
    assert_eq!(row.seek_key_block(&miss).unwrap(), None);
    let shorter = ColumnBlock::from_i64(vec![3]);
    assert_eq!(row.seek_key_block(&shorter).unwrap(), None);
}

#[test]
fn test_empty_row_between_siblings() {
    let batch = build_batch(
        KeyType::Int64,
        ColumnBlock::from_i64(vec![1, 9]),
        ColumnBlock::from_i64(vec![10, 90]),
        &[1, 0, 1],
    );
    let empty = batch.row(1);
    assert!(empty.is_empty());
    assert_eq!(empty.seek_key_i64(1).unwrap(), None);
    assert_eq!(empty.size_in_bytes(), 0);

    // Neighbors are unaffected by the zero-width region between them.
    assert_eq!(batch.row(0).seek_key_i64(1).unwrap(), Some(1));
    assert_eq!(batch.row(2).seek_key_i64(9).unwrap(), Some(1));
    assert_eq!(batch.row(2).seek_key_i64(1).unwrap(), None);
}

#[test]
fn test_sibling_rows_share_one_encoding() {
    let batch = build_batch(
        KeyType::Int64,
        ColumnBlock::from_i64(vec![1, 2, 5]),
        ColumnBlock::from_str_values(&["a", "b", "c"]),
        &[2, 1],
    );
    let encoding0 = batch.row(0).encoding();
    let encoding1 = batch.row(1).encoding();
    assert_eq!(encoding0, encoding1);
    assert_eq!(encoding0.key_type, KeyType::Int64);
}

#[test]
fn test_dense_row_terminates_on_misses() {
    // 64 entries, 256 slots; misses drawn from the same value range must
    // all terminate at a sentinel.
    let keys: Vec<i64> = (0..64).map(|i| i * 3).collect();
    let values: Vec<i64> = (0..64).collect();
    let batch = build_batch(
        KeyType::Int64,
        ColumnBlock::from_i64(keys.clone()),
        ColumnBlock::from_i64(values),
        &[64],
    );
    let row = batch.row(0);

    for (i, &key) in keys.iter().enumerate() {
        let position = row.seek_key_i64(key).unwrap().unwrap();
        assert_eq!(row.i64_at(position), Ok(i as i64));
    }
    for miss in (0..192).filter(|m| m % 3 != 0) {
        assert_eq!(row.seek_key_i64(miss).unwrap(), None, "key {}", miss);
    }
}
