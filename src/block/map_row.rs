//! Per-row accessor over a batch's flattened MAP storage.
//!
//! Entries of row `r` occupy flattened positions `[offset, offset +
//! position_count)` of the batch: key *k* of the row at `2k`, its value at
//! `2k + 1`. The separate key and value buffers are addressed by halving,
//! so buffer position `offset/2 + k` holds the row's *k*-th key (and the
//! aligned value). The shared hash index stores, per row, a region of
//! `entry_count * HASH_MULTIPLIER` slots; a slot holds `-1` or the
//! zero-based key index within the row.

use std::fmt;
use std::mem;
use std::sync::Arc;

use crate::data::{KeyType, TypeError, Value};
use crate::Result;

use super::key_ops::{KeyEqualsFn, KeyHashFn, KeyOps, OpResult};
use super::{size_of_index_slots, AllocationId, Block, BlockEncoding, TypeResult};

/// Hash-index slots provisioned per map entry.
///
/// Fixed at batch build time; keeps the load factor at 25% so linear probe
/// runs stay short and always end at a sentinel.
pub const HASH_MULTIPLIER: usize = 4;

/// Empty-slot marker in the shared hash index
const EMPTY_SLOT: i32 = -1;

/// One row's view of a MAP column batch.
///
/// The key buffer, value buffer, and hash index are owned by the batch and
/// shared by every row sliced from it; a `MapRow` is a borrowing view and
/// dropping it never touches the shared state. All operations are pure
/// reads, so views can be used freely across threads.
#[derive(Debug, Clone)]
pub struct MapRow {
    offset: usize,
    position_count: usize,
    key_buffer: Arc<dyn Block>,
    value_buffer: Arc<dyn Block>,
    hash_index: Arc<[i32]>,
    key_type: KeyType,
    key_ops: KeyOps,
}

impl MapRow {
    /// Create a view of the row at `(offset, position_count)`.
    ///
    /// The caller guarantees `position_count` is even and that the hash
    /// index covers the row's region.
    pub fn new(
        offset: usize,
        position_count: usize,
        key_buffer: Arc<dyn Block>,
        value_buffer: Arc<dyn Block>,
        hash_index: Arc<[i32]>,
        key_type: KeyType,
        key_ops: KeyOps,
    ) -> Self {
        debug_assert!(position_count % 2 == 0, "flattened position count must be even");
        debug_assert!(
            (offset / 2 + position_count / 2) * HASH_MULTIPLIER <= hash_index.len(),
            "hash index does not cover the row region"
        );
        debug_assert_eq!(
            key_ops.hash.representation(),
            key_ops.equals.representation(),
            "hash and equality functions bound to different representations"
        );
        Self {
            offset,
            position_count,
            key_buffer,
            value_buffer,
            hash_index,
            key_type,
            key_ops,
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Flattened positions in this row
    pub fn position_count(&self) -> usize {
        self.position_count
    }

    /// Logical number of entries
    pub fn entry_count(&self) -> usize {
        self.position_count / 2
    }

    pub fn is_empty(&self) -> bool {
        self.position_count == 0
    }

    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    pub fn key_buffer(&self) -> &Arc<dyn Block> {
        &self.key_buffer
    }

    pub fn value_buffer(&self) -> &Arc<dyn Block> {
        &self.value_buffer
    }

    /// Find a boxed candidate key.
    ///
    /// Returns the flattened position of the matching value (`2k + 1` for
    /// the row's *k*-th entry), or `None` when no equal key is present.
    /// Rows are assumed to hold distinct keys; if duplicates were inserted
    /// upstream, whichever one the probe encounters first wins, in no
    /// specified order.
    ///
    /// # Panics
    ///
    /// Panics if the bound comparator pair expects a different candidate
    /// representation; passing the wrong representation is a caller bug,
    /// not a runtime condition.
    pub fn seek_key(&self, key: &Value) -> Result<Option<usize>> {
        let (KeyHashFn::Value(hash), KeyEqualsFn::Value(equals)) =
            (self.key_ops.hash, self.key_ops.equals)
        else {
            panic!("boxed candidate key for a map keyed by {:?}", self.key_type);
        };
        self.probe(|| hash(key), |block, position| equals(block, position, key))
    }

    /// Find an i64 candidate key. See [`MapRow::seek_key`] for the result
    /// contract and panics.
    pub fn seek_key_i64(&self, key: i64) -> Result<Option<usize>> {
        let (KeyHashFn::Int64(hash), KeyEqualsFn::Int64(equals)) =
            (self.key_ops.hash, self.key_ops.equals)
        else {
            panic!("i64 candidate key for a map keyed by {:?}", self.key_type);
        };
        self.probe(|| hash(key), |block, position| equals(block, position, key))
    }

    /// Find a bool candidate key. See [`MapRow::seek_key`].
    pub fn seek_key_bool(&self, key: bool) -> Result<Option<usize>> {
        let (KeyHashFn::Bool(hash), KeyEqualsFn::Bool(equals)) =
            (self.key_ops.hash, self.key_ops.equals)
        else {
            panic!("bool candidate key for a map keyed by {:?}", self.key_type);
        };
        self.probe(|| hash(key), |block, position| equals(block, position, key))
    }

    /// Find an f64 candidate key. See [`MapRow::seek_key`].
    pub fn seek_key_f64(&self, key: f64) -> Result<Option<usize>> {
        let (KeyHashFn::Float64(hash), KeyEqualsFn::Float64(equals)) =
            (self.key_ops.hash, self.key_ops.equals)
        else {
            panic!("f64 candidate key for a map keyed by {:?}", self.key_type);
        };
        self.probe(|| hash(key), |block, position| equals(block, position, key))
    }

    /// Find a byte-string candidate key. See [`MapRow::seek_key`].
    pub fn seek_key_bytes(&self, key: &[u8]) -> Result<Option<usize>> {
        let (KeyHashFn::Bytes(hash), KeyEqualsFn::Bytes(equals)) =
            (self.key_ops.hash, self.key_ops.equals)
        else {
            panic!("byte candidate key for a map keyed by {:?}", self.key_type);
        };
        self.probe(|| hash(key), |block, position| equals(block, position, key))
    }

    /// Find a nested (block-valued) candidate key. See [`MapRow::seek_key`].
    pub fn seek_key_block(&self, key: &dyn Block) -> Result<Option<usize>> {
        let (KeyHashFn::Block(hash), KeyEqualsFn::Block(equals)) =
            (self.key_ops.hash, self.key_ops.equals)
        else {
            panic!("nested candidate key for a map keyed by {:?}", self.key_type);
        };
        self.probe(|| hash(key), |block, position| equals(block, position, key))
    }

    /// One probing algorithm for every representation; the typed entry
    /// points differ only in how the bound pair is invoked.
    fn probe<H, E>(&self, hash: H, equals: E) -> Result<Option<usize>>
    where
        H: FnOnce() -> OpResult<i64>,
        E: Fn(&dyn Block, usize) -> OpResult<bool>,
    {
        if self.position_count == 0 {
            return Ok(None);
        }

        let hash_code = hash()?;

        let table_offset = self.offset / 2 * HASH_MULTIPLIER;
        let table_size = self.position_count / 2 * HASH_MULTIPLIER;
        // Floored modulo: negative hash codes still land in [0, table_size).
        let mut slot = hash_code.rem_euclid(table_size as i64) as usize;
        loop {
            let key_index = self.hash_index[table_offset + slot];
            if key_index == EMPTY_SLOT {
                return Ok(None);
            }
            let key_position = self.offset / 2 + key_index as usize;
            if equals(self.key_buffer.as_ref(), key_position)? {
                return Ok(Some(key_index as usize * 2 + 1));
            }
            slot += 1;
            if slot == table_size {
                slot = 0;
            }
        }
    }

    /// Cost attributable to this row alone: its regions of the key and
    /// value buffers plus its slice of the shared hash index.
    pub fn size_in_bytes(&self) -> usize {
        self.key_buffer
            .region_size_in_bytes(self.offset / 2, self.position_count / 2)
            + self
                .value_buffer
                .region_size_in_bytes(self.offset / 2, self.position_count / 2)
            + size_of_index_slots(self.position_count / 2 * HASH_MULTIPLIER)
    }

    /// Full footprint reachable from this view.
    ///
    /// The buffers and hash index are shared by every row of the batch, so
    /// sibling views all report the same full total; summing this across
    /// rows overcounts by design. Callers aggregating across views dedupe
    /// by allocation identity via [`MapRow::retained_breakdown`].
    pub fn retained_size_in_bytes(&self) -> usize {
        mem::size_of::<Self>()
            + self.key_buffer.retained_size_in_bytes()
            + self.value_buffer.retained_size_in_bytes()
            + size_of_index_slots(self.hash_index.len())
    }

    /// Retained cost per reachable allocation: the instance itself, the key
    /// buffer, the value buffer, and the hash index array.
    pub fn retained_breakdown(&self) -> [(AllocationId, usize); 4] {
        [
            (AllocationId::of_instance(self), mem::size_of::<Self>()),
            (
                AllocationId::of_block(&self.key_buffer),
                self.key_buffer.retained_size_in_bytes(),
            ),
            (
                AllocationId::of_block(&self.value_buffer),
                self.value_buffer.retained_size_in_bytes(),
            ),
            (
                AllocationId::of_index(&self.hash_index),
                size_of_index_slots(self.hash_index.len()),
            ),
        ]
    }

    /// Serialization descriptor: the key type identity, the bound
    /// comparator pair, and the underlying buffer encodings.
    pub fn encoding(&self) -> MapRowEncoding {
        MapRowEncoding {
            key_type: self.key_type,
            key_ops: self.key_ops,
            key_encoding: self.key_buffer.encoding(),
            value_encoding: self.value_buffer.encoding(),
        }
    }

    /// Buffer and buffer-local position behind a flattened position: even
    /// positions read the key buffer, odd ones the value buffer.
    fn underlying(&self, position: usize) -> TypeResult<(&dyn Block, usize)> {
        if position >= self.position_count {
            return Err(TypeError::PositionOutOfRange {
                position,
                count: self.position_count,
            });
        }
        let block = if position % 2 == 0 {
            self.key_buffer.as_ref()
        } else {
            self.value_buffer.as_ref()
        };
        Ok((block, self.offset / 2 + position / 2))
    }

    pub fn i64_at(&self, position: usize) -> TypeResult<i64> {
        let (block, position) = self.underlying(position)?;
        block.i64_at(position)
    }

    pub fn bool_at(&self, position: usize) -> TypeResult<bool> {
        let (block, position) = self.underlying(position)?;
        block.bool_at(position)
    }

    pub fn f64_at(&self, position: usize) -> TypeResult<f64> {
        let (block, position) = self.underlying(position)?;
        block.f64_at(position)
    }

    pub fn bytes_at(&self, position: usize) -> TypeResult<&[u8]> {
        let (block, position) = self.underlying(position)?;
        block.bytes_at(position)
    }

    pub fn value_at(&self, position: usize) -> TypeResult<Value> {
        let (block, position) = self.underlying(position)?;
        block.value_at(position)
    }
}

/// Descriptor handed to the external serializer when a row view is shipped.
///
/// Construction is pure and reproducible: equal inputs produce
/// structurally-equal descriptors. Equality compares the key type and the
/// buffer encodings; the comparator pair is carried for the serializer but
/// excluded, being derived from the key type.
#[derive(Debug, Clone, Copy)]
pub struct MapRowEncoding {
    pub key_type: KeyType,
    pub key_ops: KeyOps,
    pub key_encoding: BlockEncoding,
    pub value_encoding: BlockEncoding,
}

impl PartialEq for MapRowEncoding {
    fn eq(&self, other: &Self) -> bool {
        self.key_type == other.key_type
            && self.key_encoding == other.key_encoding
            && self.value_encoding == other.value_encoding
    }
}

impl Eq for MapRowEncoding {}

impl fmt::Display for MapRowEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "map<{:?}: {:?} -> {:?}>",
            self.key_type, self.key_encoding, self.value_encoding
        )
    }
}
