//! Columnar block layer: the read-only buffer trait, layout descriptors,
//! and the per-row MAP accessor.

mod columnar;
mod key_ops;
mod map_row;

pub use columnar::{BlockData, ColumnBlock};
pub use key_ops::{KeyEqualsFn, KeyHashFn, KeyOps, OpResult, OperatorError};
pub use map_row::{MapRow, MapRowEncoding, HASH_MULTIPLIER};

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::data::{TypeError, Value};

/// Result of a typed block read
pub type TypeResult<T> = std::result::Result<T, TypeError>;

/// Read-only columnar buffer.
///
/// All positions are block-local. A block is immutable once shared; every
/// method is a pure read, so blocks can be probed concurrently from any
/// number of row views.
pub trait Block: fmt::Debug + Send + Sync {
    /// Number of positions stored
    fn position_count(&self) -> usize;

    /// Bytes attributable to the region `[start, start + len)`
    fn region_size_in_bytes(&self, start: usize, len: usize) -> usize;

    /// Full footprint of the backing storage
    fn retained_size_in_bytes(&self) -> usize;

    /// Layout descriptor for the external serializer
    fn encoding(&self) -> BlockEncoding;

    fn i64_at(&self, position: usize) -> TypeResult<i64>;

    fn bool_at(&self, position: usize) -> TypeResult<bool>;

    fn f64_at(&self, position: usize) -> TypeResult<f64>;

    fn bytes_at(&self, position: usize) -> TypeResult<&[u8]>;

    /// Boxed read, available on every non-nested layout
    fn value_at(&self, position: usize) -> TypeResult<Value>;

    /// Child block of a nested column
    fn nested_at(&self, position: usize) -> TypeResult<&dyn Block>;
}

/// Layout descriptor of a block, handed to the external serializer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockEncoding {
    Bool,
    Int64,
    Float64,
    Bytes,
    Values,
    Nested,
}

/// Pointer identity of a shared allocation.
///
/// Retained-size breakdowns report one entry per reachable allocation; the
/// buffers and hash index behind a batch are shared by every row view, so
/// profiling tools key on this identity to attribute each shared structure
/// to a single canonical owner instead of summing it once per row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AllocationId(usize);

impl AllocationId {
    /// Identity of an `Arc`-shared block
    pub fn of_block(block: &Arc<dyn Block>) -> Self {
        AllocationId(Arc::as_ptr(block).cast::<()>() as usize)
    }

    /// Identity of the shared hash index array
    pub fn of_index(index: &Arc<[i32]>) -> Self {
        AllocationId(Arc::as_ptr(index).cast::<()>() as usize)
    }

    /// Identity of a plain instance
    pub fn of_instance<T>(instance: &T) -> Self {
        AllocationId(instance as *const T as usize)
    }
}

/// Bytes occupied by `len` hash-index slots
pub(crate) fn size_of_index_slots(len: usize) -> usize {
    len * std::mem::size_of::<i32>()
}
