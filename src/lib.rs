//! Columnar MAP storage primitives for vectorized query execution.
//!
//! A batch stores every row's map entries flattened: all keys and all values
//! live in two shared columnar buffers, row boundaries are offset/length
//! pairs, and a single shared open-addressing hash index is built once when
//! the batch is built. [`MapRow`] is the per-row view over that shared
//! state: constant-time keyed lookup, two-tier memory accounting, and an
//! encoding descriptor, without materializing a row-local hash map.

pub mod block;
pub mod data;

// Re-export main types
pub use block::{
    AllocationId, Block, BlockData, BlockEncoding, ColumnBlock, KeyEqualsFn, KeyHashFn, KeyOps,
    MapRow, MapRowEncoding, OpResult, OperatorError, TypeResult, HASH_MULTIPLIER,
};
pub use data::{KeyRepr, KeyType, TypeError, Value};

/// Map accessor error type
#[derive(Debug, thiserror::Error)]
pub enum MapColError {
    /// Structured failure from the type layer, surfaced unchanged
    #[error("type error: {0}")]
    Type(#[from] TypeError),

    /// A bound key operator failed in a way the engine cannot classify
    #[error("unexpected internal error: {0}")]
    Internal(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T> = std::result::Result<T, MapColError>;
