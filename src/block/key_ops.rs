//! Type-bound hash and equality functions for MAP key columns.
//!
//! A batch resolves one [`KeyOps`] pair for its declared key type when it is
//! built; every row view sliced from the batch invokes the same pair. The
//! pair is plain function pointers, so the seek hot path does no per-call
//! type lookup and no allocation.

use std::fmt;
use std::hash::{Hash, Hasher};

use ahash::AHasher;

use crate::data::{KeyRepr, KeyType, TypeError, Value};
use crate::MapColError;

use super::Block;

/// Failure surfaced by a bound key operator
#[derive(Debug, thiserror::Error)]
pub enum OperatorError {
    /// Structured failure from the type layer; propagated as-is
    #[error(transparent)]
    Type(#[from] TypeError),

    /// Anything else; the row accessor wraps it as an internal engine fault
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

pub type OpResult<T> = std::result::Result<T, OperatorError>;

impl From<OperatorError> for MapColError {
    fn from(err: OperatorError) -> Self {
        match err {
            OperatorError::Type(e) => MapColError::Type(e),
            OperatorError::Other(e) => MapColError::Internal(e),
        }
    }
}

/// Hash of a candidate key, one variant per native representation
#[derive(Clone, Copy)]
pub enum KeyHashFn {
    Value(fn(&Value) -> OpResult<i64>),
    Int64(fn(i64) -> OpResult<i64>),
    Bool(fn(bool) -> OpResult<i64>),
    Float64(fn(f64) -> OpResult<i64>),
    Bytes(fn(&[u8]) -> OpResult<i64>),
    Block(fn(&dyn Block) -> OpResult<i64>),
}

/// Equality between a buffer-resident key and a candidate key
#[derive(Clone, Copy)]
pub enum KeyEqualsFn {
    Value(fn(&dyn Block, usize, &Value) -> OpResult<bool>),
    Int64(fn(&dyn Block, usize, i64) -> OpResult<bool>),
    Bool(fn(&dyn Block, usize, bool) -> OpResult<bool>),
    Float64(fn(&dyn Block, usize, f64) -> OpResult<bool>),
    Bytes(fn(&dyn Block, usize, &[u8]) -> OpResult<bool>),
    Block(fn(&dyn Block, usize, &dyn Block) -> OpResult<bool>),
}

impl KeyHashFn {
    pub fn representation(&self) -> KeyRepr {
        match self {
            KeyHashFn::Value(_) => KeyRepr::Value,
            KeyHashFn::Int64(_) => KeyRepr::Int64,
            KeyHashFn::Bool(_) => KeyRepr::Bool,
            KeyHashFn::Float64(_) => KeyRepr::Float64,
            KeyHashFn::Bytes(_) => KeyRepr::Bytes,
            KeyHashFn::Block(_) => KeyRepr::Block,
        }
    }
}

impl KeyEqualsFn {
    pub fn representation(&self) -> KeyRepr {
        match self {
            KeyEqualsFn::Value(_) => KeyRepr::Value,
            KeyEqualsFn::Int64(_) => KeyRepr::Int64,
            KeyEqualsFn::Bool(_) => KeyRepr::Bool,
            KeyEqualsFn::Float64(_) => KeyRepr::Float64,
            KeyEqualsFn::Bytes(_) => KeyRepr::Bytes,
            KeyEqualsFn::Block(_) => KeyRepr::Block,
        }
    }
}

impl fmt::Debug for KeyHashFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyHashFn::{:?}", self.representation())
    }
}

impl fmt::Debug for KeyEqualsFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyEqualsFn::{:?}", self.representation())
    }
}

/// The comparator pair bound to a MAP column's key type.
///
/// Invariant: keys that compare equal hash equal. The standard bindings
/// below uphold it; custom pairs must too, or lookups silently miss.
#[derive(Clone, Copy)]
pub struct KeyOps {
    pub hash: KeyHashFn,
    pub equals: KeyEqualsFn,
}

impl KeyOps {
    /// Resolve the standard pair for a declared key type
    pub fn for_type(key_type: KeyType) -> KeyOps {
        match key_type.representation() {
            KeyRepr::Bool => KeyOps {
                hash: KeyHashFn::Bool(hash_bool),
                equals: KeyEqualsFn::Bool(equals_bool),
            },
            KeyRepr::Int64 => KeyOps {
                hash: KeyHashFn::Int64(hash_i64),
                equals: KeyEqualsFn::Int64(equals_i64),
            },
            KeyRepr::Float64 => KeyOps {
                hash: KeyHashFn::Float64(hash_f64),
                equals: KeyEqualsFn::Float64(equals_f64),
            },
            KeyRepr::Bytes => KeyOps {
                hash: KeyHashFn::Bytes(hash_bytes),
                equals: KeyEqualsFn::Bytes(equals_bytes),
            },
            KeyRepr::Block => KeyOps {
                hash: KeyHashFn::Block(hash_block),
                equals: KeyEqualsFn::Block(equals_block),
            },
            KeyRepr::Value => KeyOps {
                hash: KeyHashFn::Value(hash_value),
                equals: KeyEqualsFn::Value(equals_value),
            },
        }
    }

    /// Representation both functions expect from a candidate key
    pub fn representation(&self) -> KeyRepr {
        self.hash.representation()
    }
}

impl fmt::Debug for KeyOps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyOps")
            .field("hash", &self.hash)
            .field("equals", &self.equals)
            .finish()
    }
}

// Standard bindings. Integer keys hash to themselves so the probe start
// slot is a pure modulo; sign is preserved and handled by the floored
// modulo on the probe side.

#[inline(always)]
fn hash_i64(key: i64) -> OpResult<i64> {
    Ok(key)
}

#[inline(always)]
fn equals_i64(block: &dyn Block, position: usize, key: i64) -> OpResult<bool> {
    Ok(block.i64_at(position)? == key)
}

#[inline(always)]
fn hash_bool(key: bool) -> OpResult<i64> {
    Ok(key as i64)
}

#[inline(always)]
fn equals_bool(block: &dyn Block, position: usize, key: bool) -> OpResult<bool> {
    Ok(block.bool_at(position)? == key)
}

#[inline(always)]
fn hash_f64(key: f64) -> OpResult<i64> {
    Ok(key.to_bits() as i64)
}

#[inline(always)]
fn equals_f64(block: &dyn Block, position: usize, key: f64) -> OpResult<bool> {
    Ok(block.f64_at(position)? == key)
}

#[inline]
fn hash_bytes(key: &[u8]) -> OpResult<i64> {
    let mut hasher = AHasher::default();
    key.hash(&mut hasher);
    Ok(hasher.finish() as i64)
}

#[inline]
fn equals_bytes(block: &dyn Block, position: usize, key: &[u8]) -> OpResult<bool> {
    Ok(block.bytes_at(position)? == key)
}

fn hash_value(key: &Value) -> OpResult<i64> {
    match key {
        Value::Null => Err(TypeError::NullKey.into()),
        Value::Bool(v) => hash_bool(*v),
        Value::Int64(v) => hash_i64(*v),
        Value::Float64(v) => hash_f64(*v),
        Value::String(v) => hash_bytes(v.as_bytes()),
        Value::Bytes(v) => hash_bytes(v),
    }
}

fn equals_value(block: &dyn Block, position: usize, key: &Value) -> OpResult<bool> {
    Ok(&block.value_at(position)? == key)
}

fn hash_block(key: &dyn Block) -> OpResult<i64> {
    let mut combined: i64 = 0;
    for position in 0..key.position_count() {
        let element = key.value_at(position)?;
        let hash = if element.is_null() {
            0
        } else {
            hash_value(&element)?
        };
        combined = combined.rotate_left(5) ^ hash;
    }
    Ok(combined)
}

fn equals_block(block: &dyn Block, position: usize, key: &dyn Block) -> OpResult<bool> {
    let resident = block.nested_at(position)?;
    if resident.position_count() != key.position_count() {
        return Ok(false);
    }
    for i in 0..key.position_count() {
        if resident.value_at(i)? != key.value_at(i)? {
            return Ok(false);
        }
    }
    Ok(true)
}
