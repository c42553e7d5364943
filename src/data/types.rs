//! Key type identities and the structured errors of the type layer

use serde::{Deserialize, Serialize};

/// Declared key type of a MAP column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyType {
    Bool,
    Int64,
    /// Microseconds since Unix epoch, stored as i64
    Timestamp,
    /// Days since Unix epoch, stored as i64
    Date,
    Float64,
    String,
    Binary,
    /// Row-valued keys, stored as child blocks
    Struct,
    /// Semi-structured keys with no dedicated layout, handled boxed
    Variant,
}

/// Native representation a candidate key takes on the seek path
///
/// The closed set the typed seek entry points range over. Several declared
/// types share one representation (Timestamp and Date ride the i64 path,
/// String and Binary the byte path).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRepr {
    /// Boxed [`Value`](crate::Value)
    Value,
    Int64,
    Bool,
    Float64,
    Bytes,
    /// Nested block
    Block,
}

impl KeyType {
    /// Representation candidate keys of this type use
    pub fn representation(&self) -> KeyRepr {
        match self {
            KeyType::Bool => KeyRepr::Bool,
            KeyType::Int64 | KeyType::Timestamp | KeyType::Date => KeyRepr::Int64,
            KeyType::Float64 => KeyRepr::Float64,
            KeyType::String | KeyType::Binary => KeyRepr::Bytes,
            KeyType::Struct => KeyRepr::Block,
            KeyType::Variant => KeyRepr::Value,
        }
    }
}

/// Structured failure from the type layer
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypeError {
    #[error("map keys may not be null")]
    NullKey,

    #[error("expected {expected} at position {position}, block holds {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
        position: usize,
    },

    #[error("position {position} out of range for block of {count} positions")]
    PositionOutOfRange { position: usize, count: usize },
}
