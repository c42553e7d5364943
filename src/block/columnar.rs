//! Reference block implementations over typed columnar storage

use std::mem;

use crate::data::{TypeError, Value};

use super::{Block, BlockEncoding, TypeResult};

/// Typed backing storage for a column block
#[derive(Debug, Clone)]
pub enum BlockData {
    /// Packed bits
    Bool { data: Vec<u8>, len: usize },
    Int64(Vec<i64>),
    Float64(Vec<f64>),
    /// Var-length values; `offsets` has len+1 entries into `data`
    Bytes { offsets: Vec<u32>, data: Vec<u8> },
    /// Boxed fallback for columns without a dedicated layout
    Values(Vec<Value>),
    /// One child block per position
    Nested(Vec<ColumnBlock>),
}

/// A read-only column block backed by [`BlockData`]
#[derive(Debug, Clone)]
pub struct ColumnBlock {
    data: BlockData,
}

impl ColumnBlock {
    pub fn new(data: BlockData) -> Self {
        Self { data }
    }

    pub fn from_i64(values: Vec<i64>) -> Self {
        Self::new(BlockData::Int64(values))
    }

    pub fn from_f64(values: Vec<f64>) -> Self {
        Self::new(BlockData::Float64(values))
    }

    pub fn from_bool(values: &[bool]) -> Self {
        let mut data = vec![0u8; (values.len() + 7) / 8];
        for (i, &v) in values.iter().enumerate() {
            if v {
                data[i / 8] |= 1 << (i % 8);
            }
        }
        Self::new(BlockData::Bool {
            data,
            len: values.len(),
        })
    }

    pub fn from_bytes_values(values: &[&[u8]]) -> Self {
        let mut offsets = Vec::with_capacity(values.len() + 1);
        offsets.push(0u32);
        let mut data = Vec::new();
        for v in values {
            data.extend_from_slice(v);
            offsets.push(data.len() as u32);
        }
        Self::new(BlockData::Bytes { offsets, data })
    }

    pub fn from_str_values(values: &[&str]) -> Self {
        let bytes: Vec<&[u8]> = values.iter().map(|v| v.as_bytes()).collect();
        Self::from_bytes_values(&bytes)
    }

    pub fn from_values(values: Vec<Value>) -> Self {
        Self::new(BlockData::Values(values))
    }

    pub fn from_nested(children: Vec<ColumnBlock>) -> Self {
        Self::new(BlockData::Nested(children))
    }

    #[inline]
    pub fn len(&self) -> usize {
        match &self.data {
            BlockData::Bool { len, .. } => *len,
            BlockData::Int64(v) => v.len(),
            BlockData::Float64(v) => v.len(),
            BlockData::Bytes { offsets, .. } => offsets.len().saturating_sub(1),
            BlockData::Values(v) => v.len(),
            BlockData::Nested(children) => children.len(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Name of the stored layout, for error reporting
    fn layout_name(&self) -> &'static str {
        match &self.data {
            BlockData::Bool { .. } => "bool",
            BlockData::Int64(_) => "int64",
            BlockData::Float64(_) => "float64",
            BlockData::Bytes { .. } => "bytes",
            BlockData::Values(_) => "values",
            BlockData::Nested(_) => "nested",
        }
    }

    fn check_position(&self, position: usize) -> TypeResult<()> {
        let count = self.len();
        if position >= count {
            return Err(TypeError::PositionOutOfRange { position, count });
        }
        Ok(())
    }

    fn mismatch(&self, expected: &'static str, position: usize) -> TypeError {
        TypeError::TypeMismatch {
            expected,
            actual: self.layout_name(),
            position,
        }
    }
}

impl Block for ColumnBlock {
    fn position_count(&self) -> usize {
        self.len()
    }

    fn region_size_in_bytes(&self, start: usize, len: usize) -> usize {
        match &self.data {
            BlockData::Bool { .. } => (len + 7) / 8,
            BlockData::Int64(_) => len * mem::size_of::<i64>(),
            BlockData::Float64(_) => len * mem::size_of::<f64>(),
            BlockData::Bytes { offsets, .. } => {
                let span = (offsets[start + len] - offsets[start]) as usize;
                span + len * mem::size_of::<u32>()
            }
            BlockData::Values(v) => v[start..start + len]
                .iter()
                .map(|value| value.size_in_bytes())
                .sum(),
            BlockData::Nested(children) => children[start..start + len]
                .iter()
                .map(|child| child.region_size_in_bytes(0, child.len()))
                .sum(),
        }
    }

    fn retained_size_in_bytes(&self) -> usize {
        let heap = match &self.data {
            BlockData::Bool { data, .. } => data.capacity(),
            BlockData::Int64(v) => v.capacity() * mem::size_of::<i64>(),
            BlockData::Float64(v) => v.capacity() * mem::size_of::<f64>(),
            BlockData::Bytes { offsets, data } => {
                offsets.capacity() * mem::size_of::<u32>() + data.capacity()
            }
            BlockData::Values(v) => {
                v.capacity() * mem::size_of::<Value>()
                    + v.iter().map(|value| value.size_in_bytes()).sum::<usize>()
            }
            BlockData::Nested(children) => children
                .iter()
                .map(|child| child.retained_size_in_bytes())
                .sum(),
        };
        mem::size_of::<Self>() + heap
    }

    fn encoding(&self) -> BlockEncoding {
        match &self.data {
            BlockData::Bool { .. } => BlockEncoding::Bool,
            BlockData::Int64(_) => BlockEncoding::Int64,
            BlockData::Float64(_) => BlockEncoding::Float64,
            BlockData::Bytes { .. } => BlockEncoding::Bytes,
            BlockData::Values(_) => BlockEncoding::Values,
            BlockData::Nested(_) => BlockEncoding::Nested,
        }
    }

    #[inline]
    fn i64_at(&self, position: usize) -> TypeResult<i64> {
        self.check_position(position)?;
        match &self.data {
            BlockData::Int64(v) => Ok(v[position]),
            _ => Err(self.mismatch("int64", position)),
        }
    }

    #[inline]
    fn bool_at(&self, position: usize) -> TypeResult<bool> {
        self.check_position(position)?;
        match &self.data {
            BlockData::Bool { data, .. } => Ok((data[position / 8] >> (position % 8)) & 1 == 1),
            _ => Err(self.mismatch("bool", position)),
        }
    }

    #[inline]
    fn f64_at(&self, position: usize) -> TypeResult<f64> {
        self.check_position(position)?;
        match &self.data {
            BlockData::Float64(v) => Ok(v[position]),
            _ => Err(self.mismatch("float64", position)),
        }
    }

    #[inline]
    fn bytes_at(&self, position: usize) -> TypeResult<&[u8]> {
        self.check_position(position)?;
        match &self.data {
            BlockData::Bytes { offsets, data } => {
                Ok(&data[offsets[position] as usize..offsets[position + 1] as usize])
            }
            _ => Err(self.mismatch("bytes", position)),
        }
    }

    fn value_at(&self, position: usize) -> TypeResult<Value> {
        self.check_position(position)?;
        match &self.data {
            BlockData::Bool { data, .. } => {
                Ok(Value::Bool((data[position / 8] >> (position % 8)) & 1 == 1))
            }
            BlockData::Int64(v) => Ok(Value::Int64(v[position])),
            BlockData::Float64(v) => Ok(Value::Float64(v[position])),
            BlockData::Bytes { offsets, data } => Ok(Value::Bytes(
                data[offsets[position] as usize..offsets[position + 1] as usize].to_vec(),
            )),
            BlockData::Values(v) => Ok(v[position].clone()),
            BlockData::Nested(_) => Err(self.mismatch("value", position)),
        }
    }

    fn nested_at(&self, position: usize) -> TypeResult<&dyn Block> {
        self.check_position(position)?;
        match &self.data {
            BlockData::Nested(children) => Ok(&children[position]),
            _ => Err(self.mismatch("nested", position)),
        }
    }
}
