//! Stored value types
//!
//! Values are a closed, tagged set so that decoding dispatches on the tag
//! written at serialization time. Numeric arrays carry their element type
//! and shape explicitly.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A value that can be stored under a key
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Array(NdArray),
}

impl Value {
    /// Short name of the variant, used in conversion errors
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Array(_) => "array",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&NdArray> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Check every array in the value, including those nested in lists and maps
    pub fn validate(&self) -> Result<()> {
        match self {
            Value::Array(array) => array.validate(),
            Value::List(items) => items.iter().try_for_each(Value::validate),
            Value::Map(fields) => fields.values().try_for_each(Value::validate),
            _ => Ok(()),
        }
    }

    /// Build a value from a JSON document.
    ///
    /// Integers that fit in `i64` become `Int`, other numbers `Float`.
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(fields) => Value::Map(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// JSON rendering for display and `--format json` output.
    ///
    /// Lossy for `Bytes` (hex string) and `Array` (object with dtype, shape
    /// and flat data); non-finite floats render as `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Bytes(b) => serde_json::Value::String(hex::encode(b)),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(fields) => serde_json::Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Value::Array(array) => serde_json::json!({
                "dtype": array.dtype().name(),
                "shape": array.shape(),
                "data": array.elements_json(),
            }),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{}", s),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Value::Array(a) => write!(f, "{}", a),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

/// Element type of a numeric array
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DType {
    U8,
    I32,
    I64,
    F32,
    F64,
}

impl DType {
    /// Size of one element in bytes
    pub fn size(&self) -> usize {
        match self {
            DType::U8 => 1,
            DType::I32 | DType::F32 => 4,
            DType::I64 | DType::F64 => 8,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DType::U8 => "u8",
            DType::I32 => "i32",
            DType::I64 => "i64",
            DType::F32 => "f32",
            DType::F64 => "f64",
        }
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Rust scalar types that can back an [`NdArray`]
pub trait Element: sealed::Sealed + Copy {
    const DTYPE: DType;

    fn write_le(self, out: &mut Vec<u8>);

    /// `bytes` is exactly `DTYPE.size()` long
    fn read_le(bytes: &[u8]) -> Self;
}

macro_rules! impl_element {
    ($ty:ty, $dtype:expr) => {
        impl sealed::Sealed for $ty {}

        impl Element for $ty {
            const DTYPE: DType = $dtype;

            fn write_le(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }

            fn read_le(bytes: &[u8]) -> Self {
                let mut buf = [0u8; std::mem::size_of::<$ty>()];
                buf.copy_from_slice(bytes);
                <$ty>::from_le_bytes(buf)
            }
        }
    };
}

impl_element!(u8, DType::U8);
impl_element!(i32, DType::I32);
impl_element!(i64, DType::I64);
impl_element!(f32, DType::F32);
impl_element!(f64, DType::F64);

/// Bytes needed for `shape` elements of `dtype`, `None` on overflow
fn byte_len(dtype: DType, shape: &[usize]) -> Option<usize> {
    shape
        .iter()
        .try_fold(dtype.size(), |acc, &dim| acc.checked_mul(dim))
}

/// A dense, row-major numeric array with explicit dtype and shape
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NdArray {
    dtype: DType,
    shape: Vec<usize>,
    /// Little-endian element bytes
    data: Vec<u8>,
}

impl NdArray {
    /// Create an array from raw little-endian bytes
    pub fn new(dtype: DType, shape: Vec<usize>, data: Vec<u8>) -> Result<Self> {
        let array = NdArray { dtype, shape, data };
        array.validate()?;
        Ok(array)
    }

    pub fn from_vec<T: Element>(shape: Vec<usize>, values: Vec<T>) -> Result<Self> {
        let mut data = Vec::with_capacity(values.len() * T::DTYPE.size());
        for v in values {
            v.write_le(&mut data);
        }
        NdArray::new(T::DTYPE, shape, data)
    }

    /// A one-dimensional array
    pub fn from_slice<T: Element>(values: &[T]) -> Self {
        let mut data = Vec::with_capacity(values.len() * T::DTYPE.size());
        for v in values {
            v.write_le(&mut data);
        }
        NdArray {
            dtype: T::DTYPE,
            shape: vec![values.len()],
            data,
        }
    }

    /// An all-zero array; fails when the shape's byte size overflows `usize`
    pub fn zeros(dtype: DType, shape: Vec<usize>) -> Result<Self> {
        let len = byte_len(dtype, &shape)
            .ok_or_else(|| Error::Deserialization(format!("array shape {:?} overflows", shape)))?;
        Ok(NdArray {
            dtype,
            data: vec![0u8; len],
            shape,
        })
    }

    /// Check the byte length against shape and dtype
    pub fn validate(&self) -> Result<()> {
        let expected = byte_len(self.dtype, &self.shape)
            .ok_or_else(|| Error::Deserialization("array shape overflows".into()))?;
        if expected != self.data.len() {
            return Err(Error::Deserialization(format!(
                "array of shape {:?} and dtype {} needs {} bytes, found {}",
                self.shape,
                self.dtype.name(),
                expected,
                self.data.len()
            )));
        }
        Ok(())
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.data.len() / self.dtype.size()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Copy the elements out as `T`, failing when `T` is not the stored dtype
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        if T::DTYPE != self.dtype {
            return Err(Error::Deserialization(format!(
                "array holds {}, requested {}",
                self.dtype.name(),
                T::DTYPE.name()
            )));
        }
        Ok(self
            .data
            .chunks_exact(self.dtype.size())
            .map(T::read_le)
            .collect())
    }

    fn elements_json(&self) -> Vec<serde_json::Value> {
        let size = self.dtype.size();
        self.data
            .chunks_exact(size)
            .map(|chunk| match self.dtype {
                DType::U8 => serde_json::Value::from(u8::read_le(chunk)),
                DType::I32 => serde_json::Value::from(i32::read_le(chunk)),
                DType::I64 => serde_json::Value::from(i64::read_le(chunk)),
                DType::F32 => serde_json::Value::from(f32::read_le(chunk)),
                DType::F64 => serde_json::Value::from(f64::read_le(chunk)),
            })
            .collect()
    }
}

impl fmt::Display for NdArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = serde_json::Value::Array(self.elements_json());
        write!(
            f,
            "array({}, dtype={}, shape={:?})",
            data,
            self.dtype.name(),
            self.shape
        )
    }
}

// === Conversions into Value ===

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(m: BTreeMap<String, Value>) -> Self {
        Value::Map(m)
    }
}

impl From<NdArray> for Value {
    fn from(a: NdArray) -> Self {
        Value::Array(a)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

// === Conversions out of Value ===

fn type_mismatch(expected: &str, found: &Value) -> Error {
    Error::Deserialization(format!(
        "expected {}, found {}",
        expected,
        found.type_name()
    ))
}

macro_rules! impl_try_from_value {
    ($ty:ty, $name:literal, $variant:ident) => {
        impl TryFrom<Value> for $ty {
            type Error = Error;

            fn try_from(value: Value) -> Result<Self> {
                match value {
                    Value::$variant(v) => Ok(v),
                    other => Err(type_mismatch($name, &other)),
                }
            }
        }
    };
}

impl_try_from_value!(bool, "bool", Bool);
impl_try_from_value!(i64, "int", Int);
impl_try_from_value!(f64, "float", Float);
impl_try_from_value!(String, "string", String);
impl_try_from_value!(Vec<u8>, "bytes", Bytes);
impl_try_from_value!(Vec<Value>, "list", List);
impl_try_from_value!(BTreeMap<String, Value>, "map", Map);
impl_try_from_value!(NdArray, "array", Array);
