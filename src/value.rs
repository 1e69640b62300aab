use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{MedianError, Result};

// Type oids from pg_type.dat. These never change across PostgreSQL releases.
const INT8OID: u32 = 20;
const INT2OID: u32 = 21;
const INT4OID: u32 = 23;
const TEXTOID: u32 = 25;
const FLOAT4OID: u32 = 700;
const FLOAT8OID: u32 = 701;
const TIMESTAMPTZOID: u32 = 1184;

/// The representation an aggregation accumulates. One aggregation only ever holds one kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Kind {
    Int8,
    Int4,
    Int2,
    Float4,
    Float8,
    Text,
}

impl Kind {
    /// Resolve a host type oid. `timestamptz` is an int64 microsecond count and sorts as one.
    pub fn from_type_oid(oid: u32) -> Result<Kind> {
        match oid {
            INT8OID | TIMESTAMPTZOID => Ok(Kind::Int8),
            INT4OID => Ok(Kind::Int4),
            INT2OID => Ok(Kind::Int2),
            FLOAT4OID => Ok(Kind::Float4),
            FLOAT8OID => Ok(Kind::Float8),
            TEXTOID => Ok(Kind::Text),
            other => Err(MedianError::UnsupportedKind { oid: other }),
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Kind::Int8 => "int8",
            Kind::Int4 => "int4",
            Kind::Int2 => "int2",
            Kind::Float4 => "float4",
            Kind::Float8 => "float8",
            Kind::Text => "text",
        })
    }
}

/// A single accumulated input value.
///
/// Floats are serialized as their IEEE-754 bit patterns: JSON has no NaN or
/// infinity, and partial states must survive the trip between parallel workers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Int8(i64),
    Int4(i32),
    Int2(i16),
    Float4(#[serde(with = "f32_bits")] f32),
    Float8(#[serde(with = "f64_bits")] f64),
    Text(String),
}

impl Value {
    pub fn kind(&self) -> Kind {
        match self {
            Value::Int8(_) => Kind::Int8,
            Value::Int4(_) => Kind::Int4,
            Value::Int2(_) => Kind::Int2,
            Value::Float4(_) => Kind::Float4,
            Value::Float8(_) => Kind::Float8,
            Value::Text(_) => Kind::Text,
        }
    }

    /// Total order within one kind.
    ///
    /// Floats follow PostgreSQL's btree order: NaN sorts above every other
    /// value (including +Infinity) and all NaNs are equal; -0.0 equals 0.0.
    /// Text compares bytewise, which for UTF-8 is codepoint order.
    ///
    /// `accept` and `combine` reject mixed kinds before anything is compared,
    /// so the cross-kind arm only orders by kind.
    pub fn cmp_key(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Int8(a), Value::Int8(b)) => a.cmp(b),
            (Value::Int4(a), Value::Int4(b)) => a.cmp(b),
            (Value::Int2(a), Value::Int2(b)) => a.cmp(b),
            (Value::Float4(a), Value::Float4(b)) => float_cmp(f64::from(*a), f64::from(*b)),
            (Value::Float8(a), Value::Float8(b)) => float_cmp(*a, *b),
            (Value::Text(a), Value::Text(b)) => a.as_bytes().cmp(b.as_bytes()),
            (a, b) => a.kind().cmp(&b.kind()),
        }
    }
}

fn float_cmp(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b)
        .unwrap_or_else(|| a.is_nan().cmp(&b.is_nan()))
}

mod f32_bits {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &f32, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u32(v.to_bits())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f32, D::Error> {
        u32::deserialize(d).map(f32::from_bits)
    }
}

mod f64_bits {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &f64, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(v.to_bits())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        u64::deserialize(d).map(f64::from_bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oid_dispatch() {
        assert_eq!(Kind::from_type_oid(20), Ok(Kind::Int8));
        assert_eq!(Kind::from_type_oid(1184), Ok(Kind::Int8));
        assert_eq!(Kind::from_type_oid(23), Ok(Kind::Int4));
        assert_eq!(Kind::from_type_oid(21), Ok(Kind::Int2));
        assert_eq!(Kind::from_type_oid(700), Ok(Kind::Float4));
        assert_eq!(Kind::from_type_oid(701), Ok(Kind::Float8));
        assert_eq!(Kind::from_type_oid(25), Ok(Kind::Text));
    }

    #[test]
    fn test_numeric_is_unsupported() {
        // numeric
        assert_eq!(
            Kind::from_type_oid(1700),
            Err(MedianError::UnsupportedKind { oid: 1700 })
        );
    }

    #[test]
    fn test_nan_sorts_last() {
        let nan = Value::Float8(f64::NAN);
        let inf = Value::Float8(f64::INFINITY);
        assert_eq!(nan.cmp_key(&inf), Ordering::Greater);
        assert_eq!(inf.cmp_key(&nan), Ordering::Less);
        assert_eq!(nan.cmp_key(&Value::Float8(-f64::NAN)), Ordering::Equal);
        assert_eq!(
            Value::Float4(-0.0).cmp_key(&Value::Float4(0.0)),
            Ordering::Equal
        );
    }

    #[test]
    fn test_text_is_codepoint_order() {
        let a = Value::Text("Zebra".to_string());
        let b = Value::Text("apple".to_string());
        let c = Value::Text("äpfel".to_string());
        assert_eq!(a.cmp_key(&b), Ordering::Less);
        assert_eq!(b.cmp_key(&c), Ordering::Less);
    }

    #[test]
    fn test_float_bits_survive_json() {
        let values = vec![
            Value::Float8(f64::NAN),
            Value::Float8(f64::NEG_INFINITY),
            Value::Float4(f32::INFINITY),
        ];
        let bytes = serde_json::to_vec(&values).unwrap();
        let back: Vec<Value> = serde_json::from_slice(&bytes).unwrap();
        assert!(matches!(back[0], Value::Float8(v) if v.is_nan()));
        assert_eq!(back[1], Value::Float8(f64::NEG_INFINITY));
        assert_eq!(back[2], Value::Float4(f32::INFINITY));
    }
}
