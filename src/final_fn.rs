use pgrx::datum::TimestampWithTimeZone;
use pgrx::prelude::*;
use pgrx::Internal;

use crate::error::MedianError;
use crate::helpers::*;
use crate::median;
use crate::value::{Kind, Value};

/// Shared body of the finalfuncs: read the median without consuming the
/// state, then unbox it as the overload's result type.
///
/// NULL when the group never produced a state or accepted no values.
unsafe fn median_as<T>(
    internal: Internal,
    fcinfo: pg_sys::FunctionCallInfo,
    caller: &'static str,
    want: Kind,
    unbox: impl FnOnce(&Value) -> Option<T>,
) -> Option<T> {
    if let Err(e) = unsafe { aggregate_context(fcinfo, caller) } {
        raise(e);
    }
    let ptr = state_ptr(internal)?;
    let state = unsafe { &*ptr };
    let value = median::finalize(state)?;
    match unbox(value) {
        Some(v) => Some(v),
        None => raise(MedianError::ResultTypeMismatch {
            stored: value.kind(),
            requested: want,
        }),
    }
}

#[pg_extern(immutable, parallel_safe)]
pub unsafe fn median_final_int8(
    internal: Internal,
    fcinfo: pg_sys::FunctionCallInfo,
) -> Option<i64> {
    let unbox = |v: &Value| match v {
        Value::Int8(i) => Some(*i),
        _ => None,
    };
    unsafe { median_as(internal, fcinfo, "median_final_int8", Kind::Int8, unbox) }
}

#[pg_extern(immutable, parallel_safe)]
pub unsafe fn median_final_int4(
    internal: Internal,
    fcinfo: pg_sys::FunctionCallInfo,
) -> Option<i32> {
    let unbox = |v: &Value| match v {
        Value::Int4(i) => Some(*i),
        _ => None,
    };
    unsafe { median_as(internal, fcinfo, "median_final_int4", Kind::Int4, unbox) }
}

#[pg_extern(immutable, parallel_safe)]
pub unsafe fn median_final_int2(
    internal: Internal,
    fcinfo: pg_sys::FunctionCallInfo,
) -> Option<i16> {
    let unbox = |v: &Value| match v {
        Value::Int2(i) => Some(*i),
        _ => None,
    };
    unsafe { median_as(internal, fcinfo, "median_final_int2", Kind::Int2, unbox) }
}

#[pg_extern(immutable, parallel_safe)]
pub unsafe fn median_final_float4(
    internal: Internal,
    fcinfo: pg_sys::FunctionCallInfo,
) -> Option<f32> {
    let unbox = |v: &Value| match v {
        Value::Float4(f) => Some(*f),
        _ => None,
    };
    unsafe { median_as(internal, fcinfo, "median_final_float4", Kind::Float4, unbox) }
}

#[pg_extern(immutable, parallel_safe)]
pub unsafe fn median_final_float8(
    internal: Internal,
    fcinfo: pg_sys::FunctionCallInfo,
) -> Option<f64> {
    let unbox = |v: &Value| match v {
        Value::Float8(f) => Some(*f),
        _ => None,
    };
    unsafe { median_as(internal, fcinfo, "median_final_float8", Kind::Float8, unbox) }
}

#[pg_extern(immutable, parallel_safe)]
pub unsafe fn median_final_text(
    internal: Internal,
    fcinfo: pg_sys::FunctionCallInfo,
) -> Option<String> {
    let unbox = |v: &Value| match v {
        Value::Text(s) => Some(s.clone()),
        _ => None,
    };
    unsafe { median_as(internal, fcinfo, "median_final_text", Kind::Text, unbox) }
}

/// timestamptz is accumulated as its raw int64 microsecond count.
#[pg_extern(immutable, parallel_safe)]
pub unsafe fn median_final_timestamptz(
    internal: Internal,
    fcinfo: pg_sys::FunctionCallInfo,
) -> Option<TimestampWithTimeZone> {
    let unbox = |v: &Value| match v {
        Value::Int8(i) => Some(*i),
        _ => None,
    };
    let micros =
        unsafe { median_as(internal, fcinfo, "median_final_timestamptz", Kind::Int8, unbox) }?;
    unsafe { TimestampWithTimeZone::from_datum(pg_sys::Datum::from(micros), false) }
}
