use pgrx::prelude::*;
use pgrx::{AnyElement, Internal};

use crate::error::{MedianError, Result};
use crate::helpers::*;
use crate::state::MedianState;
use crate::value::{Kind, Value};

/// Aggregate sfunc for every `median(...)` overload.
///
/// The state is created lazily in the aggregate memory context on the first
/// call of a group, NULL inputs included, so an all-NULL group finalizes to
/// NULL instead of having no state at all. NULL values are otherwise skipped.
#[pg_extern(immutable, parallel_safe)]
pub unsafe fn median_transfn(
    internal: Internal,
    value: Option<AnyElement>,
    fcinfo: pg_sys::FunctionCallInfo,
) -> Internal {
    let agg_context = unsafe { aggregate_context(fcinfo, "median_transfn") }
        .unwrap_or_else(|e| raise(e));

    let ptr = match state_ptr(internal) {
        Some(ptr) => ptr,
        None => {
            pgrx::debug1!("pg_median: new aggregation state");
            unsafe { leak_into(agg_context, MedianState::new()) }
        }
    };

    if let Some(value) = value {
        let state = unsafe { &mut *ptr };
        if let Err(e) = unsafe { accept_element(state, &value) } {
            raise(e);
        }
    }

    into_internal(ptr)
}

/// Resolve the element's type, unbox it and insert it. Nothing touches the
/// state until the type is known to be supported.
unsafe fn accept_element(state: &mut MedianState, element: &AnyElement) -> Result<()> {
    let oid = u32::from(element.oid());
    let kind = Kind::from_type_oid(oid)?;
    let datum = element.datum();

    // pgrx hands NULL over as `None`, so from_datum only comes back empty if
    // the type tag does not describe the datum.
    let value = unsafe {
        match kind {
            Kind::Int8 => i64::from_datum(datum, false).map(Value::Int8),
            Kind::Int4 => i32::from_datum(datum, false).map(Value::Int4),
            Kind::Int2 => i16::from_datum(datum, false).map(Value::Int2),
            Kind::Float4 => f32::from_datum(datum, false).map(Value::Float4),
            Kind::Float8 => f64::from_datum(datum, false).map(Value::Float8),
            Kind::Text => String::from_datum(datum, false).map(Value::Text),
        }
    };

    match value {
        Some(value) => state.accept(value, kind),
        None => Err(MedianError::UnsupportedKind { oid }),
    }
}
