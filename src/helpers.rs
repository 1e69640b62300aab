use pgrx::prelude::*;
use pgrx::{Internal, PgMemoryContexts};

use crate::error::{MedianError, Result};
use crate::state::MedianState;

/// Abort the current aggregation with a PostgreSQL ERROR.
pub fn raise(err: MedianError) -> ! {
    pgrx::error!("{}", err)
}

/// The memory context that lives exactly as long as the current aggregation group.
///
/// Fails with `InvalidContext` when `caller` was invoked outside an aggregate.
pub unsafe fn aggregate_context(
    fcinfo: pg_sys::FunctionCallInfo,
    caller: &'static str,
) -> Result<pg_sys::MemoryContext> {
    let mut agg_context: pg_sys::MemoryContext = std::ptr::null_mut();
    if unsafe { pg_sys::AggCheckCallContext(fcinfo, &mut agg_context) } == 0 {
        return Err(MedianError::InvalidContext(caller));
    }
    Ok(agg_context)
}

/// Move `state` into the aggregate memory context. It is dropped when that
/// context is reset or deleted, so neither the final function nor the host
/// ever frees it explicitly.
pub unsafe fn leak_into(
    agg_context: pg_sys::MemoryContext,
    state: MedianState,
) -> *mut MedianState {
    PgMemoryContexts::For(agg_context).leak_and_drop_on_delete(state)
}

pub fn state_ptr(internal: Internal) -> Option<*mut MedianState> {
    internal
        .unwrap()
        .map(|datum| datum.cast_mut_ptr::<MedianState>())
}

pub fn into_internal(ptr: *mut MedianState) -> Internal {
    Internal::from(Some(pg_sys::Datum::from(ptr as usize)))
}
