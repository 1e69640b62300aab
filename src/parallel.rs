use pgrx::prelude::*;
use pgrx::Internal;

use crate::error::MedianError;
use crate::helpers::*;
use crate::state::MedianState;

/// Combine two partial aggregate states (for parallel aggregation).
/// NOT STRICT: must handle NULL inputs from empty worker partitions.
///
/// state1 is extended in place and returned; state2 is emptied. Both live in
/// the aggregate memory context, which frees them.
#[pg_extern(immutable, parallel_safe)]
pub unsafe fn median_combine(
    state1: Internal,
    state2: Internal,
    fcinfo: pg_sys::FunctionCallInfo,
) -> Internal {
    let agg_context = unsafe { aggregate_context(fcinfo, "median_combine") }
        .unwrap_or_else(|e| raise(e));

    let target = match state_ptr(state1) {
        Some(p) => p,
        None => unsafe { leak_into(agg_context, MedianState::new()) },
    };

    if let Some(p2) = state_ptr(state2) {
        let s1 = unsafe { &mut *target };
        let s2 = std::mem::take(unsafe { &mut *p2 });
        pgrx::debug1!(
            "pg_median: combining partial states of {} and {} values",
            s1.count(),
            s2.count()
        );
        if let Err(e) = s1.combine(s2) {
            raise(e);
        }
    }

    into_internal(target)
}

/// Serialize aggregate state to bytes for cross-worker IPC.
/// Borrows state (does NOT free) — PG may call this multiple times.
#[pg_extern(immutable, parallel_safe)]
pub fn median_serial(internal: Internal) -> Vec<u8> {
    let result = match state_ptr(internal) {
        Some(ptr) => serde_json::to_vec(unsafe { &*ptr }),
        None => serde_json::to_vec(&MedianState::new()),
    };
    result.unwrap_or_else(|e| raise(MedianError::Corrupt(e.to_string())))
}

/// Deserialize aggregate state from bytes received from a worker.
/// The second `Internal` argument is required by PG but unused.
#[pg_extern(immutable, parallel_safe, strict)]
pub unsafe fn median_deserial(
    bytes: Vec<u8>,
    _internal: Internal,
    fcinfo: pg_sys::FunctionCallInfo,
) -> Internal {
    let agg_context = unsafe { aggregate_context(fcinfo, "median_deserial") }
        .unwrap_or_else(|e| raise(e));

    let state: MedianState = serde_json::from_slice(&bytes)
        .unwrap_or_else(|e| raise(MedianError::Corrupt(e.to_string())));
    if let Err(e) = state.validate() {
        raise(e);
    }

    into_internal(unsafe { leak_into(agg_context, state) })
}
