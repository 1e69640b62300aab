use thiserror::Error;

use crate::value::Kind;

pub type Result<T> = std::result::Result<T, MedianError>;

/// Everything that can abort a median aggregation.
#[derive(Error, Debug, PartialEq)]
pub enum MedianError {
    /// The input column type has no ordering we know how to accumulate.
    #[error("pg_median: unsupported input type (oid {oid}). Expected: int8, int4, int2, float4, float8, text, timestamptz")]
    UnsupportedKind { oid: u32 },

    /// A value of a different kind reached an aggregation already fixed to another kind.
    #[error("pg_median: type mismatch, aggregation holds {expected} values but received {found}")]
    KindMismatch { expected: Kind, found: Kind },

    /// A final function was attached to an aggregation of a different kind.
    #[error("pg_median: final function returns {requested} but the aggregation holds {stored} values")]
    ResultTypeMismatch { stored: Kind, requested: Kind },

    #[error("pg_median: {0} called in non-aggregate context")]
    InvalidContext(&'static str),

    #[error("pg_median: out of memory growing the sorted value list past {count} values")]
    ResourceExhausted { count: u64 },

    /// A serialized partial state from a parallel worker could not be decoded.
    #[error("pg_median: corrupt serialized state: {0}")]
    Corrupt(String),
}
