use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::{MedianError, Result};
use crate::value::{Kind, Value};

/// Native Rust state for the median aggregate: every non-null value seen so
/// far, kept sorted, plus the running count.
///
/// Invariants between calls: `values` is non-decreasing under
/// [`Value::cmp_key`], `count == values.len()`, and every value has `kind`.
/// A failed `accept` or `combine` leaves the state untouched.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct MedianState {
    kind: Option<Kind>,
    count: u64,
    values: Vec<Value>,
}

impl MedianState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// The kind fixed by the first accepted value, if any.
    pub fn kind(&self) -> Option<Kind> {
        self.kind
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Insert one value at the position that keeps `values` sorted.
    ///
    /// Equal values land after every existing equal value, so ties keep
    /// their arrival order.
    pub fn accept(&mut self, value: Value, kind: Kind) -> Result<()> {
        if value.kind() != kind {
            return Err(MedianError::KindMismatch {
                expected: kind,
                found: value.kind(),
            });
        }
        self.check_kind(kind)?;
        self.values
            .try_reserve(1)
            .map_err(|_| MedianError::ResourceExhausted { count: self.count })?;

        if self.values.is_empty() {
            self.values.push(value);
        } else {
            let pos = self
                .values
                .partition_point(|v| v.cmp_key(&value) != Ordering::Greater);
            self.values.insert(pos, value);
        }

        self.kind = Some(kind);
        self.count += 1;
        Ok(())
    }

    /// Merge another partial state into this one (parallel aggregation).
    ///
    /// On ties, values already in `self` stay ahead of values from `other`.
    pub fn combine(&mut self, other: MedianState) -> Result<()> {
        let Some(kind) = other.kind else {
            return Ok(());
        };
        self.check_kind(kind)?;

        let mut merged = Vec::new();
        merged
            .try_reserve_exact(self.values.len() + other.values.len())
            .map_err(|_| MedianError::ResourceExhausted { count: self.count })?;

        let mut left = std::mem::take(&mut self.values).into_iter().peekable();
        let mut right = other.values.into_iter().peekable();
        loop {
            let take_left = match (left.peek(), right.peek()) {
                (Some(l), Some(r)) => l.cmp_key(r) != Ordering::Greater,
                (Some(_), None) => true,
                (None, Some(_)) => false,
                (None, None) => break,
            };
            let next = if take_left { left.next() } else { right.next() };
            merged.extend(next);
        }

        self.values = merged;
        self.kind = Some(kind);
        self.count += other.count;
        Ok(())
    }

    /// Check the invariants of a state that arrived from outside this process.
    pub fn validate(&self) -> Result<()> {
        if self.count != self.values.len() as u64 {
            return Err(MedianError::Corrupt(format!(
                "count {} does not match {} stored values",
                self.count,
                self.values.len()
            )));
        }
        if let Some(v) = self.values.iter().find(|v| Some(v.kind()) != self.kind) {
            return Err(MedianError::Corrupt(format!(
                "{} value in a {} state",
                v.kind(),
                self.kind.map_or("kindless".to_string(), |k| k.to_string())
            )));
        }
        if self
            .values
            .windows(2)
            .any(|w| w[0].cmp_key(&w[1]) == Ordering::Greater)
        {
            return Err(MedianError::Corrupt("values out of order".to_string()));
        }
        Ok(())
    }

    fn check_kind(&self, kind: Kind) -> Result<()> {
        match self.kind {
            Some(expected) if expected != kind => Err(MedianError::KindMismatch {
                expected,
                found: kind,
            }),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(vals: &[i32]) -> MedianState {
        let mut state = MedianState::new();
        for v in vals {
            state.accept(Value::Int4(*v), Kind::Int4).unwrap();
        }
        state
    }

    fn as_i32(state: &MedianState) -> Vec<i32> {
        state
            .values()
            .iter()
            .map(|v| match v {
                Value::Int4(i) => *i,
                other => panic!("unexpected {other:?}"),
            })
            .collect()
    }

    #[test]
    fn test_new_state_is_empty() {
        let state = MedianState::new();
        assert!(state.is_empty());
        assert_eq!(state.count(), 0);
        assert_eq!(state.kind(), None);
        assert!(state.values().is_empty());
    }

    #[test]
    fn test_sorted_after_every_accept() {
        let mut state = MedianState::new();
        for (i, v) in [9, -4, 7, 7, 0, 12, -4, 3].into_iter().enumerate() {
            state.accept(Value::Int4(v), Kind::Int4).unwrap();
            let seen = as_i32(&state);
            assert!(seen.windows(2).all(|w| w[0] <= w[1]), "unsorted: {seen:?}");
            assert_eq!(state.count(), i as u64 + 1);
            assert_eq!(state.count(), state.values().len() as u64);
        }
    }

    #[test]
    fn test_ties_keep_arrival_order() {
        // Same shape as [3, 1, 3, 2, 3]; the "3"s are +0.0, -0.0, +0.0, which
        // compare equal but keep their sign bit as an origin marker.
        let mut state = MedianState::new();
        for v in [0.0, -2.0, -0.0, -1.0, 0.0] {
            state.accept(Value::Float8(v), Kind::Float8).unwrap();
        }
        let signs: Vec<bool> = state
            .values()
            .iter()
            .map(|v| match v {
                Value::Float8(f) => f.is_sign_negative(),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(signs, vec![true, true, false, true, false]);
    }

    #[test]
    fn test_nan_goes_to_the_tail() {
        let mut state = MedianState::new();
        for v in [f32::NAN, 1.0, f32::INFINITY, -3.5] {
            state.accept(Value::Float4(v), Kind::Float4).unwrap();
        }
        assert_eq!(state.values()[0], Value::Float4(-3.5));
        assert_eq!(state.values()[2], Value::Float4(f32::INFINITY));
        assert!(matches!(state.values()[3], Value::Float4(v) if v.is_nan()));
    }

    #[test]
    fn test_mismatched_value_is_rejected() {
        let mut state = ints(&[1, 2]);
        let err = state
            .accept(Value::Float8(1.5), Kind::Float8)
            .unwrap_err();
        assert_eq!(
            err,
            MedianError::KindMismatch {
                expected: Kind::Int4,
                found: Kind::Float8
            }
        );
        assert_eq!(state.count(), 2);
        assert_eq!(as_i32(&state), vec![1, 2]);
    }

    #[test]
    fn test_value_must_match_declared_kind() {
        let mut state = MedianState::new();
        let err = state.accept(Value::Int2(1), Kind::Int8).unwrap_err();
        assert!(matches!(err, MedianError::KindMismatch { .. }));
        assert!(state.is_empty());
        assert_eq!(state.kind(), None);
    }

    #[test]
    fn test_unsupported_kind_leaves_state_alone() {
        let mut state = ints(&[4, 2]);
        let res = Kind::from_type_oid(1700).and_then(|kind| state.accept(Value::Int4(1), kind));
        assert_eq!(res, Err(MedianError::UnsupportedKind { oid: 1700 }));
        assert_eq!(state.count(), 2);
        assert_eq!(as_i32(&state), vec![2, 4]);
    }

    #[test]
    fn test_combine_merges_sorted() {
        let mut a = ints(&[5, 1, 9]);
        let b = ints(&[2, 9, 0, 7]);
        a.combine(b).unwrap();
        assert_eq!(as_i32(&a), vec![0, 1, 2, 5, 7, 9, 9]);
        assert_eq!(a.count(), 7);
        a.validate().unwrap();
    }

    #[test]
    fn test_combine_with_empty_sides() {
        let mut a = MedianState::new();
        a.combine(ints(&[3, 1])).unwrap();
        assert_eq!(as_i32(&a), vec![1, 3]);
        assert_eq!(a.kind(), Some(Kind::Int4));

        a.combine(MedianState::new()).unwrap();
        assert_eq!(a.count(), 2);
    }

    #[test]
    fn test_combine_rejects_mixed_kinds() {
        let mut a = ints(&[1]);
        let mut b = MedianState::new();
        b.accept(Value::Text("x".to_string()), Kind::Text).unwrap();
        assert!(matches!(
            a.combine(b),
            Err(MedianError::KindMismatch { .. })
        ));
        assert_eq!(as_i32(&a), vec![1]);
    }

    #[test]
    fn test_validate_catches_corruption() {
        let bad: MedianState = serde_json::from_str(
            r#"{"kind":"Int8","count":2,"values":[{"Int8":5},{"Int8":1}]}"#,
        )
        .unwrap();
        assert!(matches!(bad.validate(), Err(MedianError::Corrupt(_))));

        let miscounted: MedianState =
            serde_json::from_str(r#"{"kind":"Int8","count":3,"values":[{"Int8":1}]}"#).unwrap();
        assert!(matches!(miscounted.validate(), Err(MedianError::Corrupt(_))));
    }
}
