use crate::state::MedianState;
use crate::value::Value;

/// Zero-based position of the reported median: `floor(count / 2)`.
///
/// For an even count this is the upper of the two middle elements. The two
/// are never averaged, so text and integer medians are always values that
/// actually occurred in the input.
pub fn median_index(count: u64) -> usize {
    (count / 2) as usize
}

/// The median of a finished aggregation, or `None` when no value was accepted.
///
/// Reads only; calling it any number of times gives the same answer.
pub fn finalize(state: &MedianState) -> Option<&Value> {
    if state.is_empty() {
        return None;
    }
    state.values().get(median_index(state.count()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Kind;

    fn state_of(kind: Kind, vals: Vec<Value>) -> MedianState {
        let mut state = MedianState::new();
        for v in vals {
            state.accept(v, kind).unwrap();
        }
        state
    }

    #[test]
    fn test_median_index() {
        assert_eq!(median_index(1), 0);
        assert_eq!(median_index(3), 1);
        assert_eq!(median_index(4), 2);
        assert_eq!(median_index(5), 2);
    }

    #[test]
    fn test_odd_count() {
        let state = state_of(
            Kind::Int8,
            vec![Value::Int8(5), Value::Int8(1), Value::Int8(3)],
        );
        assert_eq!(finalize(&state), Some(&Value::Int8(3)));
    }

    #[test]
    fn test_even_count_takes_upper_middle() {
        let state = state_of(
            Kind::Int2,
            vec![Value::Int2(1), Value::Int2(2), Value::Int2(3), Value::Int2(4)],
        );
        assert_eq!(finalize(&state), Some(&Value::Int2(3)));

        let floats = state_of(
            Kind::Float8,
            vec![Value::Float8(4.0), Value::Float8(1.0), Value::Float8(2.0), Value::Float8(3.0)],
        );
        assert_eq!(finalize(&floats), Some(&Value::Float8(3.0)));
    }

    #[test]
    fn test_empty_is_absent() {
        assert_eq!(finalize(&MedianState::new()), None);
    }

    #[test]
    fn test_text_median() {
        let state = state_of(
            Kind::Text,
            ["banana", "apple", "cherry"]
                .iter()
                .map(|s| Value::Text(s.to_string()))
                .collect(),
        );
        assert_eq!(finalize(&state), Some(&Value::Text("banana".to_string())));
    }

    #[test]
    fn test_single_value_of_every_kind() {
        let singles = [
            (Kind::Int8, Value::Int8(-7)),
            (Kind::Int4, Value::Int4(42)),
            (Kind::Int2, Value::Int2(3)),
            (Kind::Float4, Value::Float4(0.25)),
            (Kind::Float8, Value::Float8(1e300)),
            (Kind::Text, Value::Text(String::new())),
        ];
        for (kind, v) in singles {
            let state = state_of(kind, vec![v.clone()]);
            assert_eq!(finalize(&state), Some(&v));
        }
    }

    #[test]
    fn test_finalize_is_idempotent() {
        let state = state_of(
            Kind::Int4,
            vec![Value::Int4(10), Value::Int4(30), Value::Int4(20)],
        );
        let first = finalize(&state).cloned();
        let second = finalize(&state).cloned();
        assert_eq!(first, second);
        assert_eq!(state.count(), 3);
    }
}
