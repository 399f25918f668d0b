use crate::common::{is_operator_document, Value};
use crate::query::QueryOperator;
use std::cmp::Ordering;

/// The part of a query test an index can answer from its keys alone.
///
/// Only tests on plain scalars (booleans, numbers, strings) are answerable:
/// equality, `$eq`, `$in` and any combination of `$gt`, `$gte`, `$lt` and
/// `$lte`. Tests on `null`, documents or arrays carry matching rules of their
/// own and are left to the residual scan.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyBounds {
    Equals(Value),
    AnyOf(Vec<Value>),
    Range {
        lower: Option<(Value, bool)>,
        upper: Option<(Value, bool)>,
    },
}

impl KeyBounds {
    /// Reads the bounds out of the value a query assigns to a path.
    pub fn from_test(test: &Value) -> Option<KeyBounds> {
        if is_key_scalar(test) {
            return Some(KeyBounds::Equals(test.clone()));
        }

        let Value::Document(operators) = test else {
            return None;
        };
        if !is_operator_document(operators) {
            return None;
        }

        let mut lower = None;
        let mut upper = None;
        for (key, operand) in operators.iter() {
            let operator = QueryOperator::from_key(key)?;
            if !operator.is_index_bound() {
                return None;
            }

            match operator {
                QueryOperator::Eq | QueryOperator::In if operators.len() > 1 => return None,
                QueryOperator::Eq => {
                    return is_key_scalar(operand).then(|| KeyBounds::Equals(operand.clone()));
                }
                QueryOperator::In => {
                    let items = operand.as_array()?;
                    return items
                        .iter()
                        .all(is_key_scalar)
                        .then(|| KeyBounds::AnyOf(items.clone()));
                }
                QueryOperator::Gt | QueryOperator::Gte if is_key_scalar(operand) => {
                    lower = Some((operand.clone(), operator == QueryOperator::Gte));
                }
                QueryOperator::Lt | QueryOperator::Lte if is_key_scalar(operand) => {
                    upper = Some((operand.clone(), operator == QueryOperator::Lte));
                }
                _ => return None,
            }
        }

        Some(KeyBounds::Range { lower, upper })
    }

    /// Tests a stored key component the way the query matcher would.
    pub fn contains(&self, value: &Value) -> bool {
        match self {
            KeyBounds::Equals(expected) => value == expected,
            KeyBounds::AnyOf(items) => items.iter().any(|item| item == value),
            KeyBounds::Range { lower, upper } => {
                let above = lower.as_ref().map_or(true, |(bound, inclusive)| {
                    match value.compare_relational(bound) {
                        Some(Ordering::Greater) => true,
                        Some(Ordering::Equal) => *inclusive,
                        _ => false,
                    }
                });
                let below = upper.as_ref().map_or(true, |(bound, inclusive)| {
                    match value.compare_relational(bound) {
                        Some(Ordering::Less) => true,
                        Some(Ordering::Equal) => *inclusive,
                        _ => false,
                    }
                });
                above && below
            }
        }
    }

    /// Keys to start scanning an ordered structure from, in ascending order.
    /// `None` means scanning has to start from the smallest key.
    pub fn seeds(&self) -> Option<Vec<Value>> {
        match self {
            KeyBounds::Equals(value) => Some(vec![value.clone()]),
            KeyBounds::AnyOf(items) => {
                let mut items = items.clone();
                items.sort();
                items.dedup();
                Some(items)
            }
            KeyBounds::Range { lower: Some((bound, _)), .. } => Some(vec![bound.clone()]),
            KeyBounds::Range { lower: None, .. } => None,
        }
    }

    /// Whether scanning in ascending key order can stop at `value`.
    pub fn is_past(&self, value: &Value) -> bool {
        match self {
            KeyBounds::Equals(expected) => value > expected,
            KeyBounds::AnyOf(_) => false,
            KeyBounds::Range { lower, upper } => {
                let beyond_upper = upper
                    .as_ref()
                    .is_some_and(|(bound, _)| value.compare_relational(bound) == Some(Ordering::Greater));
                // keys of a later type than the lower bound can never match
                let beyond_type = lower
                    .as_ref()
                    .is_some_and(|(bound, _)| value.compare_relational(bound).is_none() && value > bound);
                beyond_upper || beyond_type
            }
        }
    }
}

fn is_key_scalar(value: &Value) -> bool {
    matches!(value, Value::Bool(_) | Value::I64(_) | Value::F64(_) | Value::String(_))
}
