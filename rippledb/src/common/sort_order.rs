use crate::common::Value;

/// Direction of a sort key or an index key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    /// Reads a direction from a specifier value: `-1` means descending, any
    /// other value means ascending.
    pub fn from_value(value: &Value) -> SortOrder {
        match value.as_f64() {
            Some(v) if v < 0.0 => SortOrder::Descending,
            _ => SortOrder::Ascending,
        }
    }

    pub fn as_value(&self) -> Value {
        match self {
            SortOrder::Ascending => Value::I64(1),
            SortOrder::Descending => Value::I64(-1),
        }
    }

    pub fn apply(&self, ordering: std::cmp::Ordering) -> std::cmp::Ordering {
        match self {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        }
    }
}
