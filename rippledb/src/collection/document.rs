use crate::common::{write_json_string, Path, Value};
use indexmap::IndexMap;
use std::cmp::Ordering;
use std::fmt::{Debug, Display, Formatter};
use std::hash::{Hash, Hasher};

/// A schema-less record: an insertion-ordered map of field names to [Value]s.
///
/// Field order is preserved because it carries meaning for sort and index
/// specifiers (`{age: 1, name: -1}` sorts by `age` first). Equality, hashing
/// and ordering of documents ignore field order, so `{a: 1, b: 2}` and
/// `{b: 2, a: 1}` are the same document.
///
/// Dotted paths are not interpreted by [Document::get]; use
/// [Document::get_path] or the [Path] resolver for nested lookups.
///
/// # Examples
///
/// ```rust
/// use rippledb::doc;
/// use rippledb::common::Value;
///
/// let doc = doc! {
///     _id: "2342",
///     name: "hello",
///     address: { city: "London" },
///     tags: ["a", "b"],
/// };
/// assert_eq!(doc.get("name"), Some(&Value::from("hello")));
/// assert_eq!(doc.get_path("address.city"), Some(&Value::from("London")));
/// ```
#[derive(Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Document {
    data: IndexMap<String, Value>,
}

impl Document {
    pub fn new() -> Self {
        Document {
            data: IndexMap::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Document {
            data: IndexMap::with_capacity(capacity),
        }
    }

    /// Sets a field, returning the previous value if the field existed.
    ///
    /// An existing field keeps its position; a new field is appended.
    pub fn put<K: Into<String>, V: Into<Value>>(&mut self, key: K, value: V) -> Option<Value> {
        self.data.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.data.get_mut(key)
    }

    /// Resolves a dotted path such as `address.city` or `items.0.name`.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        Path::new(path).value(self)
    }

    /// Removes a field, keeping the relative order of the remaining fields.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.shift_remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.data.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.data.values()
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, String, Value> {
        self.data.iter()
    }

    pub fn iter_mut(&mut self) -> indexmap::map::IterMut<'_, String, Value> {
        self.data.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Returns the first field of the document, if any.
    pub fn first(&self) -> Option<(&String, &Value)> {
        self.data.first()
    }

    /// Returns a copy of this document without the named fields.
    pub fn without(&self, keys: &[&str]) -> Document {
        self.data
            .iter()
            .filter(|(k, _)| !keys.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Serializes the document to compact JSON text.
    pub fn to_json(&self) -> String {
        let mut out = String::new();
        self.write_json(&mut out);
        out
    }

    pub(crate) fn write_json(&self, out: &mut String) {
        out.push('{');
        for (i, (key, value)) in self.data.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            write_json_string(key, out);
            out.push(':');
            value.write_json(out);
        }
        out.push('}');
    }

    fn sorted_entries(&self) -> Vec<(&String, &Value)> {
        let mut entries: Vec<_> = self.data.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        // IndexMap equality ignores insertion order
        self.data == other.data
    }
}

impl Eq for Document {}

impl PartialOrd for Document {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Document {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sorted_entries().cmp(&other.sorted_entries())
    }
}

impl Hash for Document {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let entries = self.sorted_entries();
        entries.len().hash(state);
        for (key, value) in entries {
            key.hash(state);
            value.hash(state);
        }
    }
}

impl Debug for Document {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl Display for Document {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl FromIterator<(String, Value)> for Document {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Document {
            data: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Document {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.data.into_iter()
    }
}

impl<'a> IntoIterator for &'a Document {
    type Item = (&'a String, &'a Value);
    type IntoIter = indexmap::map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.data.iter()
    }
}

/// Strips the quotes `stringify!` leaves around string literal keys.
pub fn normalize(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        trimmed[1..trimmed.len() - 1].to_string()
    } else {
        trimmed.to_string()
    }
}

/// Builds a [Document] literal.
///
/// Keys may be identifiers or string literals (needed for operator keys such
/// as `"$gt"` and positional keys such as `"arr.$"`). Values may be nested
/// `{ ... }` documents, `[ ... ]` arrays or single-token expressions; wrap
/// anything longer, including negative numbers, in parentheses.
///
/// ```rust
/// use rippledb::doc;
///
/// let query = doc! { age: { "$gt": 11, "$lt": 20 } };
/// let update = doc! { "$pop": { items: (-1) } };
/// assert_eq!(query.len(), 1);
/// assert_eq!(update.len(), 1);
/// ```
#[macro_export]
macro_rules! doc {
    ({}) => {
        $crate::collection::Document::new()
    };

    () => {
        $crate::collection::Document::new()
    };

    ({ $($key:tt : $value:tt),* $(,)? }) => {
        $crate::doc!($($key : $value),*)
    };

    ($($key:tt : $value:tt),* $(,)?) => {
        {
            let mut doc = $crate::collection::Document::new();
            $(
                doc.put($crate::collection::normalize(stringify!($key)), $crate::doc_value!($value));
            )*
            doc
        }
    };
}

/// Converts a `doc!` value token into a [Value].
#[macro_export]
macro_rules! doc_value {
    ({ $($key:tt : $value:tt),* $(,)? }) => {
        $crate::common::Value::Document($crate::doc!{ $($key : $value),* })
    };

    ([ $($value:tt),* $(,)? ]) => {
        $crate::common::Value::Array(vec![$($crate::doc_value!($value)),*])
    };

    ($value:expr) => {
        $crate::common::Value::from($value)
    };
}

/// Builds a [Value::Array](crate::common::Value::Array) literal from the
/// value tokens `doc!` accepts.
///
/// ```rust
/// use rippledb::{array, doc};
///
/// let tags = array!["a", { weight: 2 }, [1, 2]];
/// let doc = doc! { tags: (tags.clone()) };
/// assert_eq!(doc.get("tags"), Some(&tags));
/// ```
#[macro_export]
macro_rules! array {
    ($($value:tt),* $(,)?) => {
        $crate::common::Value::Array(vec![$($crate::doc_value!($value)),*])
    };
}
