use crate::collection::Document;
use crate::common::{ReadExecutor, Value};
use crate::FIELD_SEPARATOR;

/// A leaf of a nested specifier together with the dotted path leading to it.
#[derive(Debug, Clone, PartialEq)]
pub struct PathValue {
    pub path: String,
    pub value: Value,
}

/// Resolves dotted field paths (`address.city`, `items.0.name`) against
/// nested documents.
///
/// Resolution never fails: a path that runs into a missing field, or that
/// tries to continue past a scalar, simply yields nothing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Path {
    path: String,
    parts: Vec<String>,
}

impl Path {
    pub fn new(path: &str) -> Self {
        let separator = FIELD_SEPARATOR.read_with(|it| it.clone());
        let parts = path.split(separator.as_str()).map(|s| s.to_string()).collect();
        Path {
            path: path.to_string(),
            parts,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    /// Resolves the path against a document.
    ///
    /// Numeric segments index into arrays. Descending stops with `None` as
    /// soon as an intermediate value is not a container.
    pub fn value<'a>(&self, document: &'a Document) -> Option<&'a Value> {
        let (first, rest) = self.parts.split_first()?;
        let mut current = document.get(first)?;
        for part in rest {
            current = step(current, part)?;
        }
        Some(current)
    }

    /// Resolves the path against an arbitrary value rather than a document.
    pub fn value_in<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        let mut current = value;
        for part in &self.parts {
            current = step(current, part)?;
        }
        Some(current)
    }

    /// Resolves the path with array fan-out.
    ///
    /// Arrays met on the way are traversed element by element, and an array
    /// found at the end of the path contributes each of its elements. This is
    /// the set of keys a multikey index stores for a document.
    pub fn values<'a>(&self, document: &'a Document) -> Vec<&'a Value> {
        let mut out = Vec::new();
        if let Some((first, rest)) = self.parts.split_first() {
            if let Some(value) = document.get(first) {
                collect_values(value, rest, &mut out);
            }
        }
        out
    }

    /// Flattens a nested specifier such as `{name: 1, address: {city: -1}}`
    /// into its leaves, in field order: `[name => 1, address.city => -1]`.
    ///
    /// A nested document made only of `$` operators is a leaf.
    pub fn parse(spec: &Document) -> Vec<PathValue> {
        let separator = FIELD_SEPARATOR.read_with(|it| it.clone());
        let mut out = Vec::new();
        parse_into(spec, "", &separator, &mut out);
        out
    }

    /// Returns the first leaf of a specifier, for single-key shapes like `{field: 1}`.
    pub fn parse_single(spec: &Document) -> Option<PathValue> {
        Path::parse(spec).into_iter().next()
    }

    /// Counts the leaf keys of a nested specifier.
    pub fn count_keys(spec: &Document) -> usize {
        spec.iter()
            .map(|(_, value)| match value {
                Value::Document(doc) if !doc.is_empty() && !is_operator_document(doc) => {
                    Path::count_keys(doc)
                }
                _ => 1,
            })
            .sum()
    }
}

/// Returns `true` when every key of the document is a `$` operator.
pub fn is_operator_document(document: &Document) -> bool {
    !document.is_empty() && document.keys().all(|k| k.starts_with('$'))
}

fn step<'a>(value: &'a Value, part: &str) -> Option<&'a Value> {
    match value {
        Value::Document(doc) => doc.get(part),
        Value::Array(arr) => part.parse::<usize>().ok().and_then(|i| arr.get(i)),
        _ => None,
    }
}

fn collect_values<'a>(value: &'a Value, rest: &[String], out: &mut Vec<&'a Value>) {
    match rest.split_first() {
        None => match value {
            Value::Array(arr) => out.extend(arr.iter()),
            other => out.push(other),
        },
        Some((part, tail)) => match value {
            Value::Document(doc) => {
                if let Some(next) = doc.get(part) {
                    collect_values(next, tail, out);
                }
            }
            Value::Array(arr) => match part.parse::<usize>() {
                Ok(index) => {
                    if let Some(next) = arr.get(index) {
                        collect_values(next, tail, out);
                    }
                }
                Err(_) => {
                    for element in arr {
                        if element.is_document() {
                            collect_values(element, rest, out);
                        }
                    }
                }
            },
            _ => {}
        },
    }
}

fn parse_into(spec: &Document, prefix: &str, separator: &str, out: &mut Vec<PathValue>) {
    for (key, value) in spec.iter() {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}{}{}", prefix, separator, key)
        };

        match value {
            Value::Document(doc) if !doc.is_empty() && !is_operator_document(doc) => {
                parse_into(doc, &path, separator, out)
            }
            other => out.push(PathValue {
                path,
                value: other.clone(),
            }),
        }
    }
}
