use crate::collection::{Document, UpdateOptions};
use crate::common::{Path, ReadExecutor, Value, EACH_KEY, INDEX_KEY, POSITIONAL_MARKER, POSITION_KEY};
use crate::errors::{ErrorKind, RippleError, RippleResult};
use crate::query::ValueMatcher;
use crate::update::UpdateOperator;
use crate::FIELD_SEPARATOR;

/// Applies `update` to `document` and reports whether any field changed.
///
/// `query` is the query that selected the document. Positional keys
/// (`"items.$"`) use the part of it addressing the same array to pick the
/// elements they update.
///
/// ```rust
/// use rippledb::doc;
/// use rippledb::collection::UpdateOptions;
/// use rippledb::update::apply_update;
///
/// let mut document = doc! { name: "Jim", tags: ["a"], visits: 1 };
/// let update = doc! { "$push": { tags: "b" }, "$inc": { visits: 2 } };
/// let changed = apply_update(&mut document, &update, &doc! {}, &UpdateOptions::default()).unwrap();
/// assert!(changed);
/// assert_eq!(document, doc! { name: "Jim", tags: ["a", "b"], visits: 3 });
/// ```
pub fn apply_update(
    document: &mut Document,
    update: &Document,
    query: &Document,
    options: &UpdateOptions,
) -> RippleResult<bool> {
    UpdateInterpreter::new(query, options).apply(document, update)
}

/// Walks an update document and writes it into a target document.
///
/// Plain keys deep-merge: nested documents are merged key by key, any array
/// on either side is replaced wholesale, except that a document written onto
/// an array of documents is merged into every element. Operator keys switch
/// the walk into that operator for their whole operand.
pub struct UpdateInterpreter<'a> {
    query: &'a Document,
    options: &'a UpdateOptions,
    separator: String,
}

impl<'a> UpdateInterpreter<'a> {
    pub fn new(query: &'a Document, options: &'a UpdateOptions) -> Self {
        UpdateInterpreter {
            query,
            options,
            separator: FIELD_SEPARATOR.read_with(|it| it.clone()),
        }
    }

    pub fn apply(&self, document: &mut Document, update: &Document) -> RippleResult<bool> {
        self.apply_level(document, update, "", None)
    }

    fn apply_level(
        &self,
        document: &mut Document,
        update: &Document,
        path: &str,
        operator: Option<UpdateOperator>,
    ) -> RippleResult<bool> {
        let mut changed = false;

        for (key, value) in update.iter() {
            if key.starts_with('$') {
                if key == INDEX_KEY {
                    continue;
                }

                let nested = UpdateOperator::from_key(key)
                    .ok_or_else(|| malformed(&format!("Unknown update operator {}", key)))?;
                let operand = value.as_document().ok_or_else(|| {
                    malformed(&format!("Operand of {} must be a document, found {}", key, value))
                })?;
                changed |= self.apply_level(document, operand, path, Some(nested))?;
                continue;
            }

            if let Some(field) = self.positional_field(key) {
                changed |= self.apply_positional(document, field, value, path, operator)?;
                continue;
            }

            let child_path = self.join(path, key);
            changed |= match operator {
                None => self.merge_field(document, key, value, &child_path)?,
                Some(operator) => {
                    self.apply_operator(document, key, value, update, &child_path, operator)?
                }
            };
        }

        Ok(changed)
    }

    fn positional_field<'k>(&self, key: &'k str) -> Option<&'k str> {
        key.strip_suffix(POSITIONAL_MARKER)
            .and_then(|rest| rest.strip_suffix(self.separator.as_str()))
            .filter(|field| !field.is_empty())
    }

    fn join(&self, path: &str, key: &str) -> String {
        if path.is_empty() {
            key.to_string()
        } else {
            format!("{}{}{}", path, self.separator, key)
        }
    }

    /// Finds the test the original query applies to the array at `path`.
    ///
    /// Both the nested form `{items: {sku: 1}}` and the dotted form
    /// `{"items.sku": 1}` are recognised. `None` means every element.
    fn positional_test(&self, path: &str) -> Option<Value> {
        if let Some(value) = Path::new(path).value(self.query) {
            return Some(value.clone());
        }

        let prefix = format!("{}{}", path, self.separator);
        let mut test = Document::new();
        for (key, value) in self.query.iter() {
            if let Some(rest) = key.strip_prefix(prefix.as_str()) {
                test.put(rest, value.clone());
            }
        }

        if test.is_empty() {
            None
        } else {
            Some(Value::Document(test))
        }
    }

    fn apply_positional(
        &self,
        document: &mut Document,
        field: &str,
        update: &Value,
        path: &str,
        operator: Option<UpdateOperator>,
    ) -> RippleResult<bool> {
        let field_path = self.join(path, field);
        let matcher = match self.positional_test(&field_path) {
            Some(test) => Some(ValueMatcher::parse(&test)?),
            None => None,
        };

        let Some(Value::Array(elements)) = document.get_mut(field) else {
            return Ok(false);
        };

        let mut changed = false;
        for element in elements.iter_mut() {
            let selected = matcher.as_ref().map_or(true, |m| m.matches(element));
            if selected {
                changed |= self.apply_to_element(element, update, &field_path, operator)?;
            }
        }
        Ok(changed)
    }

    fn apply_to_element(
        &self,
        element: &mut Value,
        update: &Value,
        path: &str,
        operator: Option<UpdateOperator>,
    ) -> RippleResult<bool> {
        if let (Value::Document(target), Value::Document(update)) = (&mut *element, update) {
            return self.apply_level(target, update, path, operator);
        }

        match operator {
            None => {
                if *element == *update {
                    Ok(false)
                } else {
                    *element = update.clone();
                    Ok(true)
                }
            }
            Some(operator) => {
                // scalar elements have no key of their own, so the operator
                // is applied through a single-entry holder
                let mut holder = Document::new();
                holder.put(POSITIONAL_MARKER, element.take());
                let result = self.apply_operator(
                    &mut holder,
                    POSITIONAL_MARKER,
                    update,
                    &Document::new(),
                    path,
                    operator,
                );
                *element = holder.remove(POSITIONAL_MARKER).unwrap_or_default();
                result
            }
        }
    }

    fn merge_field(
        &self,
        document: &mut Document,
        key: &str,
        value: &Value,
        path: &str,
    ) -> RippleResult<bool> {
        if let Some(current) = document.get_mut(key) {
            match (current, value) {
                (Value::Document(target), Value::Document(update)) => {
                    return self.apply_level(target, update, path, None);
                }
                (Value::Array(elements), Value::Document(update)) => {
                    let mut changed = false;
                    for element in elements.iter_mut() {
                        if let Value::Document(target) = element {
                            changed |= self.apply_level(target, update, path, None)?;
                        }
                    }
                    return Ok(changed);
                }
                (current, value) if *current == *value => return Ok(false),
                _ => {}
            }
        }

        document.put(key, value.clone());
        Ok(true)
    }

    fn apply_operator(
        &self,
        document: &mut Document,
        key: &str,
        value: &Value,
        level: &Document,
        path: &str,
        operator: UpdateOperator,
    ) -> RippleResult<bool> {
        if operator.descends_into_documents() {
            if let Value::Document(nested) = value {
                return self.descend(document, key, nested, path, operator);
            }
        }

        match operator {
            UpdateOperator::Push => push(document, key, value),
            UpdateOperator::Pull => pull(document, key, value),
            UpdateOperator::PullAll => pull_all(document, key, value),
            UpdateOperator::AddToSet => self.add_to_set(document, key, value),
            UpdateOperator::SplicePush => splice_push(document, key, value, level),
            UpdateOperator::Move => move_element(document, key, value),
            UpdateOperator::Inc | UpdateOperator::Mul => arithmetic(document, key, value, operator),
            UpdateOperator::Rename => rename(document, key, value),
            UpdateOperator::Unset => Ok(document.remove(key).is_some()),
            UpdateOperator::Pop => pop(document, key, value),
        }
    }

    fn descend(
        &self,
        document: &mut Document,
        key: &str,
        nested: &Document,
        path: &str,
        operator: UpdateOperator,
    ) -> RippleResult<bool> {
        if !document.contains_key(key) {
            if !operator.creates_missing_field() {
                return Ok(false);
            }
            document.put(key, Document::new());
        }

        match document.get_mut(key) {
            Some(Value::Document(target)) => self.apply_level(target, nested, path, Some(operator)),
            _ => Err(malformed(&format!(
                "Cannot apply {} with a document operand to non-document field {}",
                operator, path
            ))),
        }
    }

    fn add_to_set(&self, document: &mut Document, key: &str, value: &Value) -> RippleResult<bool> {
        let elements = array_field(document, key, UpdateOperator::AddToSet)?;
        let present = match self.options.add_to_set_key() {
            Some(identity) => {
                let identity = Path::new(identity);
                let wanted = identity.value_in(value);
                elements.iter().any(|e| identity.value_in(e) == wanted)
            }
            None => elements.contains(value),
        };

        if present {
            Ok(false)
        } else {
            elements.push(value.clone());
            Ok(true)
        }
    }
}

fn malformed(message: &str) -> RippleError {
    log::error!("{}", message);
    RippleError::new(message, ErrorKind::MalformedUpdate)
}

fn missing_argument(message: &str) -> RippleError {
    log::error!("{}", message);
    RippleError::new(message, ErrorKind::MissingArgument)
}

/// Returns the array at `key`, creating it first when the operator allows.
fn array_field<'d>(
    document: &'d mut Document,
    key: &str,
    operator: UpdateOperator,
) -> RippleResult<&'d mut Vec<Value>> {
    if !document.contains_key(key) && operator.creates_missing_field() {
        document.put(key, Value::Array(vec![]));
    }

    match document.get_mut(key) {
        Some(Value::Array(elements)) => Ok(elements),
        Some(_) => Err(malformed(&format!(
            "Cannot apply {} to {} because it is not an array",
            operator, key
        ))),
        None => Err(malformed(&format!("Cannot apply {} to missing field {}", operator, key))),
    }
}

/// Like [array_field] for operators that treat a missing field as a no-op.
fn existing_array<'d>(
    document: &'d mut Document,
    key: &str,
    operator: UpdateOperator,
) -> RippleResult<Option<&'d mut Vec<Value>>> {
    if document.contains_key(key) {
        array_field(document, key, operator).map(Some)
    } else {
        Ok(None)
    }
}

fn insert_at(elements: &mut Vec<Value>, index: usize, value: Value) {
    if index < elements.len() {
        elements.insert(index, value);
    } else {
        elements.push(value);
    }
}

fn index_argument(value: Option<&Value>, operator: UpdateOperator) -> RippleResult<usize> {
    match value.and_then(Value::as_i64) {
        Some(index) if index >= 0 => Ok(index as usize),
        Some(index) => Err(malformed(&format!("{} index must not be negative, found {}", operator, index))),
        None => Err(missing_argument(&format!("Cannot {} without a {} integer value", operator, INDEX_KEY))),
    }
}

fn push(document: &mut Document, key: &str, value: &Value) -> RippleResult<bool> {
    let (items, position) = match value {
        Value::Document(spec) => match spec.get(EACH_KEY) {
            Some(Value::Array(each)) => {
                let position = spec.get(POSITION_KEY).and_then(Value::as_i64).map(|p| p.max(0) as usize);
                (each.clone(), position)
            }
            Some(other) => {
                return Err(malformed(&format!("{} must be an array, found {}", EACH_KEY, other)));
            }
            None => (vec![value.clone()], None),
        },
        _ => (vec![value.clone()], None),
    };

    let elements = array_field(document, key, UpdateOperator::Push)?;
    let pushed = !items.is_empty();
    match position {
        Some(position) => {
            for (offset, item) in items.into_iter().enumerate() {
                insert_at(elements, position + offset, item);
            }
        }
        None => elements.extend(items),
    }
    Ok(pushed)
}

fn pull(document: &mut Document, key: &str, value: &Value) -> RippleResult<bool> {
    let matcher = ValueMatcher::parse(value)?;
    let Some(elements) = existing_array(document, key, UpdateOperator::Pull)? else {
        return Ok(false);
    };

    let before = elements.len();
    elements.retain(|element| !matcher.matches(element));
    Ok(elements.len() != before)
}

fn pull_all(document: &mut Document, key: &str, value: &Value) -> RippleResult<bool> {
    let Value::Array(unwanted) = value else {
        return Err(malformed(&format!(
            "{} operand for {} must be an array, found {}",
            UpdateOperator::PullAll,
            key,
            value
        )));
    };
    let Some(elements) = existing_array(document, key, UpdateOperator::PullAll)? else {
        return Ok(false);
    };

    let before = elements.len();
    elements.retain(|element| !unwanted.contains(element));
    Ok(elements.len() != before)
}

/// `{$splicePush: {items: value, $index: 1}}` inserts at the sibling `$index`.
fn splice_push(document: &mut Document, key: &str, value: &Value, level: &Document) -> RippleResult<bool> {
    let index = index_argument(level.get(INDEX_KEY), UpdateOperator::SplicePush)?;
    let elements = array_field(document, key, UpdateOperator::SplicePush)?;
    insert_at(elements, index, value.clone());
    Ok(true)
}

/// `{$move: {items: {sku: 2, $index: 0}}}` moves the first element matching
/// the operand (without its `$index`) to position `$index`.
fn move_element(document: &mut Document, key: &str, value: &Value) -> RippleResult<bool> {
    let (target, test) = match value {
        Value::Document(spec) => (
            index_argument(spec.get(INDEX_KEY), UpdateOperator::Move)?,
            Value::Document(spec.without(&[INDEX_KEY])),
        ),
        _ => return Err(missing_argument(&format!(
            "Cannot {} without a {} integer value",
            UpdateOperator::Move,
            INDEX_KEY
        ))),
    };
    let matcher = ValueMatcher::parse(&test)?;

    let Some(elements) = existing_array(document, key, UpdateOperator::Move)? else {
        return Ok(false);
    };
    let Some(from) = elements.iter().position(|element| matcher.matches(element)) else {
        return Ok(false);
    };

    let element = elements.remove(from);
    let to = target.min(elements.len());
    elements.insert(to, element);
    Ok(from != to)
}

fn arithmetic(document: &mut Document, key: &str, operand: &Value, operator: UpdateOperator) -> RippleResult<bool> {
    if !operand.is_number() {
        return Err(malformed(&format!("{} operand for {} must be a number, found {}", operator, key, operand)));
    }

    let current = document.get(key).cloned().unwrap_or(Value::I64(0));
    let next = match (&current, operand) {
        (Value::I64(a), Value::I64(b)) => {
            let exact = match operator {
                UpdateOperator::Mul => a.checked_mul(*b),
                _ => a.checked_add(*b),
            };
            exact.map(Value::I64).unwrap_or_else(|| float_arithmetic(*a as f64, *b as f64, operator))
        }
        (current, operand) => match (current.as_f64(), operand.as_f64()) {
            (Some(a), Some(b)) => float_arithmetic(a, b, operator),
            _ => {
                return Err(malformed(&format!(
                    "Cannot apply {} to {} because it is not a number",
                    operator, key
                )));
            }
        },
    };

    let existed = document.contains_key(key);
    if existed && next == current {
        return Ok(false);
    }
    document.put(key, next);
    Ok(true)
}

fn float_arithmetic(a: f64, b: f64, operator: UpdateOperator) -> Value {
    match operator {
        UpdateOperator::Mul => Value::F64(a * b),
        _ => Value::F64(a + b),
    }
}

fn rename(document: &mut Document, key: &str, value: &Value) -> RippleResult<bool> {
    let Some(new_key) = value.as_string() else {
        return Err(malformed(&format!("{} target for {} must be a string, found {}", UpdateOperator::Rename, key, value)));
    };
    if new_key == key {
        return Ok(false);
    }

    match document.remove(key) {
        Some(existing) => {
            document.put(new_key, existing);
            Ok(true)
        }
        None => Ok(false),
    }
}

fn pop(document: &mut Document, key: &str, value: &Value) -> RippleResult<bool> {
    let from_end = match value.as_i64() {
        Some(1) => true,
        Some(-1) => false,
        _ => return Err(malformed(&format!("{} operand must be 1 or -1, found {}", UpdateOperator::Pop, value))),
    };
    let Some(elements) = existing_array(document, key, UpdateOperator::Pop)? else {
        return Ok(false);
    };

    if elements.is_empty() {
        return Ok(false);
    }
    if from_end {
        elements.pop();
    } else {
        elements.remove(0);
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::add_to_set_by;
    use crate::doc;

    fn apply(document: &mut Document, update: Document) -> RippleResult<bool> {
        apply_update(document, &update, &Document::new(), &UpdateOptions::default())
    }

    fn kind(result: RippleResult<bool>) -> Option<ErrorKind> {
        result.err().map(|e| e.kind().clone())
    }

    #[test]
    fn test_plain_set_and_idempotence() {
        let mut document = doc! { _id: "1", name: "hello" };
        let update = doc! { name: "hello2", age: 3 };
        assert!(apply(&mut document, update.clone()).unwrap());
        assert_eq!(document, doc! { _id: "1", name: "hello2", age: 3 });
        assert!(!apply(&mut document, update).unwrap());
    }

    #[test]
    fn test_plain_set_deep_merges_documents() {
        let mut document = doc! { address: { city: "London", zip: "E1" } };
        assert!(apply(&mut document, doc! { address: { city: "Leeds" } }).unwrap());
        assert_eq!(document, doc! { address: { city: "Leeds", zip: "E1" } });
        assert!(!apply(&mut document, doc! { address: { city: "Leeds" } }).unwrap());
    }

    #[test]
    fn test_plain_set_replaces_arrays() {
        let mut document = doc! { tags: ["a", "b"] };
        assert!(apply(&mut document, doc! { tags: ["c"] }).unwrap());
        assert_eq!(document, doc! { tags: ["c"] });
        assert!(!apply(&mut document, doc! { tags: ["c"] }).unwrap());

        let mut document = doc! { tags: "a" };
        assert!(apply(&mut document, doc! { tags: ["a"] }).unwrap());
        assert_eq!(document, doc! { tags: ["a"] });
    }

    #[test]
    fn test_plain_document_onto_array_updates_every_element() {
        let mut document = doc! { items: [{ sku: 1 }, { sku: 2 }, 7] };
        assert!(apply(&mut document, doc! { items: { done: true } }).unwrap());
        assert_eq!(
            document,
            doc! { items: [{ sku: 1, done: true }, { sku: 2, done: true }, 7] }
        );
    }

    #[test]
    fn test_positional_update_uses_query() {
        let mut document = doc! { items: [{ sku: 1, qty: 1 }, { sku: 2, qty: 1 }] };
        let query = doc! { items: { sku: 2 } };
        let update = doc! { "items.$": { qty: 5 } };
        let changed = apply_update(&mut document, &update, &query, &UpdateOptions::default()).unwrap();
        assert!(changed);
        assert_eq!(document, doc! { items: [{ sku: 1, qty: 1 }, { sku: 2, qty: 5 }] });
    }

    #[test]
    fn test_positional_update_with_dotted_query() {
        let mut document = doc! { items: [{ sku: 1, qty: 1 }, { sku: 2, qty: 1 }] };
        let query = doc! { "items.sku": 1 };
        let update = doc! { "$inc": { "items.$": { qty: 10 } } };
        assert!(apply_update(&mut document, &update, &query, &UpdateOptions::default()).unwrap());
        assert_eq!(document, doc! { items: [{ sku: 1, qty: 11 }, { sku: 2, qty: 1 }] });
    }

    #[test]
    fn test_positional_update_without_query_touches_all_elements() {
        let mut document = doc! { scores: [1, 2, 3] };
        assert!(apply(&mut document, doc! { "$inc": { "scores.$": 1 } }).unwrap());
        assert_eq!(document, doc! { scores: [2, 3, 4] });
    }

    #[test]
    fn test_push() {
        let mut document = doc! { tags: ["a"] };
        assert!(apply(&mut document, doc! { "$push": { tags: "b" } }).unwrap());
        assert_eq!(document, doc! { tags: ["a", "b"] });

        let mut document = doc! {};
        assert!(apply(&mut document, doc! { "$push": { tags: { name: "x" } } }).unwrap());
        assert_eq!(document, doc! { tags: [{ name: "x" }] });
    }

    #[test]
    fn test_push_each_with_position() {
        let mut document = doc! { arr: [1, 4] };
        let update = doc! { "$push": { arr: { "$each": [2, 3], "$position": 1 } } };
        assert!(apply(&mut document, update).unwrap());
        assert_eq!(document, doc! { arr: [1, 2, 3, 4] });

        let update = doc! { "$push": { arr: { "$each": [5, 6] } } };
        assert!(apply(&mut document, update).unwrap());
        assert_eq!(document, doc! { arr: [1, 2, 3, 4, 5, 6] });
    }

    #[test]
    fn test_push_on_scalar_is_malformed() {
        let mut document = doc! { tags: "a" };
        let result = apply(&mut document, doc! { "$push": { tags: "b" } });
        assert_eq!(kind(result), Some(ErrorKind::MalformedUpdate));
    }

    #[test]
    fn test_pull_by_query_and_value() {
        let mut document = doc! { arr: [{ id: 1 }, { id: 2 }, { id: 1 }], tags: ["a", "b", "a"] };
        assert!(apply(&mut document, doc! { "$pull": { arr: { id: 1 }, tags: "a" } }).unwrap());
        assert_eq!(document, doc! { arr: [{ id: 2 }], tags: ["b"] });
        assert!(!apply(&mut document, doc! { "$pull": { tags: "z" } }).unwrap());
        assert!(!apply(&mut document, doc! { "$pull": { missing: "z" } }).unwrap());
    }

    #[test]
    fn test_pull_with_operator() {
        let mut document = doc! { scores: [1, 5, 8, 10] };
        assert!(apply(&mut document, doc! { "$pull": { scores: { "$gte": 8 } } }).unwrap());
        assert_eq!(document, doc! { scores: [1, 5] });
    }

    #[test]
    fn test_pull_all() {
        let mut document = doc! { arr: [1, 2, 3, 2] };
        assert!(apply(&mut document, doc! { "$pullAll": { arr: [2, 3] } }).unwrap());
        assert_eq!(document, doc! { arr: [1] });

        let result = apply(&mut document, doc! { "$pullAll": { arr: 1 } });
        assert_eq!(kind(result), Some(ErrorKind::MalformedUpdate));
    }

    #[test]
    fn test_add_to_set_by_content() {
        let mut document = doc! { arr: [{ a: 1, b: 2 }] };
        assert!(!apply(&mut document, doc! { "$addToSet": { arr: { b: 2, a: 1 } } }).unwrap());
        assert!(apply(&mut document, doc! { "$addToSet": { arr: { a: 2 } } }).unwrap());
        assert_eq!(document.get("arr").and_then(Value::as_array).map(Vec::len), Some(2));
    }

    #[test]
    fn test_add_to_set_by_key() {
        let mut document = doc! { arr: [{ sku: 1, qty: 1 }] };
        let options = add_to_set_by("sku");
        let update = doc! { "$addToSet": { arr: { sku: 1, qty: 9 } } };
        assert!(!apply_update(&mut document, &update, &Document::new(), &options).unwrap());

        let update = doc! { "$addToSet": { arr: { sku: 2, qty: 9 } } };
        assert!(apply_update(&mut document, &update, &Document::new(), &options).unwrap());
        assert_eq!(document, doc! { arr: [{ sku: 1, qty: 1 }, { sku: 2, qty: 9 }] });
    }

    #[test]
    fn test_splice_push() {
        let mut document = doc! { arr: [1, 3] };
        assert!(apply(&mut document, doc! { "$splicePush": { arr: 2, "$index": 1 } }).unwrap());
        assert_eq!(document, doc! { arr: [1, 2, 3] });

        assert!(apply(&mut document, doc! { "$splicePush": { arr: 9, "$index": 50 } }).unwrap());
        assert_eq!(document, doc! { arr: [1, 2, 3, 9] });

        let result = apply(&mut document, doc! { "$splicePush": { arr: 2 } });
        assert_eq!(kind(result), Some(ErrorKind::MissingArgument));
    }

    #[test]
    fn test_move() {
        let mut document = doc! { arr: [{ id: 1 }, { id: 2 }, { id: 3 }] };
        assert!(apply(&mut document, doc! { "$move": { arr: { id: 3, "$index": 0 } } }).unwrap());
        assert_eq!(document, doc! { arr: [{ id: 3 }, { id: 1 }, { id: 2 }] });
        assert!(!apply(&mut document, doc! { "$move": { arr: { id: 3, "$index": 0 } } }).unwrap());

        let result = apply(&mut document, doc! { "$move": { arr: { id: 3 } } });
        assert_eq!(kind(result), Some(ErrorKind::MissingArgument));

        let mut scalar = doc! { arr: 1 };
        let result = apply(&mut scalar, doc! { "$move": { arr: { id: 3, "$index": 0 } } });
        assert_eq!(kind(result), Some(ErrorKind::MalformedUpdate));
    }

    #[test]
    fn test_inc_and_mul() {
        let mut document = doc! { count: 2, price: 1.5 };
        assert!(apply(&mut document, doc! { "$inc": { count: (-3), visits: 1 } }).unwrap());
        assert_eq!(document.get("count"), Some(&Value::I64(-1)));
        assert_eq!(document.get("visits"), Some(&Value::I64(1)));

        assert!(apply(&mut document, doc! { "$mul": { price: 2 } }).unwrap());
        assert_eq!(document.get("price"), Some(&Value::F64(3.0)));

        assert!(!apply(&mut document, doc! { "$inc": { count: 0 } }).unwrap());
        assert!(!apply(&mut document, doc! { "$mul": { price: 1 } }).unwrap());
    }

    #[test]
    fn test_inc_nested_and_non_numeric() {
        let mut document = doc! { stats: { views: 1 }, name: "x" };
        assert!(apply(&mut document, doc! { "$inc": { stats: { views: 4 } } }).unwrap());
        assert_eq!(document, doc! { stats: { views: 5 }, name: "x" });

        let result = apply(&mut document, doc! { "$inc": { name: 1 } });
        assert_eq!(kind(result), Some(ErrorKind::MalformedUpdate));
    }

    #[test]
    fn test_inc_overflow_falls_back_to_float() {
        let mut document = doc! { big: (i64::MAX) };
        assert!(apply(&mut document, doc! { "$inc": { big: 1 } }).unwrap());
        assert!(matches!(document.get("big"), Some(Value::F64(_))));
    }

    #[test]
    fn test_rename_and_unset() {
        let mut document = doc! { old: 1, gone: true };
        assert!(apply(&mut document, doc! { "$rename": { old: "new" }, "$unset": { gone: 1 } }).unwrap());
        assert_eq!(document, doc! { new: 1 });
        assert!(!apply(&mut document, doc! { "$rename": { old: "other" } }).unwrap());
        assert!(!apply(&mut document, doc! { "$unset": { gone: 1 } }).unwrap());
    }

    #[test]
    fn test_pop() {
        let mut document = doc! { arr: [1, 2, 3] };
        assert!(apply(&mut document, doc! { "$pop": { arr: 1 } }).unwrap());
        assert_eq!(document, doc! { arr: [1, 2] });
        assert!(apply(&mut document, doc! { "$pop": { arr: (-1) } }).unwrap());
        assert_eq!(document, doc! { arr: [2] });

        let result = apply(&mut document, doc! { "$pop": { arr: 2 } });
        assert_eq!(kind(result), Some(ErrorKind::MalformedUpdate));
    }

    #[test]
    fn test_unknown_operator_is_malformed() {
        let mut document = doc! { a: 1 };
        let result = apply(&mut document, doc! { "$set": { a: 2 } });
        assert_eq!(kind(result), Some(ErrorKind::MalformedUpdate));
    }

    #[test]
    fn test_index_key_is_ignored_outside_operators() {
        let mut document = doc! { a: 1 };
        assert!(!apply(&mut document, doc! { "$index": 3 }).unwrap());
        assert_eq!(document, doc! { a: 1 });
    }
}
