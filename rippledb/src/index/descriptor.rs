use crate::collection::Document;
use crate::common::{Path, SortOrder, Value};
use crate::errors::{ErrorKind, RippleError, RippleResult};
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// One key path of an index and the direction it is kept in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexField {
    path: String,
    order: SortOrder,
}

impl IndexField {
    pub fn new(path: &str, order: SortOrder) -> Self {
        IndexField {
            path: path.to_string(),
            order,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn order(&self) -> SortOrder {
        self.order
    }
}

/// Describes an index on a collection.
///
/// An index is identified two ways: by its `name`, chosen by the caller or
/// derived from the key paths, and by its `id`, a canonical signature of the
/// key shape (kind, paths and directions). Two `ensure_index` calls with the
/// same key shape resolve to the same index whatever name they ask for.
///
/// # Examples
///
/// ```rust
/// use rippledb::doc;
/// use rippledb::index::IndexDescriptor;
///
/// let descriptor = IndexDescriptor::new(None, &doc! { age: 1, name: (-1) }, false, "keyed").unwrap();
/// assert_eq!(descriptor.name(), "age_1_name_-1");
/// assert_eq!(descriptor.id(), "keyed:age:1,name:-1");
/// assert_eq!(descriptor.fields().len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexDescriptor {
    inner: Arc<IndexDescriptorInner>,
}

#[derive(Debug, PartialEq, Eq, Hash)]
struct IndexDescriptorInner {
    name: String,
    id: String,
    fields: Vec<IndexField>,
    unique: bool,
    kind: String,
}

impl IndexDescriptor {
    /// Builds a descriptor from a key specifier such as `{age: 1}` or
    /// `{address: {city: -1}}`.
    pub fn new(name: Option<&str>, keys: &Document, unique: bool, kind: &str) -> RippleResult<Self> {
        let fields: Vec<IndexField> = Path::parse(keys)
            .into_iter()
            .map(|leaf| IndexField::new(&leaf.path, SortOrder::from_value(&leaf.value)))
            .collect();

        if fields.is_empty() {
            log::error!("Cannot create an index without key paths");
            return Err(RippleError::new(
                "Cannot create an index without key paths",
                ErrorKind::MissingArgument,
            ));
        }

        let signature = fields
            .iter()
            .map(|f| format!("{}:{}", f.path, f.order.as_value()))
            .collect::<Vec<_>>()
            .join(",");
        let id = format!("{}:{}", kind, signature);
        let name = match name {
            Some(name) => name.to_string(),
            None => fields
                .iter()
                .map(|f| format!("{}_{}", f.path, f.order.as_value()))
                .collect::<Vec<_>>()
                .join("_"),
        };

        Ok(IndexDescriptor {
            inner: Arc::new(IndexDescriptorInner {
                name,
                id,
                fields,
                unique,
                kind: kind.to_string(),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Canonical key-shape signature.
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn fields(&self) -> &[IndexField] {
        &self.inner.fields
    }

    pub fn is_unique(&self) -> bool {
        self.inner.unique
    }

    pub fn kind(&self) -> &str {
        &self.inner.kind
    }

    pub fn is_compound(&self) -> bool {
        self.inner.fields.len() > 1
    }

    /// The key specifier this descriptor was built from.
    pub fn keys(&self) -> Document {
        let mut keys = Document::new();
        for field in &self.inner.fields {
            keys.put(field.path.clone(), field.order.as_value());
        }
        keys
    }

    /// Summary used by plans and `indexes()` listings.
    pub fn to_document(&self) -> Document {
        let mut document = Document::new();
        document.put("name", self.name());
        document.put("id", self.id());
        document.put("keys", self.keys());
        document.put("unique", self.is_unique());
        document.put("kind", self.kind());
        document
    }
}

impl Display for IndexDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), self.id())
    }
}

impl From<&IndexDescriptor> for Value {
    fn from(descriptor: &IndexDescriptor) -> Self {
        Value::Document(descriptor.to_document())
    }
}
