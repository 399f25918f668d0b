use crate::collection::Document;
use std::fmt::Debug;
use std::sync::Arc;

pub type TransformFn = Arc<dyn Fn(Document) -> Document + Send + Sync>;

/// Hooks rewriting documents on their way into and out of a collection.
///
/// `data_in` runs on every document stored by an insert or `set_data`;
/// `data_out` runs on every document returned by a find. Both are skipped
/// while the transform is disabled.
///
/// ```rust,ignore
/// let transform = Transform::new()
///     .data_in(|mut doc| { doc.put("stored", true); doc })
///     .data_out(|doc| doc.without(&["stored"]));
/// collection.set_transform(transform);
/// ```
#[derive(Clone, Default)]
pub struct Transform {
    enabled: bool,
    data_in: Option<TransformFn>,
    data_out: Option<TransformFn>,
}

impl Transform {
    /// An enabled transform without hooks.
    pub fn new() -> Self {
        Transform {
            enabled: true,
            data_in: None,
            data_out: None,
        }
    }

    pub fn data_in(mut self, f: impl Fn(Document) -> Document + Send + Sync + 'static) -> Self {
        self.data_in = Some(Arc::new(f));
        self
    }

    pub fn data_out(mut self, f: impl Fn(Document) -> Document + Send + Sync + 'static) -> Self {
        self.data_out = Some(Arc::new(f));
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub(crate) fn apply_in(&self, document: Document) -> Document {
        match (&self.data_in, self.enabled) {
            (Some(f), true) => f(document),
            _ => document,
        }
    }

    pub(crate) fn apply_out(&self, document: Document) -> Document {
        match (&self.data_out, self.enabled) {
            (Some(f), true) => f(document),
            _ => document,
        }
    }

    pub(crate) fn has_data_out(&self) -> bool {
        self.enabled && self.data_out.is_some()
    }
}

impl Debug for Transform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transform")
            .field("enabled", &self.enabled)
            .field("data_in", &self.data_in.is_some())
            .field("data_out", &self.data_out.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    #[test]
    fn test_hooks_apply_only_when_enabled() {
        let transform = Transform::new()
            .data_in(|mut doc| {
                doc.put("stored", true);
                doc
            })
            .data_out(|doc| doc.without(&["stored"]));

        let stored = transform.apply_in(doc! { _id: "1" });
        assert_eq!(stored, doc! { _id: "1", stored: true });
        assert_eq!(transform.apply_out(stored.clone()), doc! { _id: "1" });

        let disabled = transform.enabled(false);
        assert_eq!(disabled.apply_in(doc! { _id: "1" }), doc! { _id: "1" });
        assert!(!disabled.has_data_out());
    }

    #[test]
    fn test_default_is_disabled_passthrough() {
        let transform = Transform::default();
        assert!(!transform.is_enabled());
        assert_eq!(transform.apply_out(doc! { a: 1 }), doc! { a: 1 });
    }
}
