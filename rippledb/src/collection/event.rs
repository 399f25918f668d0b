use crate::collection::Document;
use crate::common::current_time_millis;
use crate::errors::RippleResult;
use anyhow::Error;
use basu::error::BasuError;
use basu::event::Event;
use basu::Handle;
use std::fmt::Debug;
use std::sync::Arc;

/// Kinds of coarse events published by collections and views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionEvents {
    Insert,
    Update,
    Remove,
    SetData,
    Truncate,
    Drop,
    /// Debounced notification that the data changed one or more times.
    Change,
}

/// Payload of a published event.
///
/// `items` carries the documents the event is about: the inserted documents
/// for `Insert`, the documents after the update for `Update`, the removed
/// documents for `Remove` and the new data for `SetData`. `Change`, `Drop`
/// and `Truncate` carry no documents.
#[derive(Clone)]
pub struct CollectionEventInfo {
    inner: Arc<CollectionEventInner>,
}

struct CollectionEventInner {
    items: Vec<Document>,
    event_type: CollectionEvents,
    timestamp: u128,
    originator: String,
}

impl CollectionEventInfo {
    pub fn new(items: Vec<Document>, event_type: CollectionEvents, originator: String) -> Self {
        CollectionEventInfo {
            inner: Arc::new(CollectionEventInner {
                items,
                event_type,
                timestamp: current_time_millis(),
                originator,
            }),
        }
    }

    pub fn event_type(&self) -> CollectionEvents {
        self.inner.event_type
    }

    pub fn items(&self) -> &[Document] {
        &self.inner.items
    }

    /// Name of the collection or view that published the event.
    pub fn originator(&self) -> &str {
        &self.inner.originator
    }

    pub fn timestamp(&self) -> u128 {
        self.inner.timestamp
    }
}

impl Debug for CollectionEventInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionEventInfo")
            .field("items", &self.inner.items)
            .field("event_type", &self.inner.event_type)
            .field("timestamp", &self.inner.timestamp)
            .field("originator", &self.inner.originator)
            .finish()
    }
}

pub trait CollectionEventCallback: Send + Sync + Fn(CollectionEventInfo) -> RippleResult<()> {}

impl<F> CollectionEventCallback for F where F: Send + Sync + Fn(CollectionEventInfo) -> RippleResult<()> {}

/// A closure subscribed to a collection's events.
#[derive(Clone)]
pub struct CollectionEventListener {
    on_event: Arc<dyn CollectionEventCallback>,
}

impl CollectionEventListener {
    pub fn new(on_event: impl CollectionEventCallback + 'static) -> Self {
        CollectionEventListener {
            on_event: Arc::new(on_event),
        }
    }
}

impl Handle<CollectionEventInfo> for CollectionEventListener {
    fn handle(&self, event: &Event<CollectionEventInfo>) -> Result<(), BasuError> {
        (self.on_event)(event.data.clone()).map_err(|e| BasuError::HandlerError(Error::from(e)))
    }
}

impl Debug for CollectionEventListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionEventListener").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;
    use crate::errors::{ErrorKind, RippleError};

    #[test]
    fn test_event_info_accessors() {
        let event = CollectionEventInfo::new(
            vec![doc! { _id: "1" }],
            CollectionEvents::Insert,
            "users".to_string(),
        );
        assert_eq!(event.event_type(), CollectionEvents::Insert);
        assert_eq!(event.items().len(), 1);
        assert_eq!(event.originator(), "users");
        assert!(event.timestamp() > 0);
    }

    #[test]
    fn test_listener_handle_ok() {
        let listener = CollectionEventListener::new(|_| Ok(()));
        let event = Event::new(CollectionEventInfo::new(vec![], CollectionEvents::Change, "c".into()));
        assert!(listener.handle(&event).is_ok());
    }

    #[test]
    fn test_listener_handle_maps_error() {
        let listener = CollectionEventListener::new(|_| {
            Err(RippleError::new("listener failed", ErrorKind::EventError))
        });
        let event = Event::new(CollectionEventInfo::new(vec![], CollectionEvents::Drop, "c".into()));
        let result = listener.handle(&event);
        assert!(matches!(result, Err(BasuError::HandlerError(_))));
    }
}
