use crate::collection::CollectionEventListener;
use crate::common::RIPPLE_EVENT;
use crate::errors::{ErrorKind, RippleError, RippleResult};
use basu::error::BasuError;
use basu::event::Event;
use basu::{EventBus as BasuEventBus, Handle, HandlerId};
use std::marker::PhantomData;
use std::sync::Arc;

/// Capability of emitting coarse events to subscribed listeners.
///
/// Collections and views implement it. It is separate from the propagation
/// graph: listeners observe changes, they never take part in delivery.
pub trait EventAware {
    fn subscribe(&self, listener: CollectionEventListener) -> RippleResult<Option<SubscriberRef>>;

    fn unsubscribe(&self, subscriber: SubscriberRef) -> RippleResult<()>;
}

/// A publish/subscribe bus for one event payload type.
///
/// Cloning the bus shares the same subscribers.
///
/// ```ignore
/// let bus: EventBus<CollectionEventInfo, CollectionEventListener> = EventBus::new();
/// let subscriber = bus.register(CollectionEventListener::new(|event| {
///     println!("{:?}", event.event_type());
///     Ok(())
/// }))?;
/// bus.publish(event)?;
/// bus.deregister(subscriber.unwrap())?;
/// ```
#[derive(Clone)]
pub struct EventBus<E, L> {
    inner: Arc<EventBusInner<E, L>>,
}

impl<E, L> Default for EventBus<E, L>
where
    L: Handle<E> + 'static,
    E: Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<E, L> EventBus<E, L>
where
    L: Handle<E> + 'static,
    E: Send + Sync,
{
    pub fn new() -> Self {
        EventBus {
            inner: Arc::new(EventBusInner::new()),
        }
    }

    pub fn register(&self, listener: L) -> RippleResult<Option<SubscriberRef>> {
        self.inner.register(listener)
    }

    pub fn deregister(&self, subscriber: SubscriberRef) -> RippleResult<()> {
        self.inner.deregister(subscriber)
    }

    pub fn publish(&self, event: E) -> RippleResult<()> {
        self.inner.publish(event)
    }

    pub fn close(&self) -> RippleResult<()> {
        self.inner.close()
    }

    pub fn has_listeners(&self) -> bool {
        self.inner.has_listeners()
    }
}

/// Handle returned by a subscription, used to unsubscribe.
pub struct SubscriberRef {
    pub(crate) inner: HandlerId,
}

impl SubscriberRef {
    pub fn new(inner: HandlerId) -> Self {
        SubscriberRef { inner }
    }
}

struct EventBusInner<E, L> {
    event_bus: BasuEventBus<E>,
    phantom_data: PhantomData<L>,
}

impl<E, L> EventBusInner<E, L>
where
    L: Handle<E> + 'static,
    E: Send + Sync,
{
    fn new() -> Self {
        EventBusInner {
            event_bus: BasuEventBus::new(),
            phantom_data: PhantomData,
        }
    }

    fn register(&self, listener: L) -> RippleResult<Option<SubscriberRef>> {
        self.event_bus
            .subscribe(RIPPLE_EVENT, Box::new(listener))
            .map(|id| Some(SubscriberRef::new(id)))
            .map_err(Self::ripple_error)
    }

    fn deregister(&self, subscriber: SubscriberRef) -> RippleResult<()> {
        self.event_bus
            .unsubscribe(RIPPLE_EVENT, &subscriber.inner)
            .map_err(Self::ripple_error)
    }

    fn publish(&self, event: E) -> RippleResult<()> {
        let handler_count = match self.event_bus.get_handler_count(RIPPLE_EVENT) {
            Ok(count) => count,
            Err(BasuError::EventTypeNotFOUND) => return Ok(()),
            Err(e) => return Err(Self::ripple_error(e)),
        };

        if handler_count == 0 {
            return Ok(());
        }

        let event = Event::new(event);
        self.event_bus
            .publish(RIPPLE_EVENT, &event)
            .map_err(Self::ripple_error)
    }

    fn close(&self) -> RippleResult<()> {
        self.event_bus.clear().map_err(Self::ripple_error)
    }

    fn has_listeners(&self) -> bool {
        match self.event_bus.get_handler_count(RIPPLE_EVENT) {
            Ok(count) => count > 0,
            Err(BasuError::EventTypeNotFOUND) => false,
            Err(e) => {
                log::warn!("Failed to check listeners: {}, defaulting to false", e);
                false
            }
        }
    }

    fn ripple_error(e: BasuError) -> RippleError {
        match e {
            BasuError::EventTypeNotFOUND => RippleError::new(
                "Event bus error: no handler is registered for the event type",
                ErrorKind::EventError,
            ),
            BasuError::MutexPoisoned => RippleError::new(
                "Event bus error: internal mutex poisoned",
                ErrorKind::EventError,
            ),
            BasuError::HandlerError(e) => RippleError::new(
                &format!("Event handler error: {}", e),
                ErrorKind::EventError,
            ),
        }
    }
}
