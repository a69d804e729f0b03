//! # Event Notification
//!
//! Observer list used by every node to announce "my data changed".
//!
//! Listeners run in the order they were added. The optional hooks let a
//! downstream handler subscribe to an upstream one only while it has
//! listeners of its own.

use crate::Result;
use crate::node::ConfigNode;
use errors::ConfigError;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::debug;

/// Handle returned by [`EventHandler::add`], used to remove the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

type Listener<A> = Arc<dyn Fn(&A) + Send + Sync>;
type Hook = Box<dyn Fn(usize) + Send + Sync>;

/// An ordered list of listeners receiving `&A`.
pub struct EventHandler<A = ()> {
    listeners: Mutex<Vec<(ListenerId, Listener<A>)>>,
    next_id: AtomicU64,
    before_add: Option<Hook>,
    after_remove: Option<Hook>,
}

impl<A> EventHandler<A> {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            before_add: None,
            after_remove: None,
        }
    }

    /// Handler with membership hooks.
    ///
    /// `before_add` receives the listener count before the new listener is
    /// stored; `after_remove` receives the count left after a removal. Hooks
    /// run while membership is locked, so they must not add or remove
    /// listeners on this same handler.
    pub fn with_hooks(
        before_add: impl Fn(usize) + Send + Sync + 'static,
        after_remove: impl Fn(usize) + Send + Sync + 'static,
    ) -> Self {
        Self {
            before_add: Some(Box::new(before_add)),
            after_remove: Some(Box::new(after_remove)),
            ..Self::new()
        }
    }

    pub fn add(&self, listener: impl Fn(&A) + Send + Sync + 'static) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut listeners = self.listeners.lock();
        if let Some(hook) = &self.before_add {
            hook(listeners.len());
        }
        listeners.push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener. Removing an id that is not registered is an error.
    pub fn remove(&self, id: ListenerId) -> Result<()> {
        let mut listeners = self.listeners.lock();
        let position = listeners
            .iter()
            .position(|(existing, _)| *existing == id)
            .ok_or_else(|| ConfigError::InvalidArgument {
                argument: format!("listener {}", id),
                reason: "not registered".to_string(),
            })?;
        listeners.remove(position);
        if let Some(hook) = &self.after_remove {
            hook(listeners.len());
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.lock().is_empty()
    }

    /// Call every listener in add order.
    ///
    /// Listeners are snapshotted first, so a listener may add or remove
    /// listeners without deadlocking; such changes apply to the next call.
    pub fn invoke(&self, args: &A) {
        let listeners: Vec<Listener<A>> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();

        for listener in listeners {
            listener(args);
        }
    }
}

impl<A> Default for EventHandler<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> fmt::Debug for EventHandler<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandler")
            .field("listeners", &self.len())
            .finish()
    }
}

/// `updated` handler of a wrapper node.
///
/// Subscribes to the wrapped node's `updated` while the handler has at least
/// one listener and re-announces its events through the wrapper.
pub(crate) struct Relay {
    handler: EventHandler,
    upstream: Arc<dyn ConfigNode>,
    subscription: Arc<Mutex<Option<ListenerId>>>,
}

impl Relay {
    pub(crate) fn new(upstream: Arc<dyn ConfigNode>, wrapper: Weak<dyn ConfigNode>) -> Self {
        let subscription: Arc<Mutex<Option<ListenerId>>> = Arc::default();

        let subscribe = {
            let upstream = upstream.clone();
            let subscription = subscription.clone();
            move |count: usize| {
                if count > 0 {
                    return;
                }
                let wrapper = wrapper.clone();
                let id = upstream.updated().add(move |_| {
                    if let Some(wrapper) = wrapper.upgrade() {
                        wrapper.updated().invoke(&());
                    }
                });
                *subscription.lock() = Some(id);
            }
        };
        let unsubscribe = {
            let upstream = upstream.clone();
            let subscription = subscription.clone();
            move |count: usize| {
                if count == 0 {
                    release(&upstream, &subscription);
                }
            }
        };

        Self {
            handler: EventHandler::with_hooks(subscribe, unsubscribe),
            upstream,
            subscription,
        }
    }

    pub(crate) fn handler(&self) -> &EventHandler {
        &self.handler
    }

    pub(crate) fn is_subscribed(&self) -> bool {
        self.subscription.lock().is_some()
    }
}

fn release(upstream: &Arc<dyn ConfigNode>, subscription: &Mutex<Option<ListenerId>>) {
    if let Some(id) = subscription.lock().take() {
        if let Err(e) = upstream.updated().remove(id) {
            debug!("Upstream listener already removed: {}", e);
        }
    }
}

impl Drop for Relay {
    fn drop(&mut self) {
        release(&self.upstream, &self.subscription);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_invoke_in_add_order() {
        let event: EventHandler<i32> = EventHandler::new();
        let calls = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let calls = calls.clone();
            event.add(move |value| calls.lock().push(format!("{}:{}", tag, value)));
        }
        event.invoke(&7);

        assert_eq!(*calls.lock(), vec!["first:7", "second:7", "third:7"]);
    }

    #[test]
    fn test_remove_listener() {
        let event = EventHandler::<()>::new();
        let count = Arc::new(AtomicUsize::new(0));

        let counter = count.clone();
        let id = event.add(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        event.invoke(&());
        event.remove(id).unwrap();
        event.invoke(&());

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(event.is_empty());
    }

    #[test]
    fn test_remove_unknown_listener_fails() {
        let event = EventHandler::<()>::new();
        let id = event.add(|_| {});
        event.remove(id).unwrap();

        let err = event.remove(id).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidArgument { .. }));
    }

    #[test]
    fn test_hooks_see_listener_counts() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let on_add = seen.clone();
        let on_remove = seen.clone();
        let event = EventHandler::<()>::with_hooks(
            move |count| on_add.lock().push(("add", count)),
            move |count| on_remove.lock().push(("remove", count)),
        );

        let a = event.add(|_| {});
        let b = event.add(|_| {});
        event.remove(a).unwrap();
        event.remove(b).unwrap();

        assert_eq!(
            *seen.lock(),
            vec![("add", 0), ("add", 1), ("remove", 1), ("remove", 0)]
        );
    }

    #[test]
    fn test_listener_may_remove_itself() {
        let event = Arc::new(EventHandler::<()>::new());
        let slot: Arc<Mutex<Option<ListenerId>>> = Arc::new(Mutex::new(None));

        let handler = event.clone();
        let own_id = slot.clone();
        let id = event.add(move |_| {
            if let Some(id) = own_id.lock().take() {
                handler.remove(id).unwrap();
            }
        });
        *slot.lock() = Some(id);

        event.invoke(&());
        assert!(event.is_empty());
    }
}
