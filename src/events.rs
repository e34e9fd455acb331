//! # Observer events
//!
//! The core notifies a single observer registry of identity and connection
//! changes (§6.4). Event emission happens after the state change is already
//! visible (§5 "Ordering guarantees"), never before.

use std::sync::{Arc, Mutex};

/// Events the core emits to registered observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    /// The active identity changed (new index, new address).
    IdentityChanged { address: String, index: u32 },
    /// A remote store's connection state changed.
    ConnectionChanged { store: String, connected: bool },
    /// A nametag was successfully registered for the active address.
    NametagRegistered { address: String, name: String },
    /// A nametag was recovered from the external registry.
    NametagRecovered { address: String, name: String },
}

/// Callback signature for observers.
pub type EventListener = Box<dyn Fn(&WalletEvent) + Send + Sync>;

/// A minimal multi-listener event bus.
///
/// Listeners are invoked synchronously, in registration order, at the call
/// site of [`EventBus::emit`]; the core is responsible for calling `emit`
/// only after the relevant state mutation is already committed.
#[derive(Default, Clone)]
pub struct EventBus {
    listeners: Arc<Mutex<Vec<EventListener>>>,
}

impl EventBus {
    pub fn new() -> Self {
        EventBus::default()
    }

    /// Register a new observer. Returns nothing; there is no unsubscribe
    /// handle because the core never needs to remove a listener mid-session.
    pub fn subscribe(&self, listener: EventListener) {
        self.listeners.lock().expect("event bus poisoned").push(listener);
    }

    /// Notify every registered observer of `event`.
    pub fn emit(&self, event: WalletEvent) {
        for listener in self.listeners.lock().expect("event bus poisoned").iter() {
            listener(&event);
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.listeners.lock().map(|l| l.len()).unwrap_or(0);
        f.debug_struct("EventBus").field("listeners", &count).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn emits_to_all_listeners_in_order() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c1 = count.clone();
        bus.subscribe(Box::new(move |_| {
            c1.fetch_add(1, Ordering::SeqCst);
        }));
        let c2 = count.clone();
        bus.subscribe(Box::new(move |_| {
            c2.fetch_add(10, Ordering::SeqCst);
        }));

        bus.emit(WalletEvent::IdentityChanged {
            address: "alpha1abc".into(),
            index: 0,
        });

        assert_eq!(count.load(Ordering::SeqCst), 11);
    }
}
