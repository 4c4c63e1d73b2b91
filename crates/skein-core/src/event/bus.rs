//! Scoped delivery of change events.
//!
//! Subscribers register for a scope (one list, or everything visible to one
//! user) and receive only events published to that scope. Delivery is
//! fan-out over unbounded channels; a slow subscriber buffers, a dropped
//! one is pruned on the next publish to its scope.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::mpsc::{Receiver, Sender, channel};
use tracing::trace;

use super::types::ChangeEvent;
use crate::model::{ListId, UserId};

/// What slice of the change stream a subscriber wants.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Events touching one list.
    List(ListId),
    /// Events touching anything visible to one user.
    User(UserId),
}

/// Fan-out hub for [`ChangeEvent`]s.
///
/// Publishing never blocks and never fails: events to a scope with no live
/// subscribers are dropped.
#[derive(Debug, Default)]
pub struct ChangeEventBus {
    subscribers: Mutex<HashMap<Scope, Vec<Sender<ChangeEvent>>>>,
}

impl ChangeEventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber for a scope. Dropping the receiver ends the
    /// subscription.
    pub fn subscribe(&self, scope: Scope) -> Receiver<ChangeEvent> {
        let (tx, rx) = channel();
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.entry(scope).or_default().push(tx);
        }
        rx
    }

    /// Deliver an event to every subscriber of every given scope. A
    /// subscriber registered for more than one matching scope receives the
    /// event once per scope.
    pub fn publish(&self, scopes: &[Scope], event: &ChangeEvent) {
        let Ok(mut subscribers) = self.subscribers.lock() else {
            return;
        };
        for scope in scopes {
            let Some(senders) = subscribers.get_mut(scope) else {
                continue;
            };
            senders.retain(|sender| sender.send(event.clone()).is_ok());
            if senders.is_empty() {
                subscribers.remove(scope);
            }
        }
        trace!(event_type = %event.event_type(), scopes = scopes.len(), "event published");
    }

    /// Number of scopes with at least one live subscriber.
    #[must_use]
    pub fn scope_count(&self) -> usize {
        self.subscribers.lock().map(|s| s.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::types::ChangeKind;

    fn list_event(ts: i64) -> ChangeEvent {
        ChangeEvent::List {
            kind: ChangeKind::Update,
            before: None,
            after: None,
            wall_ts_us: ts,
        }
    }

    fn list_scope(s: &str) -> Scope {
        Scope::List(ListId::new_unchecked(s))
    }

    #[test]
    fn delivers_only_to_matching_scope() {
        let bus = ChangeEventBus::new();
        let rx_a = bus.subscribe(list_scope("sl-a"));
        let rx_b = bus.subscribe(list_scope("sl-b"));

        bus.publish(&[list_scope("sl-a")], &list_event(1));

        assert_eq!(rx_a.try_recv().expect("delivered").wall_ts_us(), 1);
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn one_event_fans_out_to_all_subscribers() {
        let bus = ChangeEventBus::new();
        let rx_1 = bus.subscribe(list_scope("sl-a"));
        let rx_2 = bus.subscribe(list_scope("sl-a"));

        bus.publish(&[list_scope("sl-a")], &list_event(2));

        assert!(rx_1.try_recv().is_ok());
        assert!(rx_2.try_recv().is_ok());
    }

    #[test]
    fn user_and_list_scopes_are_distinct() {
        let bus = ChangeEventBus::new();
        let rx_user = bus.subscribe(Scope::User(UserId::new_unchecked("su-alice")));

        bus.publish(
            &[
                list_scope("sl-a"),
                Scope::User(UserId::new_unchecked("su-alice")),
            ],
            &list_event(3),
        );

        assert!(rx_user.try_recv().is_ok());
        assert!(rx_user.try_recv().is_err(), "exactly once per scope");
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let bus = ChangeEventBus::new();
        let rx = bus.subscribe(list_scope("sl-a"));
        assert_eq!(bus.scope_count(), 1);

        drop(rx);
        bus.publish(&[list_scope("sl-a")], &list_event(4));
        assert_eq!(bus.scope_count(), 0);
    }

    #[test]
    fn publish_to_silent_scope_is_a_noop() {
        let bus = ChangeEventBus::new();
        bus.publish(&[list_scope("sl-nobody")], &list_event(5));
        assert_eq!(bus.scope_count(), 0);
    }
}
