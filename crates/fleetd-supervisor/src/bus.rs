//! One-shot filtered event subscriptions.

use crate::event::{Event, EventType};
use parking_lot::Mutex;
use tokio::sync::oneshot;

/// A pending one-shot subscription: program name, accepted event types, and
/// the delivery channel. The oneshot sender is consumed on delivery, which
/// gives the send-once-then-closed contract for free.
struct Subscription {
    program: String,
    event_types: Vec<EventType>,
    sender: oneshot::Sender<Event>,
}

/// Concurrent registry of pending one-shot subscriptions.
///
/// `subscribe` registers interest in the next matching event and returns the
/// receiving half immediately; `publish` delivers a fresh event to every
/// matching subscription and removes them from the registry. A subscription
/// that never matches stays registered until its receiver is dropped.
#[derive(Default)]
pub struct EventBus {
    subscriptions: Mutex<Vec<Subscription>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a one-shot subscription for the next event of `program`
    /// whose type is in `event_types`. Never blocks; the channel is created
    /// outside the registry lock.
    pub fn subscribe(
        &self,
        program: &str,
        event_types: &[EventType],
    ) -> oneshot::Receiver<Event> {
        let (sender, receiver) = oneshot::channel();
        let subscription = Subscription {
            program: program.to_string(),
            event_types: event_types.to_vec(),
            sender,
        };
        self.subscriptions.lock().push(subscription);
        receiver
    }

    /// Deliver `event` to every matching subscription (fan-out) and prune
    /// the satisfied ones. The registry lock is held for the whole
    /// scan-and-prune pass, but a send on a oneshot channel never blocks.
    pub fn publish(&self, event: &Event) {
        let mut subscriptions = self.subscriptions.lock();
        let mut remaining = Vec::with_capacity(subscriptions.len());
        for sub in subscriptions.drain(..) {
            // lost interest; drop the registration
            if sub.sender.is_closed() {
                continue;
            }
            if sub.program == event.program && sub.event_types.contains(&event.event_type) {
                // a failed send means the receiver was dropped concurrently
                let _ = sub.sender.send(event.clone());
            } else {
                remaining.push(sub);
            }
        }
        *subscriptions = remaining;
    }

    #[cfg(test)]
    fn pending(&self) -> usize {
        self.subscriptions.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tokio::sync::oneshot::error::TryRecvError;

    fn event(program: &str, event_type: EventType) -> Event {
        Event {
            time: Utc::now(),
            event_type,
            program: program.to_string(),
        }
    }

    #[tokio::test]
    async fn test_fan_out_to_all_matching_subscriptions() {
        let bus = EventBus::new();
        let receivers: Vec<_> = (0..3)
            .map(|_| bus.subscribe("fleet-update-perform", &[EventType::ExitedExpected]))
            .collect();

        let e = event("fleet-update-perform", EventType::ExitedExpected);
        bus.publish(&e);

        for rx in receivers {
            assert_eq!(rx.await.unwrap(), e);
        }
        assert_eq!(bus.pending(), 0);
    }

    #[tokio::test]
    async fn test_one_shot_semantics() {
        let bus = EventBus::new();
        let rx = bus.subscribe("supervisord", &[EventType::LogReopen]);

        bus.publish(&event("supervisord", EventType::LogReopen));
        assert_eq!(rx.await.unwrap().event_type, EventType::LogReopen);

        // the subscription is gone; an identical event goes nowhere
        assert_eq!(bus.pending(), 0);
        bus.publish(&event("supervisord", EventType::LogReopen));
    }

    #[tokio::test]
    async fn test_non_matching_events_are_not_delivered() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe("fleet-update-perform", &[EventType::Fatal]);

        // wrong program
        bus.publish(&event("nginx", EventType::Fatal));
        // wrong type
        bus.publish(&event("fleet-update-perform", EventType::Running));
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
        assert_eq!(bus.pending(), 1);

        bus.publish(&event("fleet-update-perform", EventType::Fatal));
        assert_eq!(rx.await.unwrap().event_type, EventType::Fatal);
    }

    #[tokio::test]
    async fn test_multiple_accepted_types() {
        let bus = EventBus::new();
        let rx = bus.subscribe(
            "fleet-update-perform",
            &[EventType::ExitedExpected, EventType::ExitedUnexpected],
        );

        bus.publish(&event("fleet-update-perform", EventType::ExitedUnexpected));
        assert_eq!(rx.await.unwrap().event_type, EventType::ExitedUnexpected);
    }

    #[tokio::test]
    async fn test_dropped_receiver_is_pruned() {
        let bus = EventBus::new();
        let rx = bus.subscribe("fleet-update-perform", &[EventType::Fatal]);
        drop(rx);

        bus.publish(&event("nginx", EventType::Running));
        assert_eq!(bus.pending(), 0);
    }
}
