//! Session notifications and scoped listener registration.

use crate::session::CaptureResult;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use target_capture_gate::GateReport;

#[derive(Clone, Debug)]
pub enum SessionEvent {
    /// A registered target was found while idle and is now current.
    TargetFound { target_id: String },
    /// The tracker lost a target. `target_id` is the current target, if any.
    TargetLost { target_id: Option<String> },
    /// All capture requirements became satisfied.
    GateOpened(GateReport),
    /// At least one capture requirement stopped being satisfied.
    GateClosed(GateReport),
    /// A capture was produced.
    Captured(Arc<CaptureResult>),
}

type Listener = Box<dyn FnMut(&SessionEvent)>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(u64, Listener)>,
    // removals requested while `entries` was taken out for dispatch
    dead: Vec<u64>,
}

/// Single-threaded fan-out of [`SessionEvent`]s.
///
/// Listeners may subscribe or drop subscriptions from inside a callback.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Rc<RefCell<Listeners>>,
}

/// Keeps a listener registered; dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes the listener immediately"]
pub struct Subscription {
    id: u64,
    bus: Weak<RefCell<Listeners>>,
}

impl Subscription {
    /// Explicitly end the subscription (same as dropping it).
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(bus) = self.bus.upgrade() else {
            return;
        };
        let mut l = bus.borrow_mut();
        let before = l.entries.len();
        l.entries.retain(|(id, _)| *id != self.id);
        if l.entries.len() == before {
            l.dead.push(self.id);
        }
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: impl FnMut(&SessionEvent) + 'static) -> Subscription {
        let mut l = self.inner.borrow_mut();
        let id = l.next_id;
        l.next_id += 1;
        l.entries.push((id, Box::new(listener)));
        Subscription {
            id,
            bus: Rc::downgrade(&self.inner),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    pub fn emit(&self, event: &SessionEvent) {
        let mut dispatching = std::mem::take(&mut self.inner.borrow_mut().entries);
        for (_, listener) in dispatching.iter_mut() {
            listener(event);
        }

        let mut l = self.inner.borrow_mut();
        let added = std::mem::replace(&mut l.entries, dispatching);
        l.entries.extend(added);
        let dead = std::mem::take(&mut l.dead);
        l.entries.retain(|(id, _)| !dead.contains(id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lost() -> SessionEvent {
        SessionEvent::TargetLost { target_id: None }
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let bus = EventBus::new();
        let hits = Rc::new(RefCell::new(0));
        let h = hits.clone();
        let sub = bus.subscribe(move |_| *h.borrow_mut() += 1);
        bus.emit(&lost());
        drop(sub);
        bus.emit(&lost());
        assert_eq!(*hits.borrow(), 1);
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn unsubscribe_from_inside_callback() {
        let bus = EventBus::new();
        let slot: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let hits = Rc::new(RefCell::new(0));
        let (s, h) = (slot.clone(), hits.clone());
        let sub = bus.subscribe(move |_| {
            *h.borrow_mut() += 1;
            s.borrow_mut().take();
        });
        *slot.borrow_mut() = Some(sub);
        bus.emit(&lost());
        bus.emit(&lost());
        assert_eq!(*hits.borrow(), 1);
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn subscription_outliving_bus_is_harmless() {
        let bus = EventBus::new();
        let sub = bus.subscribe(|_| {});
        drop(bus);
        sub.unsubscribe();
    }
}
