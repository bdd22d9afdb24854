//! Hand-off of tracker callbacks arriving on other threads.
//!
//! Events are applied in arrival order at the start of the next tick, so a
//! "found" is always in effect before that tick's gate evaluation and a
//! "lost" has always cleared state before it.

use crossbeam_channel::{unbounded, Receiver, SendError, Sender};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TrackerEvent {
    Found(String),
    Lost,
}

/// Cloneable, `Send` handle for posting tracker events to a session.
#[derive(Clone, Debug)]
pub struct TrackerEventSender {
    tx: Sender<TrackerEvent>,
}

impl TrackerEventSender {
    pub fn target_found(&self, id: impl Into<String>) -> Result<(), SendError<TrackerEvent>> {
        self.tx.send(TrackerEvent::Found(id.into()))
    }

    pub fn target_lost(&self) -> Result<(), SendError<TrackerEvent>> {
        self.tx.send(TrackerEvent::Lost)
    }
}

pub(crate) struct TrackerEventQueue {
    tx: Sender<TrackerEvent>,
    rx: Receiver<TrackerEvent>,
}

impl TrackerEventQueue {
    pub(crate) fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    pub(crate) fn sender(&self) -> TrackerEventSender {
        TrackerEventSender {
            tx: self.tx.clone(),
        }
    }

    pub(crate) fn drain(&self) -> Vec<TrackerEvent> {
        self.rx.try_iter().collect()
    }
}
