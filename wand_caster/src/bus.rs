//! Fan-out of cast events to every interested consumer.
//!
//! The matcher (or a manual trigger) publishes once; the burst simulator,
//! the tutor and the chime thread each hold their own `Receiver` and never
//! learn about one another.

use std::sync::mpsc::{self, Receiver, Sender};

use glam::Vec3;
use tracing::{debug, trace};

/// Where a cast came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CastSource {
    /// A traced path completed in the matcher.
    Gesture,
    /// A keyboard trigger; bypasses the matcher.
    Trigger,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CastEvent {
    pub spell_id: String,
    /// World-space point the burst erupts from.
    pub origin:   Vec3,
    pub source:   CastSource,
}

#[derive(Default)]
pub struct CastBus {
    subscribers: Vec<(&'static str, Sender<CastEvent>)>,
}

impl CastBus {
    pub fn new() -> Self { Self::default() }

    /// Register a consumer.  Events published after this call are delivered
    /// in publication order.
    pub fn subscribe(&mut self, name: &'static str) -> Receiver<CastEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push((name, tx));
        debug!(subscriber = name, "cast bus subscriber added");
        rx
    }

    /// Deliver `event` to every live subscriber and return how many got it.
    /// Subscribers whose receiver has been dropped are pruned.
    pub fn publish(&mut self, event: CastEvent) -> usize {
        trace!(spell = %event.spell_id, source = ?event.source, "cast published");
        self.subscribers.retain(|(name, tx)| {
            let alive = tx.send(event.clone()).is_ok();
            if !alive { debug!(subscriber = *name, "cast bus subscriber gone"); }
            alive
        });
        self.subscribers.len()
    }

    pub fn subscriber_count(&self) -> usize { self.subscribers.len() }
}
