//! Buffering for future-step events.
//!
//! Consensus events can legitimately arrive before the local state
//! machine reaches their (round, step): peers run ahead. Such events are
//! parked here and replayed on phase entry. Stale events and events past
//! the horizon are dropped.

use std::collections::BTreeMap;
use tracing::trace;

/// Cap on events stored per (round, step) slot.
const MAX_PER_SLOT: usize = 256;

/// Ordered store of not-yet-due events.
#[derive(Debug)]
pub struct EventQueue<T> {
    /// How many rounds ahead of the current round we keep.
    horizon: u64,
    current_round: u64,
    slots: BTreeMap<(u64, u8), Vec<T>>,
}

impl<T> EventQueue<T> {
    pub fn new(horizon: u64) -> Self {
        EventQueue {
            horizon,
            current_round: 0,
            slots: BTreeMap::new(),
        }
    }

    /// Advance the round; everything below it is dropped.
    pub fn update_round(&mut self, round: u64) {
        self.current_round = round;
        self.slots.retain(|(r, _), _| *r >= round);
    }

    /// Park an event for (round, step).
    pub fn put(&mut self, round: u64, step: u8, event: T) {
        if round < self.current_round || round > self.current_round + self.horizon {
            trace!(round, step, current = self.current_round, "event outside horizon dropped");
            return;
        }
        let slot = self.slots.entry((round, step)).or_default();
        if slot.len() >= MAX_PER_SLOT {
            trace!(round, step, "event slot full, dropped");
            return;
        }
        slot.push(event);
    }

    /// Remove and return everything parked for (round, step).
    pub fn drain(&mut self, round: u64, step: u8) -> Vec<T> {
        self.slots.remove(&(round, step)).unwrap_or_default()
    }

    /// Remove and return everything parked for a round, in step order.
    pub fn drain_round(&mut self, round: u64) -> Vec<T> {
        let steps: Vec<(u64, u8)> = self
            .slots
            .range((round, u8::MIN)..=(round, u8::MAX))
            .map(|(k, _)| *k)
            .collect();
        let mut out = Vec::new();
        for key in steps {
            if let Some(mut events) = self.slots.remove(&key) {
                out.append(&mut events);
            }
        }
        out
    }

    /// Number of parked events across all slots.
    pub fn len(&self) -> usize {
        self.slots.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_and_drain() {
        let mut q: EventQueue<u32> = EventQueue::new(10);
        q.update_round(5);
        q.put(5, 2, 1);
        q.put(5, 2, 2);
        q.put(5, 3, 3);
        assert_eq!(q.drain(5, 2), vec![1, 2]);
        assert_eq!(q.drain(5, 2), Vec::<u32>::new());
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn test_stale_round_dropped() {
        let mut q: EventQueue<u32> = EventQueue::new(10);
        q.update_round(5);
        q.put(4, 1, 1);
        assert!(q.is_empty());
    }

    #[test]
    fn test_beyond_horizon_dropped() {
        let mut q: EventQueue<u32> = EventQueue::new(3);
        q.update_round(5);
        q.put(9, 1, 1);
        assert!(q.is_empty());
        q.put(8, 1, 1);
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn test_round_advance_clears_old_slots() {
        let mut q: EventQueue<u32> = EventQueue::new(10);
        q.update_round(5);
        q.put(5, 1, 1);
        q.put(6, 1, 2);
        q.update_round(6);
        assert_eq!(q.drain(5, 1), Vec::<u32>::new());
        assert_eq!(q.drain(6, 1), vec![2]);
    }

    #[test]
    fn test_drain_round_in_step_order() {
        let mut q: EventQueue<u32> = EventQueue::new(10);
        q.update_round(3);
        q.put(3, 5, 50);
        q.put(3, 1, 10);
        q.put(4, 1, 99);
        assert_eq!(q.drain_round(3), vec![10, 50]);
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn test_slot_capacity_bounded() {
        let mut q: EventQueue<u32> = EventQueue::new(10);
        q.update_round(1);
        for i in 0..(MAX_PER_SLOT as u32 + 50) {
            q.put(1, 1, i);
        }
        assert_eq!(q.len(), MAX_PER_SLOT);
    }
}
