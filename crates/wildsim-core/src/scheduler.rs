//! Delayed event queue keyed by absolute tick.
//!
//! All deferred work in the simulation (extinguishing, corpse removal,
//! reinforcements, drying off) is scheduled here rather than waited on.
//! Events due on the same tick fire in the order they were scheduled.

use std::collections::BTreeMap;

use hecs::Entity;

/// Work to perform on a piece at a future tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayedEvent {
    /// End the piece's current burn episode
    StopBurning,
    /// Remove a lingering corpse
    Destroy,
    /// Send same-kind neighbours after `threat`
    Reinforce { threat: Entity },
    /// Clear an expired wet status
    DryOff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scheduled {
    pub due: u64,
    pub entity: Entity,
    pub event: DelayedEvent,
}

#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    queue: BTreeMap<u64, Vec<(Entity, DelayedEvent)>>,
    len: usize,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.len = 0;
    }

    /// Schedule `event` for `entity` `delay` ticks after `now` (at least one).
    /// Returns the tick it will fire on.
    pub fn schedule(&mut self, now: u64, delay: u64, entity: Entity, event: DelayedEvent) -> u64 {
        let due = now + delay.max(1);
        self.queue.entry(due).or_default().push((entity, event));
        self.len += 1;
        due
    }

    /// Drop every pending event for `entity`. Returns how many were removed.
    pub fn cancel_all_for(&mut self, entity: Entity) -> usize {
        self.cancel_where(entity, |_| true)
    }

    /// Drop pending events for `entity` that match `predicate`.
    pub fn cancel_where<F>(&mut self, entity: Entity, predicate: F) -> usize
    where
        F: Fn(&DelayedEvent) -> bool,
    {
        let mut removed = 0;
        self.queue.retain(|_, pending| {
            let before = pending.len();
            pending.retain(|(e, ev)| !(*e == entity && predicate(ev)));
            removed += before - pending.len();
            !pending.is_empty()
        });
        self.len -= removed;
        removed
    }

    pub fn has_pending(&self, entity: Entity, event: DelayedEvent) -> bool {
        self.queue
            .values()
            .any(|pending| pending.iter().any(|(e, ev)| *e == entity && *ev == event))
    }

    /// Remove and return everything due at or before `now`, in firing order.
    pub fn drain_due(&mut self, now: u64) -> Vec<Scheduled> {
        let later = self.queue.split_off(&(now + 1));
        let due = std::mem::replace(&mut self.queue, later);
        let out: Vec<Scheduled> = due
            .into_iter()
            .flat_map(|(tick, pending)| {
                pending.into_iter().map(move |(entity, event)| Scheduled {
                    due: tick,
                    entity,
                    event,
                })
            })
            .collect();
        self.len -= out.len();
        out
    }

    /// Every pending event, in firing order.
    pub fn iter(&self) -> impl Iterator<Item = Scheduled> + '_ {
        self.queue.iter().flat_map(|(tick, pending)| {
            pending.iter().map(move |(entity, event)| Scheduled {
                due: *tick,
                entity: *entity,
                event: *event,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hecs::World;

    #[test]
    fn test_drain_due_in_order() {
        let mut world = World::new();
        let a = world.spawn(());
        let b = world.spawn(());
        let mut queue = EventQueue::new();
        queue.schedule(0, 5, a, DelayedEvent::StopBurning);
        queue.schedule(0, 3, b, DelayedEvent::Destroy);
        queue.schedule(0, 3, a, DelayedEvent::DryOff);
        assert_eq!(queue.len(), 3);

        assert!(queue.drain_due(2).is_empty());
        let due = queue.drain_due(4);
        assert_eq!(due.len(), 2);
        assert_eq!(due[0].entity, b);
        assert_eq!(due[1].event, DelayedEvent::DryOff);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.drain_due(5)[0].event, DelayedEvent::StopBurning);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_zero_delay_fires_next_tick() {
        let mut world = World::new();
        let a = world.spawn(());
        let mut queue = EventQueue::new();
        assert_eq!(queue.schedule(10, 0, a, DelayedEvent::Destroy), 11);
        assert!(queue.drain_due(10).is_empty());
    }

    #[test]
    fn test_cancel() {
        let mut world = World::new();
        let a = world.spawn(());
        let b = world.spawn(());
        let mut queue = EventQueue::new();
        queue.schedule(0, 1, a, DelayedEvent::StopBurning);
        queue.schedule(0, 2, a, DelayedEvent::Destroy);
        queue.schedule(0, 2, b, DelayedEvent::Reinforce { threat: a });

        assert_eq!(queue.cancel_where(a, |e| *e == DelayedEvent::StopBurning), 1);
        assert!(queue.has_pending(a, DelayedEvent::Destroy));
        assert_eq!(queue.cancel_all_for(a), 1);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.iter().next().map(|s| s.entity), Some(b));
    }
}
