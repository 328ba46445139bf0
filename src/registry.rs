//! Virtual event registry.
//!
//! Holds every logically pending scheduled callback together with its timing
//! metadata and, while globalized, the handle of its host-scheduler hook.
//! Entries are keyed by a monotonically increasing id, so map iteration
//! order is registration order — the deterministic tie-break for events due
//! at the same instant.

use crate::host::{HostCallback, HostHandle};
use crate::types::{EventId, EventKind, Time};
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::time::Duration;

/// Due-event batches are small in practice; avoid an allocation per tick.
pub(crate) type DueBatch = SmallVec<[EventId; 8]>;

/// One registered callback.
pub(crate) struct ScheduledEvent {
    handler: HostCallback,
    kind: EventKind,
    period: Duration,
    created_at: Time,
    last_fired_at: Time,
    host_hook: Option<HostHandle>,
}

impl ScheduledEvent {
    pub(crate) fn new(kind: EventKind, period: Duration, now: Time, handler: HostCallback) -> Self {
        Self {
            handler,
            kind,
            period,
            created_at: now,
            last_fired_at: now,
            host_hook: None,
        }
    }

    pub(crate) fn handler(&self) -> HostCallback {
        std::sync::Arc::clone(&self.handler)
    }

    pub(crate) fn host_hook(&self) -> Option<HostHandle> {
        self.host_hook
    }

    /// Delay still outstanding for a one-shot event; zero once overdue.
    fn remaining(&self, now: Time) -> Duration {
        self.period
            .saturating_sub(now.duration_since(self.created_at))
    }

    fn is_due(&self, now: Time) -> bool {
        match self.kind {
            EventKind::Once => now.duration_since(self.created_at) >= self.period,
            EventKind::Repeating => now.duration_since(self.last_fired_at) >= self.period,
        }
    }
}

/// Insertion-ordered collection of live events, unique by id.
#[derive(Default)]
pub(crate) struct EventRegistry {
    events: BTreeMap<u64, ScheduledEvent>,
}

impl EventRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, id: EventId, event: ScheduledEvent) {
        self.events.insert(id.as_u64(), event);
    }

    pub(crate) fn remove(&mut self, id: EventId) -> Option<ScheduledEvent> {
        self.events.remove(&id.as_u64())
    }

    pub(crate) fn len(&self) -> usize {
        self.events.len()
    }

    /// Ids of all events due at `now`, in registration order.
    pub(crate) fn due_ids(&self, now: Time) -> DueBatch {
        self.events
            .iter()
            .filter(|(_, event)| event.is_due(now))
            .map(|(&raw, _)| EventId::from_raw(raw))
            .collect()
    }

    /// Claims a due event for execution through the manual tick path.
    ///
    /// A one-shot event is removed and its hook (if any) returned for
    /// disarming; a repeating event has `last_fired_at` stamped to `now`
    /// and stays put. Returns `None` if the event is gone or — for a
    /// repeating event — no longer due, which happens when a reentrant
    /// tick inside an earlier handler already fired it.
    pub(crate) fn claim_due(
        &mut self,
        id: EventId,
        now: Time,
    ) -> Option<(HostCallback, Option<HostHandle>)> {
        match self.events.get(&id.as_u64())?.kind {
            EventKind::Once => {
                let event = self.events.remove(&id.as_u64())?;
                Some((event.handler, event.host_hook))
            }
            EventKind::Repeating => {
                let event = self.events.get_mut(&id.as_u64())?;
                if !event.is_due(now) {
                    return None;
                }
                event.last_fired_at = now;
                Some((std::sync::Arc::clone(&event.handler), None))
            }
        }
    }

    /// Stamps a repeating event as fired through the host path and returns
    /// its handler. `None` if the event has been cancelled meanwhile.
    pub(crate) fn mark_repeat_fired(&mut self, id: EventId, now: Time) -> Option<HostCallback> {
        let event = self.events.get_mut(&id.as_u64())?;
        event.last_fired_at = now;
        Some(std::sync::Arc::clone(&event.handler))
    }

    /// Detaches every host hook, returning them for cancellation.
    pub(crate) fn take_hooks(&mut self) -> Vec<HostHandle> {
        self.events
            .values_mut()
            .filter_map(|event| event.host_hook.take())
            .collect()
    }

    /// Ids of events currently lacking a host hook, in registration order.
    pub(crate) fn unhooked_ids(&self) -> Vec<EventId> {
        self.events
            .iter()
            .filter(|(_, event)| event.host_hook.is_none())
            .map(|(&raw, _)| EventId::from_raw(raw))
            .collect()
    }

    /// Kind and host-side arming delay for an event about to be globalized.
    ///
    /// `None` if the event is gone or already hooked. One-shot events arm
    /// with their remaining delay; repeating events with their interval.
    pub(crate) fn arming_info(&self, id: EventId, now: Time) -> Option<(EventKind, Duration)> {
        let event = self.events.get(&id.as_u64())?;
        if event.host_hook.is_some() {
            return None;
        }
        let delay = match event.kind {
            EventKind::Once => event.remaining(now),
            EventKind::Repeating => event.period,
        };
        Some((event.kind, delay))
    }

    /// Records the hook a freshly globalized event is armed under.
    ///
    /// Returns false if the event vanished while the hook was being armed;
    /// the caller must then disarm the orphaned hook.
    pub(crate) fn attach_hook(&mut self, id: EventId, hook: HostHandle) -> bool {
        match self.events.get_mut(&id.as_u64()) {
            Some(event) => {
                event.host_hook = Some(hook);
                true
            }
            None => false,
        }
    }

    /// Empties the registry, returning any hooks that still need disarming.
    pub(crate) fn drain_hooks_and_clear(&mut self) -> Vec<HostHandle> {
        let hooks = self.take_hooks();
        self.events.clear();
        hooks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn noop() -> HostCallback {
        Arc::new(|| {})
    }

    fn once_at(registry: &mut EventRegistry, raw: u64, delay_ms: u64, now: Time) -> EventId {
        let id = EventId::from_raw(raw);
        registry.insert(
            id,
            ScheduledEvent::new(EventKind::Once, Duration::from_millis(delay_ms), now, noop()),
        );
        id
    }

    #[test]
    fn due_respects_registration_order() {
        let mut registry = EventRegistry::new();
        let start = Time::ZERO;
        let a = once_at(&mut registry, 0, 20, start);
        let b = once_at(&mut registry, 1, 10, start);
        let c = once_at(&mut registry, 2, 30, start);

        let due = registry.due_ids(Time::from_millis(25));
        assert_eq!(due.as_slice(), &[a, b]);
        let due = registry.due_ids(Time::from_millis(35));
        assert_eq!(due.as_slice(), &[a, b, c]);
    }

    #[test]
    fn claim_removes_one_shot() {
        let mut registry = EventRegistry::new();
        let id = once_at(&mut registry, 0, 10, Time::ZERO);

        let now = Time::from_millis(10);
        assert!(registry.claim_due(id, now).is_some());
        assert_eq!(registry.len(), 0);
        assert!(registry.claim_due(id, now).is_none());
    }

    #[test]
    fn repeating_claim_requires_full_interval() {
        let mut registry = EventRegistry::new();
        let id = EventId::from_raw(0);
        registry.insert(
            id,
            ScheduledEvent::new(
                EventKind::Repeating,
                Duration::from_millis(10),
                Time::ZERO,
                noop(),
            ),
        );

        assert!(registry.claim_due(id, Time::from_millis(10)).is_some());
        // Fired at 10ms: not due again until 20ms.
        assert!(registry.claim_due(id, Time::from_millis(15)).is_none());
        assert!(registry.claim_due(id, Time::from_millis(20)).is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn arming_info_uses_remaining_delay() {
        let mut registry = EventRegistry::new();
        let id = once_at(&mut registry, 0, 50, Time::ZERO);

        let (kind, delay) = registry.arming_info(id, Time::from_millis(20)).unwrap();
        assert_eq!(kind, EventKind::Once);
        assert_eq!(delay, Duration::from_millis(30));

        // Overdue events arm immediately.
        let (_, delay) = registry.arming_info(id, Time::from_millis(80)).unwrap();
        assert_eq!(delay, Duration::ZERO);

        assert!(registry.attach_hook(id, HostHandle::from_raw(7)));
        assert!(registry.arming_info(id, Time::ZERO).is_none());
    }

    #[test]
    fn take_hooks_detaches_without_removing() {
        let mut registry = EventRegistry::new();
        let id = once_at(&mut registry, 0, 10, Time::ZERO);
        assert!(registry.attach_hook(id, HostHandle::from_raw(1)));

        let hooks = registry.take_hooks();
        assert_eq!(hooks, vec![HostHandle::from_raw(1)]);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.unhooked_ids(), vec![id]);
    }
}
