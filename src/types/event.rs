//! Event identity and kind.

use std::fmt;

/// Identity of a scheduled event.
///
/// Ids are allocated from a per-loop monotonic counter and never reused, so
/// id order equals registration order and a stale id can be cancelled
/// harmlessly after its event has fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId(u64);

impl EventId {
    /// Wraps a raw id value.
    #[inline]
    #[must_use]
    pub(crate) const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw id value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.0)
    }
}

/// Whether a scheduled event fires once or repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Fires once after its delay, then leaves the registry.
    Once,
    /// Fires every interval until explicitly cancelled.
    Repeating,
}

impl EventKind {
    /// Returns true for [`EventKind::Repeating`].
    #[must_use]
    pub const fn is_repeating(self) -> bool {
        matches!(self, Self::Repeating)
    }
}
