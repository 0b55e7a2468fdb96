//! Previous/next document navigation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Direction of a document step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Prev,
    Next,
}

/// Index of the neighbouring document, or `None` when already at the edge.
pub fn adjacent_index(direction: Direction, current: usize, count: usize) -> Option<usize> {
    if count == 0 {
        return None;
    }
    match direction {
        Direction::Prev => current.checked_sub(1),
        Direction::Next if current + 1 < count => Some(current + 1),
        Direction::Next => None,
    }
}

/// Result of a navigation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// The document at this index is now current.
    Moved(usize),
    /// Already at the first/last document; nothing was fetched.
    NoOp,
    /// Another navigation request is still outstanding; this one was dropped.
    Busy,
    /// The view was closed before the document arrived.
    Detached,
}

/// Admits one navigation request at a time.
#[derive(Debug, Clone, Default)]
pub struct NavigationGate {
    in_flight: Arc<AtomicBool>,
}

impl NavigationGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the gate; `None` if a request is already running.
    pub fn try_enter(&self) -> Option<NavigationPermit> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| NavigationPermit {
                in_flight: self.in_flight.clone(),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

/// Held for the duration of one navigation request; releases the gate on drop.
#[derive(Debug)]
pub struct NavigationPermit {
    in_flight: Arc<AtomicBool>,
}

impl Drop for NavigationPermit {
    fn drop(&mut self) {
        self.in_flight.store(false, Ordering::Release);
    }
}
