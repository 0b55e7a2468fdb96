//! Label synchronization after server-confirmed updates.
//!
//! The backend response is the only source of truth: nothing here guesses at
//! the outcome of a request that has not been answered. Responses for an
//! element are tagged with the `update_counter` they were requested with, and
//! only the most recently issued counter per element may be applied.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::models::{Document, Element, Label, LabelCount, LabelDelta};

/// Hands out monotonically increasing `update_counter` values and remembers
/// the latest one issued per element.
#[derive(Debug, Clone, Default)]
pub struct UpdateCounters {
    next: u64,
    latest: HashMap<String, u64>,
}

impl UpdateCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a counter for a new request on `element_id`.
    pub fn issue(&mut self, element_id: &str) -> u64 {
        self.next += 1;
        self.latest.insert(element_id.to_string(), self.next);
        self.next
    }

    /// Whether `counter` is still the latest request for `element_id`.
    pub fn is_current(&self, element_id: &str, counter: u64) -> bool {
        self.latest.get(element_id) == Some(&counter)
    }

    pub fn latest(&self, element_id: &str) -> Option<u64> {
        self.latest.get(element_id).copied()
    }

    /// Forget `element_id` once the response for `counter` has been handled.
    ///
    /// Only the current counter settles; any older response still in flight
    /// keeps failing [`is_current`](Self::is_current).
    pub fn settle(&mut self, element_id: &str, counter: u64) -> bool {
        if self.is_current(element_id, counter) {
            self.latest.remove(element_id);
            true
        } else {
            false
        }
    }

    /// Elements with a request still outstanding.
    pub fn pending(&self) -> usize {
        self.latest.len()
    }
}

/// Elements labeled positive for the current category, keyed by element id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositiveLabels {
    elements: BTreeMap<String, Element>,
}

impl PositiveLabels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole projection with a server-provided list.
    pub fn replace(&mut self, elements: Vec<Element>) {
        self.elements = elements
            .into_iter()
            .filter(|e| e.user_label == Label::Pos)
            .map(|e| (e.id.clone(), e))
            .collect();
    }

    pub fn contains(&self, element_id: &str) -> bool {
        self.elements.contains_key(element_id)
    }

    pub fn get(&self, element_id: &str) -> Option<&Element> {
        self.elements.get(element_id)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Element> {
        self.elements.values()
    }

    fn upsert(&mut self, element: Element) {
        self.elements.insert(element.id.clone(), element);
    }

    fn remove(&mut self, element_id: &str) -> Option<Element> {
        self.elements.remove(element_id)
    }
}

/// Counters touched by a confirmed label.
#[derive(Debug)]
pub struct LabelCounters<'a> {
    /// Current document only.
    pub document: &'a mut LabelCount,
    /// Whole workspace; survives document switches.
    pub global: &'a mut LabelCount,
}

/// Apply a confirmed element state to the current document, the positive
/// projection and the label counters.
///
/// `known` remembers the last confirmed label of every element, so an element
/// outside the current document still yields the right transition for the
/// workspace counters. Returns the delta applied to the document counters,
/// which is zero for elements of other documents.
///
/// Re-applying the same confirmed element is a no-op and returns a zero delta.
pub fn apply_confirmed_label(
    document: Option<&mut Document>,
    positives: &mut PositiveLabels,
    known: &mut HashMap<String, Label>,
    counters: LabelCounters<'_>,
    confirmed: &Element,
) -> LabelDelta {
    let fallback = known
        .get(&confirmed.id)
        .copied()
        .unwrap_or_else(|| projection_label(positives, &confirmed.id));

    let in_document_previous = document.and_then(|doc| {
        doc.elements
            .iter_mut()
            .find(|e| e.id == confirmed.id)
            .map(|existing| std::mem::replace(&mut existing.user_label, confirmed.user_label))
    });
    let previous = in_document_previous.unwrap_or(fallback);

    if confirmed.user_label == Label::Pos {
        positives.upsert(confirmed.clone());
    } else if positives.remove(&confirmed.id).is_some() {
        debug!("Removed {} from positive labels", confirmed.id);
    }
    known.insert(confirmed.id.clone(), confirmed.user_label);

    let delta = LabelDelta::between(previous, confirmed.user_label);
    counters.global.apply(delta);
    if in_document_previous.is_none() {
        return LabelDelta::ZERO;
    }
    counters.document.apply(delta);
    delta
}

fn projection_label(positives: &PositiveLabels, element_id: &str) -> Label {
    if positives.contains(element_id) {
        Label::Pos
    } else {
        Label::None
    }
}
