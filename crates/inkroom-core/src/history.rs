//! Bounded undo/redo history of full scene snapshots.

use crate::elements::Element;
use std::collections::VecDeque;

/// Default number of snapshots kept.
pub const MAX_UNDO_HISTORY: usize = 100;

/// Undo/redo stacks of live-element snapshots.
///
/// The top of the undo stack is always the current state. Undo never pops
/// the last remaining snapshot.
#[derive(Debug, Clone)]
pub struct UndoLedger {
    undo_stack: VecDeque<Vec<Element>>,
    redo_stack: Vec<Vec<Element>>,
    limit: usize,
}

impl Default for UndoLedger {
    fn default() -> Self {
        Self::new(Vec::new(), MAX_UNDO_HISTORY)
    }
}

impl UndoLedger {
    /// Start a ledger whose base state is `initial`.
    pub fn new(initial: Vec<Element>, limit: usize) -> Self {
        let mut undo_stack = VecDeque::new();
        undo_stack.push_back(initial);
        Self {
            undo_stack,
            redo_stack: Vec::new(),
            limit: limit.max(1),
        }
    }

    /// Drop all history and start over from `base`.
    pub fn reset(&mut self, base: Vec<Element>) {
        self.undo_stack.clear();
        self.undo_stack.push_back(base);
        self.redo_stack.clear();
    }

    /// Record the state after a committed mutation.
    pub fn push_state(&mut self, elements: Vec<Element>) {
        self.undo_stack.push_back(elements);
        while self.undo_stack.len() > self.limit {
            self.undo_stack.pop_front();
        }
        self.redo_stack.clear();
    }

    /// Step back one snapshot and return the state to restore.
    pub fn undo(&mut self) -> Option<&[Element]> {
        if self.undo_stack.len() <= 1 {
            return None;
        }
        let current = self.undo_stack.pop_back()?;
        self.redo_stack.push(current);
        self.undo_stack.back().map(Vec::as_slice)
    }

    /// Re-apply the most recently undone snapshot.
    pub fn redo(&mut self) -> Option<&[Element]> {
        let next = self.redo_stack.pop()?;
        self.undo_stack.push_back(next);
        self.undo_stack.back().map(Vec::as_slice)
    }

    /// The snapshot for the current state.
    pub fn current(&self) -> &[Element] {
        self.undo_stack.back().map(Vec::as_slice).unwrap_or_default()
    }

    pub fn can_undo(&self) -> bool {
        self.undo_stack.len() > 1
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Number of snapshots on the undo stack, current state included.
    pub fn depth(&self) -> usize {
        self.undo_stack.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::ElementStyle;
    use kurbo::Rect;

    fn state(n: usize) -> Vec<Element> {
        (0..n)
            .map(|i| {
                let x = i as f64 * 10.0;
                Element::rectangle(Rect::new(x, 0.0, x + 5.0, 5.0), ElementStyle::default())
            })
            .collect()
    }

    #[test]
    fn test_base_is_never_discarded() {
        let mut ledger = UndoLedger::default();
        assert!(ledger.undo().is_none());
        ledger.push_state(state(1));
        assert_eq!(ledger.undo().map(<[Element]>::len), Some(0));
        assert!(ledger.undo().is_none());
    }

    #[test]
    fn test_undo_redo_inverse() {
        let states: Vec<Vec<Element>> = (1..=6).map(state).collect();
        let mut ledger = UndoLedger::new(Vec::new(), MAX_UNDO_HISTORY);
        for s in &states {
            ledger.push_state(s.clone());
        }
        let n = states.len();
        for _ in 0..n - 1 {
            ledger.undo();
        }
        assert_eq!(ledger.undo_stack.back(), Some(&states[0]));
        let mut last = None;
        for _ in 0..n - 1 {
            last = ledger.redo().map(<[Element]>::to_vec);
        }
        assert_eq!(last.as_ref(), Some(&states[n - 1]));
        assert!(!ledger.can_redo());
    }

    #[test]
    fn test_push_clears_redo() {
        let mut ledger = UndoLedger::default();
        ledger.push_state(state(1));
        ledger.push_state(state(2));
        ledger.undo();
        assert!(ledger.can_redo());
        ledger.push_state(state(3));
        assert!(!ledger.can_redo());
        assert!(ledger.redo().is_none());
    }

    #[test]
    fn test_cap_evicts_oldest() {
        let mut ledger = UndoLedger::new(Vec::new(), 3);
        for i in 1..=5 {
            ledger.push_state(state(i));
        }
        assert_eq!(ledger.depth(), 3);
        assert_eq!(ledger.undo().map(<[Element]>::len), Some(4));
        assert_eq!(ledger.undo().map(<[Element]>::len), Some(3));
        assert!(ledger.undo().is_none());
    }

    #[test]
    fn test_current_tracks_top_of_stack() {
        let mut ledger = UndoLedger::default();
        assert!(ledger.current().is_empty());
        ledger.push_state(state(2));
        assert_eq!(ledger.current().len(), 2);
        ledger.undo();
        assert!(ledger.current().is_empty());
        ledger.redo();
        assert_eq!(ledger.current().len(), 2);
    }
}
