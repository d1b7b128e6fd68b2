//! Scene: the canonical element collection for an open room.
//!
//! Elements are keyed by id and painted in insertion order. Deleting an
//! element only sets its tombstone flag; nothing is physically removed
//! while the scene lives.

use crate::elements::{Element, ElementId};
use std::collections::{HashMap, HashSet};

/// Callback invoked with the live elements after every mutation.
pub type SceneListener = Box<dyn FnMut(&[&Element])>;

/// Handle returned by [`Scene::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(usize);

/// Read access to the scene.
pub trait SceneReader {
    /// Look up an element by id, including tombstoned ones.
    fn get(&self, id: ElementId) -> Option<&Element>;

    /// Live elements in paint order (bottom first).
    fn all(&self) -> Vec<&Element>;

    /// Full copy of the live element list.
    fn snapshot(&self) -> Vec<Element> {
        self.all().into_iter().cloned().collect()
    }
}

/// Write access to the scene.
pub trait SceneWriter: SceneReader {
    /// Append an element. An existing id is replaced in place.
    fn add(&mut self, element: Element);

    /// Full replace of an element. Unknown ids are appended.
    fn update(&mut self, element: Element);

    /// Tombstone an element. Returns false if it was unknown or already deleted.
    fn delete(&mut self, id: ElementId) -> bool;

    /// Tombstone several elements with a single notification.
    fn delete_many(&mut self, ids: &[ElementId]) -> Vec<ElementId>;

    /// Move the scene from history snapshot `from` to snapshot `to`.
    ///
    /// Only elements that differ between the two snapshots are touched:
    /// those only in `from` are tombstoned, those new or changed in `to` are
    /// written back (and resurrected if needed). Anything else, such as
    /// elements received from peers in between, is left alone. Listeners are
    /// notified once.
    fn restore(&mut self, from: &[Element], to: &[Element]) -> SceneDiff;
}

/// Changes needed to bring peers in line after [`SceneWriter::restore`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneDiff {
    /// Elements whose content changed or that were resurrected.
    pub changed: Vec<Element>,
    /// Elements that were live and are now tombstoned.
    pub removed: Vec<ElementId>,
}

impl SceneDiff {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.removed.is_empty()
    }
}

/// The element collection with change notification.
#[derive(Default)]
pub struct Scene {
    elements: HashMap<ElementId, Element>,
    order: Vec<ElementId>,
    listeners: Vec<(ListenerId, SceneListener)>,
    next_listener: usize,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener called after every mutation.
    pub fn subscribe(&mut self, listener: impl FnMut(&[&Element]) + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) {
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
    }

    /// Number of elements ever added, tombstones included.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Live elements from top to bottom, for hit-testing.
    pub fn top_down(&self) -> impl Iterator<Item = &Element> {
        self.order
            .iter()
            .rev()
            .filter_map(|id| self.elements.get(id))
            .filter(|e| e.is_live())
    }

    fn upsert(&mut self, element: Element) {
        let id = element.id;
        if self.elements.insert(id, element).is_none() {
            self.order.push(id);
        }
    }

    fn notify(&mut self) {
        let live: Vec<&Element> = self
            .order
            .iter()
            .filter_map(|id| self.elements.get(id))
            .filter(|e| e.is_live())
            .collect();
        for (_, listener) in self.listeners.iter_mut() {
            listener(&live);
        }
    }
}

impl SceneReader for Scene {
    fn get(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(&id)
    }

    fn all(&self) -> Vec<&Element> {
        self.order
            .iter()
            .filter_map(|id| self.elements.get(id))
            .filter(|e| e.is_live())
            .collect()
    }
}

impl SceneWriter for Scene {
    fn add(&mut self, element: Element) {
        self.upsert(element);
        self.notify();
    }

    fn update(&mut self, element: Element) {
        self.upsert(element);
        self.notify();
    }

    fn delete(&mut self, id: ElementId) -> bool {
        let removed = match self.elements.get_mut(&id) {
            Some(element) if element.is_live() => {
                element.deleted = true;
                true
            }
            _ => false,
        };
        if removed {
            self.notify();
        }
        removed
    }

    fn delete_many(&mut self, ids: &[ElementId]) -> Vec<ElementId> {
        let mut removed = Vec::new();
        for id in ids {
            if let Some(element) = self.elements.get_mut(id) {
                if element.is_live() {
                    element.deleted = true;
                    removed.push(*id);
                }
            }
        }
        if !removed.is_empty() {
            self.notify();
        }
        removed
    }

    fn restore(&mut self, from: &[Element], to: &[Element]) -> SceneDiff {
        let mut diff = SceneDiff::default();
        let before: HashMap<ElementId, &Element> = from.iter().map(|e| (e.id, e)).collect();
        let after: HashSet<ElementId> = to.iter().map(|e| e.id).collect();

        for element in from {
            if after.contains(&element.id) {
                continue;
            }
            if let Some(current) = self.elements.get_mut(&element.id) {
                if current.is_live() {
                    current.deleted = true;
                    diff.removed.push(element.id);
                }
            }
        }

        for element in to {
            if before.get(&element.id).is_some_and(|previous| *previous == element) {
                continue;
            }
            let unchanged = self.elements.get(&element.id).is_some_and(|current| current == element);
            if !unchanged {
                diff.changed.push(element.clone());
                self.upsert(element.clone());
            }
        }

        if !diff.is_empty() {
            self.notify();
        }
        diff
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::ElementStyle;
    use kurbo::{Point, Rect};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn rect(x: f64) -> Element {
        Element::rectangle(Rect::new(x, 0.0, x + 10.0, 10.0), ElementStyle::default())
    }

    #[test]
    fn test_insertion_order_is_paint_order() {
        let mut scene = Scene::new();
        let a = rect(0.0);
        let b = rect(20.0);
        scene.add(a.clone());
        scene.add(b.clone());
        let ids: Vec<_> = scene.all().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![a.id, b.id]);
        let top: Vec<_> = scene.top_down().map(|e| e.id).collect();
        assert_eq!(top, vec![b.id, a.id]);
    }

    #[test]
    fn test_update_replaces_in_place() {
        let mut scene = Scene::new();
        let a = rect(0.0);
        let b = rect(20.0);
        scene.add(a.clone());
        scene.add(b);
        let mut moved = a.clone();
        moved.x = 500.0;
        scene.update(moved);
        assert_eq!(scene.all()[0].id, a.id);
        assert!((scene.get(a.id).unwrap().x - 500.0).abs() < f64::EPSILON);
        assert_eq!(scene.len(), 2);
    }

    #[test]
    fn test_delete_tombstones() {
        let mut scene = Scene::new();
        let a = rect(0.0);
        scene.add(a.clone());
        assert!(scene.delete(a.id));
        assert!(!scene.delete(a.id));
        assert!(scene.all().is_empty());
        assert!(scene.get(a.id).unwrap().deleted);
        assert_eq!(scene.len(), 1);
    }

    #[test]
    fn test_listeners_receive_live_list() {
        let mut scene = Scene::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let listener = scene.subscribe(move |live| sink.borrow_mut().push(live.len()));

        let a = rect(0.0);
        scene.add(a.clone());
        scene.add(rect(20.0));
        scene.delete(a.id);
        assert_eq!(*seen.borrow(), vec![1, 2, 1]);

        scene.unsubscribe(listener);
        scene.add(rect(40.0));
        assert_eq!(seen.borrow().len(), 3);
    }

    #[test]
    fn test_restore_reports_diff() {
        let mut scene = Scene::new();
        let a = rect(0.0);
        let b = rect(20.0);
        scene.add(a.clone());
        let before = scene.snapshot();

        scene.add(b.clone());
        scene.delete(a.id);
        let after = scene.snapshot();

        let diff = scene.restore(&after, &before);
        assert_eq!(diff.removed, vec![b.id]);
        assert_eq!(diff.changed.len(), 1);
        assert_eq!(diff.changed[0].id, a.id);
        let live: Vec<_> = scene.all().iter().map(|e| e.id).collect();
        assert_eq!(live, vec![a.id]);
    }

    #[test]
    fn test_restore_leaves_elements_outside_both_snapshots() {
        let mut scene = Scene::new();
        let before = scene.snapshot();
        let mine = rect(0.0);
        scene.add(mine.clone());
        let after = scene.snapshot();

        // Arrives from a peer after the local commit
        let theirs = rect(50.0);
        scene.add(theirs.clone());

        let diff = scene.restore(&after, &before);
        assert_eq!(diff.removed, vec![mine.id]);
        assert!(diff.changed.is_empty());
        let live: Vec<_> = scene.all().iter().map(|e| e.id).collect();
        assert_eq!(live, vec![theirs.id]);

        // Redo brings back only the local element
        let diff = scene.restore(&before, &after);
        assert_eq!(diff.changed.len(), 1);
        assert_eq!(diff.changed[0].id, mine.id);
        assert!(diff.removed.is_empty());
        assert_eq!(scene.all().len(), 2);
    }

    #[test]
    fn test_restore_noop_does_not_notify() {
        let mut scene = Scene::new();
        scene.add(Element::line(Point::ZERO, Point::new(1.0, 1.0), ElementStyle::default()));
        let count = Rc::new(RefCell::new(0));
        let sink = count.clone();
        scene.subscribe(move |_| *sink.borrow_mut() += 1);
        let snapshot = scene.snapshot();
        assert!(scene.restore(&snapshot, &snapshot).is_empty());
        assert_eq!(*count.borrow(), 0);
    }
}
