//! Persistence of room elements, used for initial hydration.

use crate::elements::{Element, ElementId};
use std::collections::HashMap;
use std::future::{Future, ready};
use std::pin::Pin;
use std::sync::RwLock;
use thiserror::Error;

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("room not found: {0}")]
    NotFound(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("store error: {0}")]
    Other(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Boxed future returned by store operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Backend holding the persisted elements of every room.
pub trait ElementStore: Send + Sync {
    /// Live elements of a room in insertion order. Unknown rooms are empty.
    fn fetch_room(&self, room_id: &str) -> BoxFuture<'_, StoreResult<Vec<Element>>>;

    /// Insert or replace an element by id.
    fn persist(&self, room_id: &str, element: Element) -> BoxFuture<'_, StoreResult<()>>;

    /// Tombstone elements. Returns the ids that were live.
    fn erase(&self, room_id: &str, ids: Vec<ElementId>) -> BoxFuture<'_, StoreResult<Vec<ElementId>>>;
}

/// In-memory store for development and tests.
#[derive(Default)]
pub struct MemoryStore {
    rooms: RwLock<HashMap<String, Vec<Element>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Room ids with at least one persisted element.
    pub fn rooms(&self) -> StoreResult<Vec<String>> {
        let rooms = self.rooms.read().map_err(lock_error)?;
        Ok(rooms.keys().cloned().collect())
    }

    /// Seed a room from a JSON array of elements.
    pub fn import_json(&self, room_id: &str, json: &str) -> StoreResult<usize> {
        let elements: Vec<Element> = serde_json::from_str(json)?;
        let count = elements.len();
        for element in elements {
            self.persist_now(room_id, element)?;
        }
        Ok(count)
    }

    /// Serialize the live elements of a room.
    pub fn export_json(&self, room_id: &str) -> StoreResult<String> {
        Ok(serde_json::to_string(&self.fetch_now(room_id)?)?)
    }

    fn fetch_now(&self, room_id: &str) -> StoreResult<Vec<Element>> {
        let rooms = self.rooms.read().map_err(lock_error)?;
        Ok(rooms
            .get(room_id)
            .map(|elements| elements.iter().filter(|e| e.is_live()).cloned().collect())
            .unwrap_or_default())
    }

    fn persist_now(&self, room_id: &str, element: Element) -> StoreResult<()> {
        let mut rooms = self.rooms.write().map_err(lock_error)?;
        let elements = rooms.entry(room_id.to_string()).or_default();
        match elements.iter_mut().find(|e| e.id == element.id) {
            Some(existing) => *existing = element,
            None => elements.push(element),
        }
        Ok(())
    }

    fn erase_now(&self, room_id: &str, ids: &[ElementId]) -> StoreResult<Vec<ElementId>> {
        let mut rooms = self.rooms.write().map_err(lock_error)?;
        let elements = rooms
            .get_mut(room_id)
            .ok_or_else(|| StoreError::NotFound(room_id.to_string()))?;
        let mut erased = Vec::new();
        for element in elements.iter_mut().filter(|e| ids.contains(&e.id) && e.is_live()) {
            element.deleted = true;
            erased.push(element.id);
        }
        Ok(erased)
    }
}

fn lock_error<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::Other(format!("lock error: {e}"))
}

impl ElementStore for MemoryStore {
    fn fetch_room(&self, room_id: &str) -> BoxFuture<'_, StoreResult<Vec<Element>>> {
        Box::pin(ready(self.fetch_now(room_id)))
    }

    fn persist(&self, room_id: &str, element: Element) -> BoxFuture<'_, StoreResult<()>> {
        Box::pin(ready(self.persist_now(room_id, element)))
    }

    fn erase(&self, room_id: &str, ids: Vec<ElementId>) -> BoxFuture<'_, StoreResult<Vec<ElementId>>> {
        Box::pin(ready(self.erase_now(room_id, &ids)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::ElementStyle;
    use kurbo::{Point, Rect};

    fn block_on<F: Future>(f: F) -> F::Output {
        use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

        fn dummy_raw_waker() -> RawWaker {
            fn no_op(_: *const ()) {}
            fn clone(_: *const ()) -> RawWaker {
                dummy_raw_waker()
            }
            static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, no_op, no_op, no_op);
            RawWaker::new(std::ptr::null(), &VTABLE)
        }

        let waker = unsafe { Waker::from_raw(dummy_raw_waker()) };
        let mut cx = Context::from_waker(&waker);
        let mut f = std::pin::pin!(f);

        loop {
            if let Poll::Ready(result) = f.as_mut().poll(&mut cx) {
                return result;
            }
        }
    }

    fn rect(x: f64) -> Element {
        Element::rectangle(Rect::new(x, 0.0, x + 10.0, 10.0), ElementStyle::default())
    }

    #[test]
    fn test_persist_and_fetch() {
        let store = MemoryStore::new();
        let a = rect(0.0);
        let b = rect(20.0);
        block_on(store.persist("r", a.clone())).unwrap();
        block_on(store.persist("r", b.clone())).unwrap();

        let fetched = block_on(store.fetch_room("r")).unwrap();
        assert_eq!(fetched, vec![a, b]);
        assert!(block_on(store.fetch_room("elsewhere")).unwrap().is_empty());
    }

    #[test]
    fn test_persist_replaces_by_id() {
        let store = MemoryStore::new();
        let a = rect(0.0);
        block_on(store.persist("r", a.clone())).unwrap();
        let mut moved = a.clone();
        moved.translate(kurbo::Vec2::new(5.0, 5.0));
        block_on(store.persist("r", moved.clone())).unwrap();

        assert_eq!(block_on(store.fetch_room("r")).unwrap(), vec![moved]);
    }

    #[test]
    fn test_erase_hides_elements() {
        let store = MemoryStore::new();
        let a = rect(0.0);
        let line = Element::line(Point::ZERO, Point::new(3.0, 4.0), ElementStyle::default());
        block_on(store.persist("r", a.clone())).unwrap();
        block_on(store.persist("r", line.clone())).unwrap();

        let erased = block_on(store.erase("r", vec![a.id, uuid::Uuid::new_v4()])).unwrap();
        assert_eq!(erased, vec![a.id]);
        assert_eq!(block_on(store.fetch_room("r")).unwrap(), vec![line]);
        assert!(matches!(
            block_on(store.erase("missing", vec![a.id])),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_json_import_export() {
        let store = MemoryStore::new();
        let json = serde_json::to_string(&vec![rect(0.0), rect(30.0)]).unwrap();
        assert_eq!(store.import_json("r", &json).unwrap(), 2);
        assert_eq!(store.rooms().unwrap(), vec!["r".to_string()]);

        let copy = MemoryStore::new();
        copy.import_json("r", &store.export_json("r").unwrap()).unwrap();
        assert_eq!(
            block_on(copy.fetch_room("r")).unwrap(),
            block_on(store.fetch_room("r")).unwrap()
        );
        assert!(matches!(store.import_json("r", "[{"), Err(StoreError::Serialization(_))));
    }
}
