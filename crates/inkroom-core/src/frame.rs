//! Redraw bookkeeping: a shared dirty flag and a one-frame throttle.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Shared "needs redraw" flag.
///
/// Set by scene mutations and camera changes, cleared by the renderer after
/// it paints a frame. Clones share the same flag.
#[derive(Debug, Clone)]
pub struct RedrawFlag(Rc<Cell<bool>>);

impl RedrawFlag {
    /// A new flag, initially dirty so the first frame paints.
    pub fn new() -> Self {
        Self(Rc::new(Cell::new(true)))
    }

    pub fn mark(&self) {
        self.0.set(true);
    }

    pub fn is_dirty(&self) -> bool {
        self.0.get()
    }

    /// Clear the flag, returning whether it was set.
    pub fn take(&self) -> bool {
        self.0.replace(false)
    }
}

impl Default for RedrawFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Coalesces render requests to at most one per frame interval.
#[derive(Debug, Clone)]
pub struct FrameThrottle {
    interval: Duration,
    last_frame: Option<Instant>,
    pending: bool,
}

impl FrameThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_frame: None,
            pending: false,
        }
    }

    /// Ask for a frame. Repeated requests before the next frame collapse into one.
    pub fn request(&mut self) {
        self.pending = true;
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Whether a requested frame is due at `now`. Consumes the request when it is.
    pub fn poll(&mut self, now: Instant) -> bool {
        if !self.pending {
            return false;
        }
        let due = self
            .last_frame
            .is_none_or(|last| now.saturating_duration_since(last) >= self.interval);
        if due {
            self.pending = false;
            self.last_frame = Some(now);
        }
        due
    }
}
