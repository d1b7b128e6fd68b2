//! One client's view of a room: scene, camera, interaction and sync wired together.

use crate::camera::Camera;
use crate::config::EngineConfig;
use crate::elements::Element;
use crate::frame::{FrameThrottle, RedrawFlag};
use crate::interaction::{InputEvent, InteractionStateMachine, Outcome};
use crate::scene::{Scene, SceneWriter};
use crate::selection::Handle;
use crate::store::{ElementStore, StoreResult};
use crate::sync::{Inbound, SyncChannel};
use crate::transport::Transport;
use kurbo::Size;
use std::time::Instant;

/// Scene, camera and interaction state for one room, plus its sync channel.
pub struct Session<T: Transport> {
    scene: Scene,
    camera: Camera,
    machine: InteractionStateMachine,
    sync: SyncChannel<T>,
    redraw: RedrawFlag,
    throttle: FrameThrottle,
}

impl<T: Transport> Session<T> {
    pub fn new(room_id: impl Into<String>, transport: T, config: EngineConfig, viewport: Size) -> Self {
        let redraw = RedrawFlag::new();
        let mut scene = Scene::new();
        let flag = redraw.clone();
        scene.subscribe(move |_| flag.mark());

        let mut throttle = FrameThrottle::new(config.frame_interval());
        throttle.request();

        Self {
            scene,
            camera: Camera::centered(viewport, &config),
            machine: InteractionStateMachine::new(config),
            sync: SyncChannel::new(room_id, transport),
            redraw,
            throttle,
        }
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn machine(&self) -> &InteractionStateMachine {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut InteractionStateMachine {
        &mut self.machine
    }

    pub fn sync(&self) -> &SyncChannel<T> {
        &self.sync
    }

    pub fn sync_mut(&mut self) -> &mut SyncChannel<T> {
        &mut self.sync
    }

    /// Handle to the dirty flag, shared with the renderer.
    pub fn redraw_flag(&self) -> RedrawFlag {
        self.redraw.clone()
    }

    /// Selection handles to draw over the scene.
    pub fn handles(&self) -> Vec<Handle> {
        self.machine.handles(&self.scene, &self.camera)
    }

    /// Load persisted elements before the first frame. Invalid elements are skipped.
    ///
    /// The loaded scene becomes the undo base.
    pub fn hydrate(&mut self, elements: Vec<Element>) -> usize {
        let mut loaded = 0;
        for element in elements {
            if let Err(e) = element.validate() {
                log::warn!("skipping persisted element: {}", e);
                continue;
            }
            if element.is_eraser_trail() || element.deleted {
                continue;
            }
            self.scene.add(element);
            loaded += 1;
        }
        self.machine.reset_history(&self.scene);
        log::info!("hydrated room {} with {} element(s)", self.sync.room_id(), loaded);
        self.request_frame();
        loaded
    }

    /// Fetch the room from `store` and hydrate from it.
    pub async fn hydrate_from(&mut self, store: &dyn ElementStore) -> StoreResult<usize> {
        let elements = store.fetch_room(self.sync.room_id()).await?;
        Ok(self.hydrate(elements))
    }

    /// Announce this client to the room.
    pub fn join(&mut self) {
        self.sync.join();
    }

    /// Feed one input event through the state machine and broadcast its commits.
    pub fn handle_input(&mut self, event: InputEvent) -> Outcome {
        let outcome = self.machine.handle(event, &mut self.scene, &mut self.camera);
        if !outcome.changes.is_empty() {
            self.sync.publish(&outcome.changes);
        }
        if outcome.redraw {
            self.redraw.mark();
        }
        if self.redraw.is_dirty() {
            self.throttle.request();
        }
        outcome
    }

    /// Apply one frame received from the transport.
    pub fn handle_inbound(&mut self, text: &str) -> Option<Inbound> {
        let inbound = self.sync.receive(text, &mut self.scene);
        if inbound.as_ref().is_some_and(Inbound::touched_scene) {
            self.throttle.request();
        }
        inbound
    }

    /// Drain the transport and apply everything received.
    pub fn pump_inbound(&mut self) -> Vec<Inbound> {
        let applied = self.sync.pump(&mut self.scene);
        if applied.iter().any(Inbound::touched_scene) {
            self.throttle.request();
        }
        applied
    }

    fn request_frame(&mut self) {
        self.redraw.mark();
        self.throttle.request();
    }

    /// Whether a frame should be painted at `now`.
    ///
    /// Requests made since the last frame are coalesced into one.
    pub fn poll_frame(&mut self, now: Instant) -> bool {
        self.throttle.poll(now) && self.redraw.is_dirty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::ElementStyle;
    use crate::interaction::{Key, Modifiers, PointerButton, SceneChange};
    use crate::store::MemoryStore;
    use crate::sync::WireMessage;
    use crate::scene::SceneReader;
    use crate::transport::ChannelTransport;
    use kurbo::{Point, Rect};
    use std::time::Duration;

    fn viewport() -> Size {
        Size::new(800.0, 600.0)
    }

    fn sessions() -> (Session<ChannelTransport>, Session<ChannelTransport>) {
        let (a, b) = ChannelTransport::pair();
        (
            Session::new("room", a, EngineConfig::default(), viewport()),
            Session::new("room", b, EngineConfig::default(), viewport()),
        )
    }

    fn drag(session: &mut Session<ChannelTransport>, from: Point, to: Point) -> Outcome {
        session.handle_input(InputEvent::PointerDown {
            position: from,
            button: PointerButton::Primary,
            modifiers: Modifiers::NONE,
        });
        session.handle_input(InputEvent::PointerMove { position: to, modifiers: Modifiers::NONE });
        session.handle_input(InputEvent::PointerUp { position: to, modifiers: Modifiers::NONE })
    }

    #[test]
    fn test_local_draw_reaches_peer() {
        let (mut alice, mut bob) = sessions();
        alice.handle_input(InputEvent::SetTool("ellipse".into()));
        let outcome = drag(&mut alice, Point::new(400.0, 300.0), Point::new(500.0, 350.0));
        assert_eq!(outcome.changes.len(), 1);

        let applied = bob.pump_inbound();
        assert_eq!(applied.len(), 1);
        let mine = alice.scene().all()[0].clone();
        let theirs = bob.scene().get(mine.id).cloned();
        assert_eq!(theirs, Some(mine.clone()));
        assert_eq!((mine.x, mine.y, mine.width, mine.height), (0.0, 0.0, 100.0, 50.0));
    }

    #[test]
    fn test_undo_follows_to_peer() {
        let (mut alice, mut bob) = sessions();
        alice.handle_input(InputEvent::SetTool("rectangle".into()));
        drag(&mut alice, Point::new(400.0, 300.0), Point::new(450.0, 350.0));
        bob.pump_inbound();
        assert_eq!(bob.scene().all().len(), 1);

        let outcome = alice.handle_input(InputEvent::Key {
            key: Key::Char('z'),
            modifiers: Modifiers::CTRL,
        });
        assert!(matches!(outcome.changes.as_slice(), [SceneChange::Erased(ids)] if ids.len() == 1));
        bob.pump_inbound();
        assert!(bob.scene().all().is_empty());
    }

    #[test]
    fn test_undo_keeps_peer_elements() {
        let (mut alice, mut bob) = sessions();
        alice.handle_input(InputEvent::SetTool("rectangle".into()));
        drag(&mut alice, Point::new(400.0, 300.0), Point::new(450.0, 350.0));
        let mine = alice.scene().all()[0].id;
        bob.pump_inbound();

        // Bob draws after Alice's commit and before her undo
        bob.handle_input(InputEvent::SetTool("ellipse".into()));
        drag(&mut bob, Point::new(100.0, 100.0), Point::new(160.0, 140.0));
        alice.pump_inbound();
        let theirs = bob.scene().all().iter().find(|e| e.id != mine).map(|e| e.id).unwrap();
        assert_eq!(alice.scene().all().len(), 2);

        let outcome = alice.handle_input(InputEvent::Key {
            key: Key::Char('z'),
            modifiers: Modifiers::CTRL,
        });
        assert_eq!(outcome.changes, vec![SceneChange::Erased(vec![mine])]);
        let live: Vec<_> = alice.scene().all().iter().map(|e| e.id).collect();
        assert_eq!(live, vec![theirs]);

        bob.pump_inbound();
        let live: Vec<_> = bob.scene().all().iter().map(|e| e.id).collect();
        assert_eq!(live, vec![theirs]);

        let outcome = alice.handle_input(InputEvent::Key {
            key: Key::Char('y'),
            modifiers: Modifiers::CTRL,
        });
        assert!(matches!(outcome.changes.as_slice(), [SceneChange::Updated(el)] if el.id == mine));
        assert_eq!(alice.scene().all().len(), 2);
    }

    #[test]
    fn test_join_and_foreign_room() {
        let (mut alice, mut bob) = sessions();
        alice.join();
        let frames = bob.sync_mut().transport_mut().poll_inbound();
        assert_eq!(frames, vec![r#"{"type":"joinRoom","roomId":"room"}"#.to_string()]);

        let el = Element::rectangle(Rect::new(0.0, 0.0, 5.0, 5.0), ElementStyle::default());
        let foreign = WireMessage::Draw { room_id: "other".into(), drawing: el }.to_json().unwrap();
        assert!(bob.handle_inbound(&foreign).is_none());
        assert!(bob.scene().all().is_empty());
    }

    #[test]
    fn test_hydrate_sets_undo_base() {
        let (mut alice, _bob) = sessions();
        let mut bad = Element::rectangle(Rect::new(0.0, 0.0, 5.0, 5.0), ElementStyle::default());
        bad.x = f64::NAN;
        let good = Element::rectangle(Rect::new(10.0, 0.0, 15.0, 5.0), ElementStyle::default());
        assert_eq!(alice.hydrate(vec![bad, good.clone()]), 1);

        let outcome = alice.handle_input(InputEvent::Key {
            key: Key::Char('z'),
            modifiers: Modifiers::CTRL,
        });
        assert!(outcome.changes.is_empty());
        assert_eq!(alice.scene().all()[0].id, good.id);
    }

    #[test]
    fn test_hydrate_from_store() {
        let store = MemoryStore::new();
        let el = Element::rectangle(Rect::new(0.0, 0.0, 5.0, 5.0), ElementStyle::default());
        store
            .import_json("room", &serde_json::to_string(&vec![el.clone()]).unwrap())
            .unwrap();
        let (mut alice, _bob) = sessions();

        let loaded = block_on(alice.hydrate_from(&store)).unwrap();
        assert_eq!(loaded, 1);
        assert_eq!(alice.scene().get(el.id), Some(&el));
    }

    fn block_on<F: std::future::Future>(f: F) -> F::Output {
        use std::task::{Context, Poll, Waker};
        let mut cx = Context::from_waker(Waker::noop());
        let mut f = std::pin::pin!(f);
        loop {
            if let Poll::Ready(result) = f.as_mut().poll(&mut cx) {
                return result;
            }
        }
    }

    #[test]
    fn test_frames_are_coalesced() {
        let (mut alice, mut bob) = sessions();
        let start = Instant::now();
        assert!(alice.poll_frame(start));
        alice.redraw_flag().take();
        assert!(!alice.poll_frame(start));

        alice.handle_input(InputEvent::SetTool("freehand".into()));
        alice.handle_input(InputEvent::PointerDown {
            position: Point::new(0.0, 0.0),
            button: PointerButton::Primary,
            modifiers: Modifiers::NONE,
        });
        for i in 1..5 {
            alice.handle_input(InputEvent::PointerMove {
                position: Point::new(i as f64 * 10.0, 0.0),
                modifiers: Modifiers::NONE,
            });
        }
        // Several scene mutations, one frame once the interval has passed
        assert!(!alice.poll_frame(start + Duration::from_millis(1)));
        assert!(alice.poll_frame(start + Duration::from_millis(20)));
        assert!(!alice.poll_frame(start + Duration::from_millis(40)));

        // Nothing is sent until the stroke is committed
        assert!(bob.pump_inbound().is_empty());
    }
}
