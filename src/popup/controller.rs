//! Notification window controller
//!
//! Owns the single call popup: opens it on the first ring, refreshes it on
//! repeated rings, and closes it when the ring stops or the user responds.

use log::{debug, info, warn};
use std::sync::mpsc::Receiver;

use super::{CallSurface, ControllerMessage, SurfaceFactory, WindowId};
use crate::bridge::HostBridge;
use crate::config::PopupConfig;
use crate::ring::RingStarted;

/// Observable popup state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    Absent,
    /// Requested but not yet ready for data
    Creating(WindowId),
    Visible(WindowId),
}

enum Slot {
    Absent,
    Open {
        surface: Box<dyn CallSurface>,
        ready: bool,
    },
}

pub struct CallWindowController<F, B> {
    factory: F,
    bridge: B,
    width: u32,
    base_height: u32,
    pending: Option<RingStarted>,
    slot: Slot,
    next_id: u64,
}

impl<F: SurfaceFactory, B: HostBridge> CallWindowController<F, B> {
    pub fn new(factory: F, bridge: B, popup: &PopupConfig) -> Self {
        Self {
            factory,
            bridge,
            width: popup.width,
            base_height: popup.base_height,
            pending: None,
            slot: Slot::Absent,
            next_id: 0,
        }
    }

    pub fn window_state(&self) -> WindowState {
        match &self.slot {
            Slot::Open { surface, .. } if !surface.is_alive() => WindowState::Absent,
            Slot::Open { surface, ready: false } => WindowState::Creating(surface.id()),
            Slot::Open { surface, ready: true } => WindowState::Visible(surface.id()),
            Slot::Absent => WindowState::Absent,
        }
    }

    /// Drain messages until shutdown or until every sender is gone
    pub fn run(mut self, messages: Receiver<ControllerMessage>) {
        info!("Call window controller running");
        for message in messages {
            if !self.handle(message) {
                break;
            }
        }
        self.close_window();
        info!("Call window controller stopped");
    }

    /// Apply one message. Returns `false` on shutdown.
    pub fn handle(&mut self, message: ControllerMessage) -> bool {
        match message {
            ControllerMessage::Started(payload) => self.on_started(payload),
            ControllerMessage::Stopped(_) => self.on_stopped(),
            ControllerMessage::Ready(id) => self.on_ready(id),
            ControllerMessage::Closed(id) => self.on_closed(id),
            ControllerMessage::Answer => self.on_user_answer(),
            ControllerMessage::Dismiss => self.on_user_dismiss(),
            ControllerMessage::AdjustHeight(delta) => self.adjust_height(delta),
            ControllerMessage::Shutdown => return false,
        }
        debug!("Popup state: {:?}", self.window_state());
        true
    }

    pub fn on_started(&mut self, payload: RingStarted) {
        self.pending = Some(payload);
        self.reap();

        match self.slot {
            Slot::Absent => self.open_window(),
            Slot::Open { ref surface, ready: false } => {
                // The ready flush will carry the newest payload
                debug!("Popup {} still loading, pending call replaced", surface.id());
            }
            Slot::Open { ref surface, ready: true } => {
                if let Some(payload) = &self.pending {
                    surface.send_call_data(payload);
                }
                surface.show();
            }
        }
    }

    pub fn on_stopped(&mut self) {
        self.pending = None;
        self.close_window();
    }

    pub fn on_ready(&mut self, id: WindowId) {
        if let Slot::Open { surface, ready } = &mut self.slot {
            if surface.id() == id && !*ready && surface.is_alive() {
                *ready = true;
                if let Some(payload) = &self.pending {
                    surface.send_call_data(payload);
                }
                surface.show();
                debug!("Popup {} ready", id);
                return;
            }
        }
        debug!("Ignoring ready from stale popup {}", id);
    }

    pub fn on_closed(&mut self, id: WindowId) {
        if let Slot::Open { surface, .. } = &self.slot {
            if surface.id() == id {
                info!("Popup {} closed externally", id);
                self.slot = Slot::Absent;
            }
        }
    }

    pub fn on_user_answer(&mut self) {
        match self.pending.take() {
            Some(call) => {
                info!("Answering call on {}", call.channel_name);
                if let Err(e) = self.bridge.join_call(&call.channel_id) {
                    warn!("Failed to join call on {}: {}", call.channel_id, e);
                }
                if let Err(e) = self.bridge.focus_main() {
                    warn!("Failed to focus main window: {}", e);
                }
            }
            None => debug!("Answer with no pending call"),
        }
        self.close_window();
    }

    pub fn on_user_dismiss(&mut self) {
        match self.pending.take() {
            Some(call) => {
                info!("Dismissing call on {}", call.channel_name);
                if let Err(e) = self.bridge.stop_ringing(&call.channel_id) {
                    warn!("Failed to stop ringing on {}: {}", call.channel_id, e);
                }
            }
            None => debug!("Dismiss with no pending call"),
        }
        self.close_window();
    }

    /// Resize relative to the base height, letting the page grow the popup
    pub fn adjust_height(&mut self, delta: i32) {
        self.reap();
        if let Slot::Open { surface, .. } = &self.slot {
            let height = (i64::from(self.base_height) + i64::from(delta)).clamp(1, i64::from(u32::MAX));
            surface.resize(self.width, height as u32);
        }
    }

    fn open_window(&mut self) {
        self.next_id += 1;
        let id = WindowId::new(self.next_id);
        match self.factory.open(id, self.width, self.base_height) {
            Ok(surface) => {
                info!("Opening call popup {}", id);
                self.slot = Slot::Open { surface, ready: false };
            }
            Err(e) => warn!("Failed to open call popup: {}", e),
        }
    }

    fn close_window(&mut self) {
        if let Slot::Open { surface, .. } = std::mem::replace(&mut self.slot, Slot::Absent) {
            debug!("Closing popup {}", surface.id());
            surface.close();
        }
    }

    // Forget a surface whose window died without telling us
    fn reap(&mut self) {
        if let Slot::Open { surface, .. } = &self.slot {
            if !surface.is_alive() {
                debug!("Popup {} already destroyed", surface.id());
                self.slot = Slot::Absent;
            }
        }
    }
}

#[cfg(test)]
impl<F, B> CallWindowController<F, B> {
    /// The call currently being offered, if any
    fn pending(&self) -> Option<&RingStarted> {
        self.pending.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CallRingError, CallRingResult};
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq)]
    enum Op {
        Opened(u64),
        Data(u64, String),
        Shown(u64),
        Resized(u64, u32, u32),
        Closed(u64),
    }

    type Log = Rc<RefCell<Vec<Op>>>;

    struct FakeSurface {
        id: WindowId,
        alive: Rc<Cell<bool>>,
        log: Log,
    }

    impl FakeSurface {
        fn record(&self, op: Op) {
            if self.alive.get() {
                self.log.borrow_mut().push(op);
            }
        }
    }

    impl CallSurface for FakeSurface {
        fn id(&self) -> WindowId {
            self.id
        }

        fn is_alive(&self) -> bool {
            self.alive.get()
        }

        fn send_call_data(&self, data: &RingStarted) {
            self.record(Op::Data(self.id.get(), data.display_name.clone()));
        }

        fn show(&self) {
            self.record(Op::Shown(self.id.get()));
        }

        fn resize(&self, width: u32, height: u32) {
            self.record(Op::Resized(self.id.get(), width, height));
        }

        fn close(&self) {
            self.record(Op::Closed(self.id.get()));
            self.alive.set(false);
        }
    }

    #[derive(Default)]
    struct FakeFactory {
        log: Log,
        alive: Rc<RefCell<Vec<Rc<Cell<bool>>>>>,
        fail: bool,
    }

    impl FakeFactory {
        fn live_windows(&self) -> usize {
            self.alive.borrow().iter().filter(|a| a.get()).count()
        }

        // Simulate the user closing window `n` (1-based) through OS chrome
        fn destroy(&self, n: usize) {
            self.alive.borrow()[n - 1].set(false);
        }
    }

    impl SurfaceFactory for &FakeFactory {
        fn open(&mut self, id: WindowId, _width: u32, _height: u32) -> CallRingResult<Box<dyn CallSurface>> {
            if self.fail {
                return Err(CallRingError::Popup("no display".into()));
            }
            let alive = Rc::new(Cell::new(true));
            self.alive.borrow_mut().push(alive.clone());
            self.log.borrow_mut().push(Op::Opened(id.get()));
            Ok(Box::new(FakeSurface { id, alive, log: self.log.clone() }))
        }
    }

    #[derive(Default)]
    struct FakeBridge {
        calls: RefCell<Vec<String>>,
        fail: bool,
    }

    impl FakeBridge {
        fn record(&self, entry: String) -> CallRingResult<()> {
            self.calls.borrow_mut().push(entry);
            if self.fail {
                Err(CallRingError::Io(std::io::ErrorKind::BrokenPipe.into()))
            } else {
                Ok(())
            }
        }
    }

    impl HostBridge for &FakeBridge {
        fn join_call(&self, channel_id: &str) -> CallRingResult<()> {
            self.record(format!("call:{}", channel_id))
        }

        fn stop_ringing(&self, channel_id: &str) -> CallRingResult<()> {
            self.record(format!("stop:{}", channel_id))
        }

        fn focus_main(&self) -> CallRingResult<()> {
            self.record("focus".into())
        }
    }

    fn started(name: &str, channel: &str) -> RingStarted {
        RingStarted {
            display_name: name.into(),
            icon_url: None,
            channel_name: name.into(),
            channel_id: channel.into(),
        }
    }

    fn controller<'a>(
        factory: &'a FakeFactory,
        bridge: &'a FakeBridge,
    ) -> CallWindowController<&'a FakeFactory, &'a FakeBridge> {
        CallWindowController::new(factory, bridge, &PopupConfig::default())
    }

    fn ops(factory: &FakeFactory) -> Vec<Op> {
        std::mem::take(&mut *factory.log.borrow_mut())
    }

    #[test]
    fn first_ring_opens_and_flushes_on_ready() {
        let factory = FakeFactory::default();
        let bridge = FakeBridge::default();
        let mut ctl = controller(&factory, &bridge);

        ctl.on_started(started("Alice", "c1"));
        assert_eq!(ctl.window_state(), WindowState::Creating(WindowId::new(1)));
        assert_eq!(ops(&factory), vec![Op::Opened(1)]);

        ctl.on_ready(WindowId::new(1));
        assert_eq!(ctl.window_state(), WindowState::Visible(WindowId::new(1)));
        assert_eq!(ops(&factory), vec![Op::Data(1, "Alice".into()), Op::Shown(1)]);

        // A duplicate ready does not flush twice
        ctl.on_ready(WindowId::new(1));
        assert!(ops(&factory).is_empty());
    }

    #[test]
    fn second_ring_reuses_the_window() {
        let factory = FakeFactory::default();
        let bridge = FakeBridge::default();
        let mut ctl = controller(&factory, &bridge);

        ctl.on_started(started("Alice", "c1"));
        ctl.on_ready(WindowId::new(1));
        ops(&factory);

        ctl.on_started(started("Bob", "c2"));
        assert_eq!(ops(&factory), vec![Op::Data(1, "Bob".into()), Op::Shown(1)]);
        assert_eq!(ctl.pending().map(|p| p.channel_id.as_str()), Some("c2"));
        assert_eq!(factory.live_windows(), 1);
    }

    #[test]
    fn rings_while_loading_flush_only_the_latest() {
        let factory = FakeFactory::default();
        let bridge = FakeBridge::default();
        let mut ctl = controller(&factory, &bridge);

        ctl.on_started(started("Alice", "c1"));
        ctl.on_started(started("Bob", "c2"));
        ctl.on_ready(WindowId::new(1));

        assert_eq!(
            ops(&factory),
            vec![Op::Opened(1), Op::Data(1, "Bob".into()), Op::Shown(1)]
        );
        assert_eq!(factory.live_windows(), 1);
    }

    #[test]
    fn stop_closes_and_is_idempotent() {
        let factory = FakeFactory::default();
        let bridge = FakeBridge::default();
        let mut ctl = controller(&factory, &bridge);

        ctl.on_stopped();
        assert!(ops(&factory).is_empty());

        ctl.on_started(started("Alice", "c1"));
        ctl.on_ready(WindowId::new(1));
        ops(&factory);

        ctl.on_stopped();
        ctl.on_stopped();
        assert_eq!(ops(&factory), vec![Op::Closed(1)]);
        assert_eq!(ctl.window_state(), WindowState::Absent);
        assert!(ctl.pending().is_none());
        assert!(bridge.calls.borrow().is_empty());
    }

    #[test]
    fn stale_ready_after_stop_is_ignored() {
        let factory = FakeFactory::default();
        let bridge = FakeBridge::default();
        let mut ctl = controller(&factory, &bridge);

        ctl.on_started(started("Alice", "c1"));
        ctl.on_stopped();
        ctl.on_ready(WindowId::new(1));

        assert_eq!(ops(&factory), vec![Op::Opened(1), Op::Closed(1)]);
        assert_eq!(ctl.window_state(), WindowState::Absent);
    }

    #[test]
    fn late_close_of_old_window_leaves_new_one() {
        let factory = FakeFactory::default();
        let bridge = FakeBridge::default();
        let mut ctl = controller(&factory, &bridge);

        ctl.on_started(started("Alice", "c1"));
        ctl.on_stopped();
        ctl.on_started(started("Alice", "c1"));
        ctl.on_closed(WindowId::new(1));
        ctl.on_ready(WindowId::new(2));

        assert_eq!(ctl.window_state(), WindowState::Visible(WindowId::new(2)));
        assert_eq!(factory.live_windows(), 1);
    }

    #[test]
    fn externally_destroyed_window_is_replaced() {
        let factory = FakeFactory::default();
        let bridge = FakeBridge::default();
        let mut ctl = controller(&factory, &bridge);

        ctl.on_started(started("Alice", "c1"));
        ctl.on_ready(WindowId::new(1));
        factory.destroy(1);
        assert_eq!(ctl.window_state(), WindowState::Absent);
        ops(&factory);

        // Operations on the dead window are silent no-ops
        ctl.adjust_height(20);
        assert!(ops(&factory).is_empty());

        ctl.on_started(started("Bob", "c2"));
        assert_eq!(ops(&factory), vec![Op::Opened(2)]);
    }

    #[test]
    fn answer_joins_focuses_and_closes() {
        let factory = FakeFactory::default();
        let bridge = FakeBridge::default();
        let mut ctl = controller(&factory, &bridge);

        ctl.on_started(started("Alice", "c1"));
        ctl.on_ready(WindowId::new(1));
        ops(&factory);

        ctl.on_user_answer();
        assert_eq!(*bridge.calls.borrow(), vec!["call:c1".to_string(), "focus".to_string()]);
        assert_eq!(ops(&factory), vec![Op::Closed(1)]);
        assert!(ctl.pending().is_none());
    }

    #[test]
    fn dismiss_stops_ringing_even_when_host_fails() {
        let factory = FakeFactory::default();
        let bridge = FakeBridge { fail: true, ..Default::default() };
        let mut ctl = controller(&factory, &bridge);

        ctl.on_started(started("Alice", "c1"));
        ctl.on_user_dismiss();

        assert_eq!(*bridge.calls.borrow(), vec!["stop:c1".to_string()]);
        assert!(ctl.pending().is_none());
        assert_eq!(ctl.window_state(), WindowState::Absent);
    }

    #[test]
    fn answer_without_pending_call_only_closes() {
        let factory = FakeFactory::default();
        let bridge = FakeBridge::default();
        let mut ctl = controller(&factory, &bridge);

        ctl.on_user_answer();
        ctl.on_user_dismiss();
        assert!(bridge.calls.borrow().is_empty());
    }

    #[test]
    fn external_close_keeps_pending_call() {
        let factory = FakeFactory::default();
        let bridge = FakeBridge::default();
        let mut ctl = controller(&factory, &bridge);

        ctl.on_started(started("Alice", "c1"));
        ctl.on_ready(WindowId::new(1));
        ctl.on_closed(WindowId::new(1));

        assert_eq!(ctl.window_state(), WindowState::Absent);
        assert_eq!(ctl.pending().map(|p| p.channel_id.as_str()), Some("c1"));
    }

    #[test]
    fn adjust_height_is_relative_to_base() {
        let factory = FakeFactory::default();
        let bridge = FakeBridge::default();
        let mut ctl = controller(&factory, &bridge);

        ctl.adjust_height(40);
        assert!(ops(&factory).is_empty());

        ctl.on_started(started("Alice", "c1"));
        ctl.adjust_height(40);
        ctl.adjust_height(-10);
        assert_eq!(
            ops(&factory),
            vec![Op::Opened(1), Op::Resized(1, 232, 316), Op::Resized(1, 232, 266)]
        );
    }

    #[test]
    fn failed_open_stays_absent() {
        let factory = FakeFactory { fail: true, ..Default::default() };
        let bridge = FakeBridge::default();
        let mut ctl = controller(&factory, &bridge);

        ctl.on_started(started("Alice", "c1"));
        assert_eq!(ctl.window_state(), WindowState::Absent);
        assert!(ctl.pending().is_some());
    }

    #[test]
    fn handle_stops_on_shutdown() {
        let factory = FakeFactory::default();
        let bridge = FakeBridge::default();
        let mut ctl = controller(&factory, &bridge);

        assert!(ctl.handle(ControllerMessage::Started(started("Alice", "c1"))));
        assert!(ctl.handle(ControllerMessage::Ready(WindowId::new(1))));
        assert!(!ctl.handle(ControllerMessage::Shutdown));
        assert_eq!(ctl.window_state(), WindowState::Visible(WindowId::new(1)));
    }
}
