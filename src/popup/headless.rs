//! Headless popup back-end
//!
//! Leaves rendering to the host: the popup is described with `showCall`,
//! `resizeCall` and `closeCall` commands on stdout, and the host reports the
//! user's choice back over stdin.

use log::{debug, warn};
use std::cell::{Cell, RefCell};
use std::sync::mpsc::Sender;

use super::{CallSurface, ControllerMessage, SurfaceFactory, WindowId};
use crate::bridge::LineWriter;
use crate::error::CallRingResult;
use crate::protocol::HostCommand;
use crate::ring::RingStarted;

pub struct HeadlessSurfaceFactory {
    writer: LineWriter,
    events: Sender<ControllerMessage>,
}

impl HeadlessSurfaceFactory {
    pub fn new(writer: LineWriter, events: Sender<ControllerMessage>) -> Self {
        Self { writer, events }
    }
}

impl SurfaceFactory for HeadlessSurfaceFactory {
    fn open(&mut self, id: WindowId, width: u32, height: u32) -> CallRingResult<Box<dyn CallSurface>> {
        debug!("Headless popup {} ({}x{})", id, width, height);
        // Nothing to load, so the surface is ready as soon as the
        // controller gets around to the queued message.
        let _ = self.events.send(ControllerMessage::Ready(id));
        Ok(Box::new(HeadlessSurface {
            id,
            writer: self.writer.clone(),
            data: RefCell::new(None),
            alive: Cell::new(true),
        }))
    }
}

struct HeadlessSurface {
    id: WindowId,
    writer: LineWriter,
    data: RefCell<Option<RingStarted>>,
    alive: Cell<bool>,
}

impl HeadlessSurface {
    fn send(&self, command: HostCommand) {
        if let Err(e) = self.writer.send(&command) {
            warn!("Failed to update headless popup {}: {}", self.id, e);
        }
    }
}

impl CallSurface for HeadlessSurface {
    fn id(&self) -> WindowId {
        self.id
    }

    fn is_alive(&self) -> bool {
        self.alive.get()
    }

    fn send_call_data(&self, data: &RingStarted) {
        if self.alive.get() {
            *self.data.borrow_mut() = Some(data.clone());
        }
    }

    fn show(&self) {
        if !self.alive.get() {
            return;
        }
        match self.data.borrow().clone() {
            Some(data) => self.send(HostCommand::ShowCall { window: self.id, data }),
            None => debug!("Headless popup {} has nothing to show yet", self.id),
        }
    }

    fn resize(&self, width: u32, height: u32) {
        if self.alive.get() {
            self.send(HostCommand::ResizeCall { window: self.id, width, height });
        }
    }

    fn close(&self) {
        if self.alive.replace(false) {
            self.send(HostCommand::CloseCall { window: self.id });
        }
    }
}
