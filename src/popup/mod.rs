//! Incoming call popup
//!
//! The controller owns at most one popup surface at a time. Surfaces are
//! created through a [`SurfaceFactory`] and report readiness and external
//! closes back as [`ControllerMessage`]s on the controller's channel.

pub mod controller;
pub mod headless;
#[cfg(any(windows, test))]
pub mod icon;
#[cfg(windows)]
pub mod win32;

use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::mpsc::Sender;

use crate::error::CallRingResult;
use crate::ring::{RingSink, RingStarted, RingStopped, RingTransition};

pub use controller::CallWindowController;
pub use headless::HeadlessSurfaceFactory;

/// Generation number of a popup window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(u64);

impl WindowId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    #[cfg(any(windows, test))]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Everything the controller reacts to, in arrival order
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerMessage {
    Started(RingStarted),
    Stopped(RingStopped),
    /// A surface finished loading and can receive call data
    Ready(WindowId),
    /// A surface was destroyed outside the controller's control
    Closed(WindowId),
    Answer,
    Dismiss,
    AdjustHeight(i32),
    Shutdown,
}

impl From<RingTransition> for ControllerMessage {
    fn from(transition: RingTransition) -> Self {
        match transition {
            RingTransition::Started(started) => ControllerMessage::Started(started),
            RingTransition::Stopped(stopped) => ControllerMessage::Stopped(stopped),
        }
    }
}

impl RingSink for Sender<ControllerMessage> {
    fn dispatch(&self, transition: RingTransition) {
        if self.send(transition.into()).is_err() {
            warn!("Call window controller is gone, dropping ring transition");
        }
    }
}

/// A single popup instance.
///
/// Every method must be a no-op once the underlying window is gone.
pub trait CallSurface {
    fn id(&self) -> WindowId;

    fn is_alive(&self) -> bool;

    /// Replace the call shown in the popup
    fn send_call_data(&self, data: &RingStarted);

    fn show(&self);

    fn resize(&self, width: u32, height: u32);

    fn close(&self);
}

/// Creates popup surfaces.
///
/// `open` returns before the surface is ready; the surface reports
/// [`ControllerMessage::Ready`] once it can display data.
pub trait SurfaceFactory {
    fn open(&mut self, id: WindowId, width: u32, height: u32) -> CallRingResult<Box<dyn CallSurface>>;
}

impl<F: SurfaceFactory + ?Sized> SurfaceFactory for Box<F> {
    fn open(&mut self, id: WindowId, width: u32, height: u32) -> CallRingResult<Box<dyn CallSurface>> {
        (**self).open(id, width, height)
    }
}
