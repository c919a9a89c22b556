//! Main application logic for callring

use anyhow::Result;
use log::{debug, info, warn};
use std::io::BufRead;
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;

use crate::bridge::{LineBridge, LineWriter};
use crate::config::{Config, PopupBackend};
use crate::popup::{CallWindowController, ControllerMessage, HeadlessSurfaceFactory, SurfaceFactory};
use crate::protocol::{height_delta, Inbound};
use crate::ring::RingTracker;
use crate::stores::{HostStores, MemoryStores};

type Tracker = RingTracker<MemoryStores, Sender<ControllerMessage>>;

/// Main application state
pub struct Application {
    config: Arc<Config>,
    backend: PopupBackend,
}

impl Application {
    /// Create a new application instance
    pub fn new(config: Arc<Config>) -> Self {
        let backend = config.popup.backend;
        Self { config, backend }
    }

    /// Override the configured popup back-end
    pub fn with_backend(mut self, backend: PopupBackend) -> Self {
        self.backend = backend;
        self
    }

    /// Run against the process's stdin and stdout
    pub fn run(&self) -> Result<()> {
        let stdin = std::io::stdin();
        self.run_with(stdin.lock(), LineWriter::stdout())
    }

    /// Pump host messages from `input` until EOF, writing commands to `writer`
    pub fn run_with(&self, input: impl BufRead, writer: LineWriter) -> Result<()> {
        let (tx, rx) = mpsc::channel::<ControllerMessage>();

        let factory = self.surface_factory(writer.clone(), tx.clone());
        let bridge = LineBridge::new(writer);
        let popup = self.config.popup.clone();
        // Surfaces are not Send, so the controller is built on its own thread
        let controller = thread::Builder::new()
            .name("call-window".into())
            .spawn(move || CallWindowController::new(factory, bridge, &popup).run(rx))?;

        let mut tracker = RingTracker::new(MemoryStores::new(), tx.clone(), self.config.ring);
        info!("Waiting for host messages");

        for line in input.lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!("Failed to read from host: {}", e);
                    break;
                }
            };
            match Inbound::parse_line(&line) {
                Ok(Some(message)) => route(message, &mut tracker, &tx),
                Ok(None) => {}
                Err(e) => warn!("Skipping malformed host message: {}", e),
            }
        }

        info!("Host closed the connection");
        tracker.stop();
        let _ = tx.send(ControllerMessage::Shutdown);
        if controller.join().is_err() {
            warn!("Call window controller panicked");
        }
        Ok(())
    }

    fn surface_factory(
        &self,
        writer: LineWriter,
        events: Sender<ControllerMessage>,
    ) -> Box<dyn SurfaceFactory + Send> {
        match self.backend {
            #[cfg(windows)]
            PopupBackend::Auto | PopupBackend::Win32 => {
                Box::new(crate::popup::win32::Win32SurfaceFactory::new(events))
            }
            #[cfg(not(windows))]
            PopupBackend::Win32 => {
                warn!("Win32 popup is unavailable on this platform, using headless");
                Box::new(HeadlessSurfaceFactory::new(writer, events))
            }
            _ => Box::new(HeadlessSurfaceFactory::new(writer, events)),
        }
    }
}

/// Apply one host message to the tracker or forward it to the controller
fn route(message: Inbound, tracker: &mut Tracker, controller: &Sender<ControllerMessage>) {
    let forward = match message {
        Inbound::Dispatch { event } => {
            let sent = tracker.on_call_update(&event);
            if sent > 0 {
                debug!("Dispatched {} ring transition(s)", sent);
            }
            None
        }
        Inbound::Start => {
            if tracker.is_active() {
                debug!("Ring tracker restarted while subscribed");
            }
            tracker.start();
            None
        }
        Inbound::Stop => {
            if !tracker.is_active() {
                debug!("Ring tracker already stopped");
            }
            tracker.stop();
            None
        }
        Inbound::CurrentUser { user } => {
            let previous = tracker.stores_mut().current_user().map(|u| u.id.clone());
            if previous.is_some_and(|id| id != user.id) {
                // Rings seen so far belong to another account
                tracker.reset();
            }
            info!("Logged in as {}", user.username);
            tracker.stores_mut().set_current_user(user);
            None
        }
        Inbound::User { user } => {
            tracker.stores_mut().upsert_user(user);
            None
        }
        Inbound::Channel { channel } => {
            tracker.stores_mut().upsert_channel(channel);
            None
        }
        Inbound::Guild { guild } => {
            tracker.stores_mut().upsert_guild(guild);
            None
        }
        Inbound::Presence { user_id, status } => {
            tracker.stores_mut().set_status(user_id, status);
            None
        }
        Inbound::Focus { focused } => {
            tracker.stores_mut().set_focus(focused);
            None
        }
        Inbound::Answer => Some(ControllerMessage::Answer),
        Inbound::Dismiss => Some(ControllerMessage::Dismiss),
        Inbound::AdjustHeight { delta } => Some(ControllerMessage::AdjustHeight(height_delta(delta))),
        Inbound::CallClosed { window } => Some(ControllerMessage::Closed(window)),
    };

    if let Some(message) = forward {
        if controller.send(message).is_err() {
            warn!("Call window controller is gone");
        }
    }
}
