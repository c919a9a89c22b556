//! Ring-state tracker
//!
//! Diffs consecutive `CALL_UPDATE` ring snapshots and dispatches a
//! transition whenever the local user enters or leaves the set of ringers.

use log::{debug, info, trace};
use serde::{Deserialize, Serialize};

use super::context::CallContext;
use super::transition::{RingSink, RingStarted, RingStopped, RingTransition};
use crate::model::{HostEvent, RingSnapshot};
use crate::stores::{HostStores, STATUS_DND};

/// When to hold back a `Started` notification.
///
/// `Stopped` is never suppressed, so a popup opened earlier always closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RingPolicy {
    /// Skip the popup while the main client window has focus
    pub suppress_when_focused: bool,
    /// Skip the popup while the local user is in do-not-disturb
    pub suppress_when_dnd: bool,
}

#[cfg(test)]
impl RingPolicy {
    /// Notify on every ring regardless of focus or presence
    pub const ALWAYS: RingPolicy = RingPolicy {
        suppress_when_focused: false,
        suppress_when_dnd: false,
    };
}

impl Default for RingPolicy {
    fn default() -> Self {
        Self {
            suppress_when_focused: true,
            suppress_when_dnd: true,
        }
    }
}

pub struct RingTracker<S, K> {
    stores: S,
    sink: K,
    policy: RingPolicy,
    previous: RingSnapshot,
    active: bool,
}

impl<S: HostStores, K: RingSink> RingTracker<S, K> {
    /// Create an unsubscribed tracker; call [`start`](Self::start) to begin
    pub fn new(stores: S, sink: K, policy: RingPolicy) -> Self {
        Self {
            stores,
            sink,
            policy,
            previous: RingSnapshot::new(),
            active: false,
        }
    }

    /// Subscribe to call updates with an empty previous snapshot
    pub fn start(&mut self) {
        self.previous = RingSnapshot::new();
        self.active = true;
        info!("Ring tracker subscribed to CALL_UPDATE");
    }

    /// Unsubscribe and forget the previous snapshot
    pub fn stop(&mut self) {
        self.previous = RingSnapshot::new();
        self.active = false;
        info!("Ring tracker unsubscribed");
    }

    /// Forget the previous snapshot without unsubscribing
    pub fn reset(&mut self) {
        self.previous = RingSnapshot::new();
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Mutable access for feeding store snapshots in
    pub fn stores_mut(&mut self) -> &mut S {
        &mut self.stores
    }

    /// Handle one dispatcher event, returning how many transitions were sent.
    ///
    /// Events other than `CALL_UPDATE`, events received while unsubscribed,
    /// and events that arrive before the current user is known are ignored
    /// without touching the previous snapshot.
    pub fn on_call_update(&mut self, event: &HostEvent) -> usize {
        let HostEvent::CallUpdate { channel_id, ongoing_rings } = event else {
            return 0;
        };
        if !self.active {
            trace!("Ignoring CALL_UPDATE for {} while unsubscribed", channel_id);
            return 0;
        }
        let Some(me) = self.stores.current_user() else {
            debug!("Current user not ready, dropping CALL_UPDATE for {}", channel_id);
            return 0;
        };
        let me = me.id.clone();

        let current = ongoing_rings.clone().unwrap_or_default();
        trace!("CALL_UPDATE for {} with {} ringer(s)", channel_id, current.len());
        let started = current.contains(&me) && !self.previous.contains(&me);
        let stopped = self.previous.contains(&me) && !current.contains(&me);
        let mut sent = 0;

        if started || stopped {
            let ctx = CallContext::resolve(&self.stores, channel_id);

            if started {
                if let Some(reason) = self.suppression_reason(&me) {
                    debug!("Ring on {} suppressed: {}", ctx.channel_name, reason);
                } else {
                    let kind = if ctx.is_group { "group" } else { "direct" };
                    info!("Incoming {} call from {} on {}", kind, ctx.display_name, ctx.channel_name);
                    self.sink.dispatch(RingTransition::Started(RingStarted {
                        display_name: ctx.display_name.clone(),
                        icon_url: ctx.icon_url.clone(),
                        channel_name: ctx.channel_name.clone(),
                        channel_id: ctx.channel_id.clone(),
                    }));
                    sent += 1;
                }
            }

            if stopped {
                info!("Ring stopped on {}", ctx.channel_name);
                self.sink.dispatch(RingTransition::Stopped(RingStopped {
                    display_name: ctx.display_name,
                    channel_name: ctx.channel_name,
                }));
                sent += 1;
            }
        }

        self.previous = current;
        sent
    }

    fn suppression_reason(&self, me: &str) -> Option<&'static str> {
        if self.policy.suppress_when_focused && self.stores.has_focus() {
            return Some("client window focused");
        }
        if self.policy.suppress_when_dnd && self.stores.status(me) == Some(STATUS_DND) {
            return Some("do not disturb");
        }
        None
    }
}
