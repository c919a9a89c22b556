//! Ring transitions and the sink they are dispatched to

use serde::{Deserialize, Serialize};

/// The local user started being rung.
///
/// Also the payload the popup renders, so the wire names match what the
/// popup page reads (`username` carries the display name).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RingStarted {
    #[serde(rename = "username")]
    pub display_name: String,
    pub icon_url: Option<String>,
    pub channel_name: String,
    pub channel_id: String,
}

/// The local user is no longer being rung
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RingStopped {
    #[serde(rename = "username")]
    pub display_name: String,
    pub channel_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RingTransition {
    Started(RingStarted),
    Stopped(RingStopped),
}

#[cfg(test)]
impl RingTransition {
    pub fn is_started(&self) -> bool {
        matches!(self, RingTransition::Started(_))
    }
}

/// One-way, ordered, fire-and-forget channel from the tracker to whoever
/// owns the popup. Implementations must not block.
pub trait RingSink {
    fn dispatch(&self, transition: RingTransition);
}

impl<T: RingSink + ?Sized> RingSink for &T {
    fn dispatch(&self, transition: RingTransition) {
        (**self).dispatch(transition)
    }
}
