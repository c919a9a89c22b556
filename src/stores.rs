//! Host store lookups
//!
//! The tracker never reads the web client directly. It asks a [`HostStores`]
//! implementation, which in the running process is a [`MemoryStores`] cache
//! filled from the snapshot messages the client script sends over stdin.

use log::debug;
use std::collections::HashMap;

use crate::model::{Channel, Guild, User};

/// Presence status string the client uses for do-not-disturb
pub const STATUS_DND: &str = "dnd";

/// Read-only view of the client's user, channel, guild and presence stores
pub trait HostStores {
    /// The logged-in user, or `None` while the client is still starting up
    fn current_user(&self) -> Option<&User>;

    fn user(&self, id: &str) -> Option<&User>;

    fn channel(&self, id: &str) -> Option<&Channel>;

    fn guild(&self, id: &str) -> Option<&Guild>;

    /// Presence status of a user ("online", "idle", "dnd", ...)
    fn status(&self, user_id: &str) -> Option<&str>;

    /// Whether the main client window currently has focus
    fn has_focus(&self) -> bool {
        false
    }
}

/// In-memory stores populated from host messages
#[derive(Debug, Default)]
pub struct MemoryStores {
    current_user: Option<String>,
    users: HashMap<String, User>,
    channels: HashMap<String, Channel>,
    guilds: HashMap<String, Guild>,
    statuses: HashMap<String, String>,
    focused: bool,
}

impl MemoryStores {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the logged-in user (also added to the user store)
    pub fn set_current_user(&mut self, user: User) {
        debug!("Current user is now {}", user.id);
        self.current_user = Some(user.id.clone());
        self.upsert_user(user);
    }

    pub fn upsert_user(&mut self, user: User) {
        self.users.insert(user.id.clone(), user);
    }

    pub fn upsert_channel(&mut self, channel: Channel) {
        self.channels.insert(channel.id.clone(), channel);
    }

    pub fn upsert_guild(&mut self, guild: Guild) {
        self.guilds.insert(guild.id.clone(), guild);
    }

    pub fn set_status(&mut self, user_id: impl Into<String>, status: impl Into<String>) {
        self.statuses.insert(user_id.into(), status.into());
    }

    pub fn set_focus(&mut self, focused: bool) {
        self.focused = focused;
    }
}

impl HostStores for MemoryStores {
    fn current_user(&self) -> Option<&User> {
        self.current_user
            .as_deref()
            .and_then(|id| self.users.get(id))
    }

    fn user(&self, id: &str) -> Option<&User> {
        self.users.get(id)
    }

    fn channel(&self, id: &str) -> Option<&Channel> {
        self.channels.get(id)
    }

    fn guild(&self, id: &str) -> Option<&Guild> {
        self.guilds.get(id)
    }

    fn status(&self, user_id: &str) -> Option<&str> {
        self.statuses.get(user_id).map(String::as_str)
    }

    fn has_focus(&self) -> bool {
        self.focused
    }
}
