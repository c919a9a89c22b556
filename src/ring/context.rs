//! Per-event call context
//!
//! Resolves what the popup should say about a channel: its name, who the
//! caller is, and which icon to show.

use crate::model::Channel;
use crate::stores::HostStores;

/// Client CDN root for icons and avatars
pub const CDN: &str = "https://cdn.discordapp.com";

/// Read-only view of one call update, computed fresh from each event
#[derive(Debug, Clone, PartialEq)]
pub struct CallContext {
    pub channel_id: String,
    pub channel_name: String,
    /// Channel name for group contexts, the other party otherwise
    pub display_name: String,
    pub icon_url: Option<String>,
    pub is_group: bool,
}

impl CallContext {
    pub fn resolve(stores: &impl HostStores, channel_id: &str) -> Self {
        let channel = stores.channel(channel_id);
        let has_guild = channel.and_then(Channel::guild).is_some();
        let is_group = channel.map_or(false, |c| has_guild || c.recipients.len() > 1);
        let channel_name = channel_name(stores, channel_id, channel);

        let display_name = match channel.and_then(|c| c.recipients.first()) {
            Some(recipient) if !is_group => user_display_name(stores, recipient),
            _ => channel_name.clone(),
        };

        Self {
            channel_id: channel_id.to_string(),
            icon_url: channel.and_then(|c| icon_url(stores, c)),
            channel_name,
            display_name,
            is_group,
        }
    }
}

/// Resolved display name of a user id, or the raw id for unknown users
pub fn user_display_name(stores: &impl HostStores, user_id: &str) -> String {
    stores
        .user(user_id)
        .map(|u| u.display_name().to_string())
        .unwrap_or_else(|| user_id.to_string())
}

fn channel_name(stores: &impl HostStores, channel_id: &str, channel: Option<&Channel>) -> String {
    let Some(channel) = channel else {
        return channel_id.to_string();
    };

    if let Some(name) = channel.name.as_deref().filter(|n| !n.is_empty()) {
        return format!("#{}", name);
    }

    if !channel.recipients.is_empty() {
        return channel
            .recipients
            .iter()
            .map(|id| user_display_name(stores, id))
            .collect::<Vec<_>>()
            .join(", ");
    }

    channel_id.to_string()
}

// Guild icon, then the single recipient's avatar, then the channel's own icon.
fn icon_url(stores: &impl HostStores, channel: &Channel) -> Option<String> {
    if let Some(guild_id) = channel.guild() {
        let guild_icon = stores
            .guild(guild_id)
            .and_then(|g| g.icon.as_deref().map(|icon| (g.id.as_str(), icon)));
        if let Some((id, icon)) = guild_icon {
            return Some(format!("{}/icons/{}/{}.png?size=64", CDN, id, icon));
        }
    }

    if let [recipient] = channel.recipients.as_slice() {
        let user = stores.user(recipient);
        if let Some(u) = user {
            if let Some(avatar) = u.avatar.as_deref() {
                return Some(format!("{}/avatars/{}/{}.png?size=64", CDN, u.id, avatar));
            }
        }
        let index = user.map_or(0, |u| u.default_avatar_index());
        return Some(format!("{}/embed/avatars/{}.png", CDN, index));
    }

    channel
        .icon
        .as_deref()
        .map(|icon| format!("{}/channel-icons/{}/{}.png?size=64", CDN, channel.id, icon))
}
