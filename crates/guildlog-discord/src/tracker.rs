//! Recent-message and presence memory.
//!
//! The gateway does not resend the old content on edits or deletions, so the
//! last hour of guild messages is kept here.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use guildlog_core::{domain::MessageId, platform::types::MessageSnapshot};

pub const DEFAULT_RETENTION: Duration = Duration::from_secs(60 * 60);

/// Prune at most once per this many inserts.
const PRUNE_EVERY: usize = 256;

#[derive(Debug)]
pub struct MessageTracker {
    retention: Duration,
    messages: DashMap<MessageId, (MessageSnapshot, Instant)>,
    /// Last known status per (guild, user).
    presence: DashMap<(u64, u64), String>,
}

impl Default for MessageTracker {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION)
    }
}

impl MessageTracker {
    pub fn new(retention: Duration) -> Self {
        Self {
            retention,
            messages: DashMap::new(),
            presence: DashMap::new(),
        }
    }

    pub fn record(&self, snapshot: MessageSnapshot) {
        self.record_at(snapshot, Instant::now());
    }

    pub fn record_at(&self, snapshot: MessageSnapshot, now: Instant) {
        self.messages.insert(snapshot.id, (snapshot, now));
        if self.messages.len() % PRUNE_EVERY == 0 {
            self.prune_at(now);
        }
    }

    pub fn get(&self, id: MessageId) -> Option<MessageSnapshot> {
        self.messages.get(&id).map(|e| e.value().0.clone())
    }

    /// Replace the stored content; returns the snapshot as it was before.
    pub fn update_content(&self, id: MessageId, content: &str) -> Option<MessageSnapshot> {
        let mut entry = self.messages.get_mut(&id)?;
        let before = entry.0.clone();
        entry.0.content = content.to_string();
        Some(before)
    }

    pub fn take(&self, id: MessageId) -> Option<MessageSnapshot> {
        self.messages.remove(&id).map(|(_, (snapshot, _))| snapshot)
    }

    pub fn prune_at(&self, now: Instant) -> usize {
        let before = self.messages.len();
        self.messages
            .retain(|_, (_, seen)| now.saturating_duration_since(*seen) < self.retention);
        before.saturating_sub(self.messages.len())
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Store the new status and return the previous one.
    pub fn swap_presence(&self, guild: u64, user: u64, status: &str) -> Option<String> {
        self.presence.insert((guild, user), status.to_string())
    }

    pub fn forget_presence(&self, guild: u64, user: u64) -> bool {
        self.presence.remove(&(guild, user)).is_some()
    }

    /// Drop every presence entry of a guild; returns how many went.
    pub fn forget_guild(&self, guild: u64) -> usize {
        let before = self.presence.len();
        self.presence.retain(|(g, _), _| *g != guild);
        before.saturating_sub(self.presence.len())
    }

    pub fn presence_len(&self) -> usize {
        self.presence.len()
    }
}
