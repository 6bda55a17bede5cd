use async_trait::async_trait;

use crate::{
    domain::{ChannelId, TenantId},
    formatting::Notification,
    Result,
};

/// A sendable channel, as resolved by the platform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelHandle {
    /// The guild the channel actually belongs to, as reported by the platform.
    pub tenant_id: TenantId,
    pub channel_id: ChannelId,
    pub name: String,
}

/// Outbound platform port used by the dispatcher.
///
/// Connection and request timeouts are the implementation's responsibility.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// `None` when the channel does not exist, is not visible, or cannot receive messages.
    async fn resolve_channel(
        &self,
        tenant_id: TenantId,
        channel_id: ChannelId,
    ) -> Option<ChannelHandle>;

    async fn send_notification(
        &self,
        channel: &ChannelHandle,
        notification: &Notification,
    ) -> Result<()>;
}
