use std::{fmt, sync::Arc};

use tracing::{debug, error, warn};

use crate::{
    domain::{ChannelId, TenantId},
    formatting::Notification,
    platform::{ChannelHandle, PlatformClient},
    tenant::TenantConfigStore,
};

/// Why a notification was not handed to the platform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    NoDestination,
    ChannelUnresolved(ChannelId),
    /// The platform resolved the id to a channel of another guild.
    ForeignChannel(ChannelId),
}

/// Outcome of one delivery attempt. There are no retries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeliveryResult {
    Delivered,
    Skipped(SkipReason),
    Failed(String),
}

impl DeliveryResult {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryResult::Delivered)
    }
}

impl fmt::Display for DeliveryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryResult::Delivered => f.write_str("delivered"),
            DeliveryResult::Skipped(SkipReason::NoDestination) => {
                f.write_str("skipped: no log channel configured")
            }
            DeliveryResult::Skipped(SkipReason::ChannelUnresolved(id)) => {
                write!(f, "skipped: log channel {id} not found")
            }
            DeliveryResult::Skipped(SkipReason::ForeignChannel(id)) => {
                write!(f, "skipped: channel {id} belongs to another server")
            }
            DeliveryResult::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Resolves a tenant's destination and sends through the platform port.
///
/// Holds no lock across the send, so a slow or failing tenant never delays another.
#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<TenantConfigStore>,
    platform: Arc<dyn PlatformClient>,
}

impl Dispatcher {
    pub fn new(store: Arc<TenantConfigStore>, platform: Arc<dyn PlatformClient>) -> Self {
        Self { store, platform }
    }

    /// Resolve `channel_id` as a sendable channel of `tenant_id`.
    pub async fn resolve(
        &self,
        tenant_id: TenantId,
        channel_id: ChannelId,
    ) -> std::result::Result<ChannelHandle, SkipReason> {
        let Some(handle) = self.platform.resolve_channel(tenant_id, channel_id).await else {
            warn!(
                tenant_id = %tenant_id,
                channel_id = %channel_id,
                "Log channel not found"
            );
            return Err(SkipReason::ChannelUnresolved(channel_id));
        };

        if handle.tenant_id != tenant_id || handle.channel_id != channel_id {
            error!(
                tenant_id = %tenant_id,
                channel_id = %channel_id,
                owner = %handle.tenant_id,
                "Channel belongs to another server; refusing to use it"
            );
            return Err(SkipReason::ForeignChannel(channel_id));
        }
        Ok(handle)
    }

    pub async fn dispatch(
        &self,
        tenant_id: TenantId,
        notification: &Notification,
    ) -> DeliveryResult {
        let Some(channel_id) = self.store.destination(tenant_id) else {
            warn!(tenant_id = %tenant_id, "No log channel configured; notification skipped");
            return DeliveryResult::Skipped(SkipReason::NoDestination);
        };
        let handle = match self.resolve(tenant_id, channel_id).await {
            Ok(handle) => handle,
            Err(reason) => return DeliveryResult::Skipped(reason),
        };

        match self.platform.send_notification(&handle, notification).await {
            Ok(()) => {
                debug!(
                    tenant_id = %tenant_id,
                    channel_id = %channel_id,
                    title = %notification.title,
                    "Delivered"
                );
                DeliveryResult::Delivered
            }
            Err(e) => {
                error!(
                    tenant_id = %tenant_id,
                    channel_id = %channel_id,
                    error = %e,
                    "Delivery failed"
                );
                DeliveryResult::Failed(e.to_string())
            }
        }
    }
}
