//! The explicit context every event run goes through.

use std::sync::Arc;

use tracing::debug;

use crate::{
    dispatch::{DeliveryResult, Dispatcher},
    formatting::Formatter,
    normalize::Normalizer,
    platform::{PlatformClient, RawEvent},
    rate_limit::RateLimiter,
    tenant::TenantConfigStore,
};

/// What happened to one raw callback.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Bot actor, direct message, or nothing worth reporting.
    Ignored,
    CategoryDisabled,
    Excluded,
    RateLimited,
    Dispatched(DeliveryResult),
}

/// Shared state of all pipeline runs. Cheap to clone.
#[derive(Clone)]
pub struct Pipeline {
    pub store: Arc<TenantConfigStore>,
    pub limiter: Arc<RateLimiter>,
    pub normalizer: Normalizer,
    pub formatter: Formatter,
    pub dispatcher: Dispatcher,
}

impl Pipeline {
    pub fn new(
        store: Arc<TenantConfigStore>,
        limiter: Arc<RateLimiter>,
        normalizer: Normalizer,
        platform: Arc<dyn PlatformClient>,
    ) -> Self {
        let dispatcher = Dispatcher::new(store.clone(), platform);
        Self {
            store,
            limiter,
            normalizer,
            formatter: Formatter::new(),
            dispatcher,
        }
    }

    /// normalize → category gate → exclusion → rate limit → format → dispatch.
    ///
    /// Disabled categories and excluded subjects never consume rate-limit slots.
    pub async fn handle(&self, raw: RawEvent) -> PipelineOutcome {
        let Some(event) = self.normalizer.normalize(raw) else {
            return PipelineOutcome::Ignored;
        };
        let tenant = self.store.get(event.tenant_id);

        if !tenant.allows(event.category) {
            debug!(tenant_id = %event.tenant_id, category = %event.category, "Category disabled");
            return PipelineOutcome::CategoryDisabled;
        }
        if tenant.is_excluded(event.subject_id) {
            debug!(tenant_id = %event.tenant_id, subject = %event.subject_id, "Subject excluded");
            return PipelineOutcome::Excluded;
        }
        if !self.limiter.allow(event.category, event.subject_id) {
            return PipelineOutcome::RateLimited;
        }

        let notification = self.formatter.format(&event, &tenant);
        PipelineOutcome::Dispatched(self.dispatcher.dispatch(event.tenant_id, &notification).await)
    }
}
