//! Shared application state and its wiring.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;

use crate::application::dispatch_worker::DispatchWorker;
use crate::application::services::{
    AudienceService, AuthService, CampaignService, DispatchService, UnsubscribeService,
};
use crate::domain::repositories::{
    CampaignRepository, DeliveryLogRepository, RecipientRepository, TokenRepository,
};
use crate::domain::transport::Transport;
use crate::infrastructure::persistence::{
    MemoryStore, PgCampaignRepository, PgDeliveryLogRepository, PgRecipientRepository,
    PgTokenRepository,
};
use crate::infrastructure::throttle::SendThrottle;

/// Repository handles the services are built from.
#[derive(Clone)]
pub struct Repositories {
    pub campaigns: Arc<dyn CampaignRepository>,
    pub recipients: Arc<dyn RecipientRepository>,
    pub deliveries: Arc<dyn DeliveryLogRepository>,
    pub tokens: Arc<dyn TokenRepository>,
}

impl Repositories {
    pub fn postgres(pool: Arc<PgPool>) -> Self {
        Self {
            campaigns: Arc::new(PgCampaignRepository::new(pool.clone())),
            recipients: Arc::new(PgRecipientRepository::new(pool.clone())),
            deliveries: Arc::new(PgDeliveryLogRepository::new(pool.clone())),
            tokens: Arc::new(PgTokenRepository::new(pool)),
        }
    }

    /// Every repository backed by the same in-memory store.
    pub fn memory(store: Arc<MemoryStore>) -> Self {
        Self {
            campaigns: store.clone(),
            recipients: store.clone(),
            deliveries: store.clone(),
            tokens: store,
        }
    }
}

/// Tunables for dispatch and operator authentication.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Base for unsubscribe links, without a trailing slash.
    pub public_base_url: String,
    /// Minimum spacing between transport calls, process-wide. Zero disables.
    pub send_interval: Duration,
    pub batch_size: i64,
    pub token_signing_secret: String,
}

/// State injected into every handler.
#[derive(Clone)]
pub struct AppState {
    pub campaign_service: Arc<CampaignService>,
    pub dispatch_service: Arc<DispatchService>,
    pub audience_service: Arc<AudienceService>,
    pub unsubscribe_service: Arc<UnsubscribeService>,
    pub auth_service: Arc<AuthService>,
    pub transport: Arc<dyn Transport>,
}

impl AppState {
    /// Builds every service over `repos` and `transport`.
    ///
    /// One [`SendThrottle`] is created here and shared by all send loops.
    pub fn new(
        repos: Repositories,
        transport: Arc<dyn Transport>,
        settings: DispatchSettings,
    ) -> Self {
        let throttle = Arc::new(SendThrottle::new(settings.send_interval));

        let audience_service = Arc::new(AudienceService::new(repos.recipients.clone()));
        let unsubscribe_service = Arc::new(UnsubscribeService::new(repos.recipients.clone()));

        let worker = DispatchWorker::new(
            repos.campaigns.clone(),
            repos.deliveries.clone(),
            transport.clone(),
            throttle,
            settings.public_base_url.trim_end_matches('/').to_string(),
            settings.batch_size,
        );

        let dispatch_service = Arc::new(DispatchService::new(
            repos.campaigns.clone(),
            repos.deliveries.clone(),
            audience_service.clone(),
            unsubscribe_service.clone(),
            worker,
        ));

        let campaign_service = Arc::new(CampaignService::new(
            repos.campaigns,
            repos.deliveries,
            transport.clone(),
        ));

        let auth_service = Arc::new(AuthService::new(
            repos.tokens,
            settings.token_signing_secret,
        ));

        Self {
            campaign_service,
            dispatch_service,
            audience_service,
            unsubscribe_service,
            auth_service,
            transport,
        }
    }
}
