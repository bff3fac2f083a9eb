#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use campaign_dispatch::application::services::auth_service::hash_token;
use campaign_dispatch::domain::entities::{
    Campaign, CampaignStatus, NewCampaign, NewRecipient, Recipient, TargetingSpec,
};
use campaign_dispatch::domain::repositories::{CampaignRepository, TokenRepository};
use campaign_dispatch::domain::transport::{
    OutgoingMessage, SendReceipt, Transport, TransportError,
};
use campaign_dispatch::infrastructure::persistence::MemoryStore;
use campaign_dispatch::state::{AppState, DispatchSettings, Repositories};

pub const TEST_SECRET: &str = "test-signing-secret";
pub const PUBLIC_BASE_URL: &str = "https://shop.example.com";

/// Transport that records every message and fails for chosen addresses.
#[derive(Default)]
pub struct StubTransport {
    sent: Mutex<Vec<OutgoingMessage>>,
    failing: Mutex<HashSet<String>>,
    unhealthy: Mutex<bool>,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, address: &str) {
        self.failing.lock().unwrap().insert(address.to_string());
    }

    pub fn set_unhealthy(&self) {
        *self.unhealthy.lock().unwrap() = true;
    }

    /// Every message handed to the transport, including rejected ones.
    pub fn messages(&self) -> Vec<OutgoingMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn recipients(&self) -> Vec<String> {
        self.messages().into_iter().map(|m| m.to).collect()
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn send(&self, message: OutgoingMessage) -> Result<SendReceipt, TransportError> {
        let to = message.to.clone();
        self.sent.lock().unwrap().push(message);

        if self.failing.lock().unwrap().contains(&to) {
            return Err(TransportError::Rejected(format!("550 mailbox unavailable: {to}")));
        }
        Ok(SendReceipt {
            response: Some("250 OK".to_string()),
        })
    }

    async fn health_check(&self) -> bool {
        !*self.unhealthy.lock().unwrap()
    }
}

/// Everything a test needs to drive the service and inspect its effects.
pub struct TestContext {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub transport: Arc<StubTransport>,
}

pub fn create_test_context() -> TestContext {
    let store = Arc::new(MemoryStore::new());
    let transport = Arc::new(StubTransport::new());

    let state = AppState::new(
        Repositories::memory(store.clone()),
        transport.clone(),
        DispatchSettings {
            public_base_url: PUBLIC_BASE_URL.to_string(),
            send_interval: Duration::ZERO,
            batch_size: 2,
            token_signing_secret: TEST_SECRET.to_string(),
        },
    );

    TestContext {
        state,
        store,
        transport,
    }
}

/// Stores an operator token and returns the raw bearer value.
pub async fn create_api_token(store: &MemoryStore, name: &str) -> String {
    let raw = format!("{name}-raw-token");
    TokenRepository::create(store, name, &hash_token(TEST_SECRET, &raw))
        .await
        .unwrap();
    raw
}

pub async fn seed_opted_in(store: &MemoryStore, emails: &[&str]) -> Vec<Recipient> {
    let mut recipients = Vec::with_capacity(emails.len());
    for email in emails {
        recipients.push(store.insert_recipient(NewRecipient::opted_in(email)).await);
    }
    recipients
}

pub async fn create_draft(store: &MemoryStore, targeting: TargetingSpec) -> Campaign {
    CampaignRepository::create(
        store,
        NewCampaign {
            name: "Spring sale".to_string(),
            subject: "Everything 20% off".to_string(),
            html_content: "<h1>Spring</h1><p>Everything is 20% off.</p>".to_string(),
            text_content: None,
            targeting,
            created_by: Some("tests".to_string()),
        },
    )
    .await
    .unwrap()
}

/// Polls until the campaign reaches `status` or two seconds pass.
pub async fn wait_for_status(store: &MemoryStore, id: i64, status: CampaignStatus) -> Campaign {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        let campaign = store.campaign(id).await.unwrap();
        if campaign.status == status {
            return campaign;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "campaign {id} stuck in {:?}",
            campaign.status
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
