use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::{debug, info};
use url::Url;

use crate::app::{HarvestError, Result};
use crate::config::SourceConfig;
use crate::domain::{Identity, RawItem};
use crate::source::wire;
use crate::source::{AuthState, SourceClient};

/// Talks JSON to a client gateway that hosts the upstream user session.
pub struct HttpSourceClient {
    client: Client,
    base_url: Url,
    channel_username: String,
    channel_id: Mutex<Option<i64>>,
}

impl HttpSourceClient {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .brotli(true)
            .user_agent(concat!("harvester/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let mut base_url = Url::parse(&config.base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            client,
            base_url,
            channel_username: config.channel_username.clone(),
            channel_id: Mutex::new(None),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    fn cached_channel_id(&self) -> Option<i64> {
        self.channel_id.lock().ok().and_then(|guard| *guard)
    }

    fn cache_channel_id(&self, id: i64) {
        if let Ok(mut guard) = self.channel_id.lock() {
            *guard = Some(id);
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let detail = serde_json::from_slice::<wire::GatewayError>(&body)
                .map(|e| format!("{} {}", e.code, e.message))
                .unwrap_or_else(|_| String::from_utf8_lossy(&body).into_owned());
            return Err(HarvestError::Source(format!("{}: {}", status, detail.trim())));
        }

        Ok(serde_json::from_slice(&body)?)
    }

    async fn channel_id(&self) -> Result<i64> {
        match self.cached_channel_id() {
            Some(id) => Ok(id),
            None => Ok(self.resolve_identity().await?.id),
        }
    }
}

#[async_trait]
impl SourceClient for HttpSourceClient {
    async fn authorization_state(&self) -> Result<AuthState> {
        let url = self.endpoint("auth/state")?;
        let tag: wire::TypeTag = self.send(self.client.get(url)).await?;
        let state = AuthState::from(tag);
        debug!(?state, "Authorization state");
        Ok(state)
    }

    async fn submit_phone_number(&self, phone_number: &str) -> Result<()> {
        let url = self.endpoint("auth/phone")?;
        let _: serde_json::Value = self
            .send(
                self.client
                    .post(url)
                    .json(&wire::PhoneNumberRequest { phone_number }),
            )
            .await?;
        Ok(())
    }

    async fn complete_challenge(&self, code: &str) -> Result<Identity> {
        let url = self.endpoint("auth/code")?;
        let _: serde_json::Value = self
            .send(self.client.post(url).json(&wire::CodeRequest { code }))
            .await?;
        info!("Authentication code accepted");
        self.resolve_identity().await
    }

    async fn resolve_identity(&self) -> Result<Identity> {
        let url = self.endpoint("chats/resolve")?;
        let chat: wire::Chat = self
            .send(
                self.client
                    .get(url)
                    .query(&[("username", self.channel_username.as_str())]),
            )
            .await?;
        let identity = Identity::from(chat);
        self.cache_channel_id(identity.id);
        Ok(identity)
    }

    async fn fetch_since(&self, cursor: Option<i64>, limit: usize) -> Result<Vec<RawItem>> {
        let chat_id = self.channel_id().await?;
        let url = self.endpoint(&format!("chats/{}/history", chat_id))?;
        let from = cursor.unwrap_or(0).to_string();
        let limit_param = limit.to_string();

        let history: wire::Messages = self
            .send(
                self.client
                    .get(url)
                    .query(&[("from_message_id", from.as_str()), ("limit", limit_param.as_str())]),
            )
            .await?;

        Ok(page_after(
            history.messages.unwrap_or_default().into_iter().map(Into::into),
            cursor,
            limit,
        ))
    }
}

/// Keep items strictly after `cursor`, ascending by id, at most `limit`.
fn page_after(items: impl Iterator<Item = RawItem>, cursor: Option<i64>, limit: usize) -> Vec<RawItem> {
    let mut page: Vec<RawItem> = items
        .filter(|item| cursor.map_or(true, |c| item.id > c))
        .collect();
    page.sort_by_key(|item| item.id);
    page.dedup_by_key(|item| item.id);
    page.truncate(limit);
    page
}
