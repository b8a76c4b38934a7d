//! Readiness gate in front of the source session.
//!
//! The challenge itself is answered out of band (`harvester auth <code>`);
//! the poller only asks whether the session is usable and which channel it
//! resolves to.

use std::sync::{Arc, OnceLock};

use tracing::{error, info, warn};

use crate::app::Result;
use crate::domain::Channel;
use crate::source::{AuthState, SourceClient};
use crate::store::Store;

pub struct AuthGate<S: Store + Send + Sync + 'static> {
    source: Arc<dyn SourceClient>,
    store: Arc<S>,
    channel_username: Option<String>,
    phone_number: Option<String>,
    channel_id: OnceLock<i64>,
}

impl<S: Store + Send + Sync + 'static> AuthGate<S> {
    pub fn new(
        source: Arc<dyn SourceClient>,
        store: Arc<S>,
        channel_username: Option<String>,
        phone_number: Option<String>,
    ) -> Self {
        Self {
            source,
            store,
            channel_username,
            phone_number,
            channel_id: OnceLock::new(),
        }
    }

    /// Boot-time handshake: start the challenge if the session needs one,
    /// seed the channel if it is already authenticated.
    pub async fn connect(&self) -> Result<AuthState> {
        let state = self.source.authorization_state().await?;

        match &state {
            AuthState::Ready => {
                let channel = self.seed_channel().await?;
                info!(channel = %channel.display_title(), "Session already authenticated");
            }
            AuthState::WaitPhoneNumber => match self.phone_number.as_deref() {
                Some(phone) => {
                    self.source.submit_phone_number(phone).await?;
                    info!("Verification code requested; deliver it with `harvester auth <code>`");
                }
                None => warn!("Session needs a phone number but none is configured"),
            },
            AuthState::WaitCode => {
                info!("Waiting for verification code; deliver it with `harvester auth <code>`")
            }
            other => warn!(state = ?other, "Unexpected authorization state"),
        }

        Ok(state)
    }

    /// True once the session is authenticated and the channel resolves.
    /// The first successful resolution records the channel.
    pub async fn is_ready(&self) -> bool {
        if !self.source.is_ready().await {
            return false;
        }
        if self.channel_id.get().is_some() {
            return true;
        }

        match self.seed_channel().await {
            Ok(_) => true,
            Err(e) => {
                error!(error = %e, "Failed to resolve channel");
                false
            }
        }
    }

    /// Resolve the channel and record it if it is not stored yet.
    pub async fn seed_channel(&self) -> Result<Channel> {
        let identity = self.source.resolve_identity().await?;
        self.record_channel(identity.into_channel(self.channel_username.clone()))
    }

    /// Answer the authentication challenge and record the resolved channel.
    pub async fn complete_challenge(&self, code: &str) -> Result<Channel> {
        let identity = self.source.complete_challenge(code).await?;
        let channel = self.record_channel(identity.into_channel(self.channel_username.clone()))?;
        info!(channel_id = channel.channel_id, "Authentication completed");
        Ok(channel)
    }

    /// Highest stored message id for the resolved channel.
    pub async fn starting_cursor(&self) -> Result<Option<i64>> {
        let channel_id = match self.channel_id.get() {
            Some(id) => *id,
            None => self.seed_channel().await?.channel_id,
        };
        let cursor = self.store.max_message_id(channel_id)?;
        info!(channel_id, cursor = ?cursor, "Last stored message");
        Ok(cursor)
    }

    pub fn channel_id(&self) -> Option<i64> {
        self.channel_id.get().copied()
    }

    fn record_channel(&self, channel: Channel) -> Result<Channel> {
        if self.store.upsert_channel_if_absent(&channel)? {
            info!(channel_id = channel.channel_id, "Recorded channel");
        }
        let _ = self.channel_id.set(channel.channel_id);
        Ok(channel)
    }
}
