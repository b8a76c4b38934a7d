pub mod http_client;
mod wire;

use async_trait::async_trait;

use crate::app::Result;
use crate::domain::{Identity, RawItem};

pub use http_client::HttpSourceClient;

/// Number of items requested per cycle.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Authorization state of the upstream session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Ready,
    WaitParameters,
    WaitPhoneNumber,
    WaitCode,
    Closed,
    Other(String),
}

#[async_trait]
pub trait SourceClient: Send + Sync {
    async fn authorization_state(&self) -> Result<AuthState>;

    /// True once the session is authenticated.
    async fn is_ready(&self) -> bool {
        matches!(self.authorization_state().await, Ok(AuthState::Ready))
    }

    /// Start the challenge by registering the account's phone number.
    async fn submit_phone_number(&self, phone_number: &str) -> Result<()>;

    /// Finish the challenge with the code delivered out of band.
    async fn complete_challenge(&self, code: &str) -> Result<Identity>;

    /// Resolve the configured channel.
    async fn resolve_identity(&self) -> Result<Identity>;

    /// One page of items with an id greater than `cursor`, ascending by id.
    async fn fetch_since(&self, cursor: Option<i64>, limit: usize) -> Result<Vec<RawItem>>;
}
