use std::path::PathBuf;
use std::sync::Arc;

use crate::app::error::{HarvestError, Result};
use crate::auth::AuthGate;
use crate::config::Config;
use crate::ingest::Ingestor;
use crate::poller::Poller;
use crate::source::{HttpSourceClient, SourceClient};
use crate::store::SqliteStore;

pub struct AppContext {
    pub config: Config,
    pub store: Arc<SqliteStore>,
    pub source: Arc<dyn SourceClient>,
    pub gate: Arc<AuthGate<SqliteStore>>,
    pub ingestor: Arc<Ingestor<SqliteStore>>,
}

impl AppContext {
    pub fn new(config: Config) -> Result<Self> {
        let db_path = match config.store.path.clone() {
            Some(p) => p,
            None => Self::default_db_path()?,
        };

        let store = Arc::new(SqliteStore::new(&db_path)?);
        let source: Arc<dyn SourceClient> = Arc::new(HttpSourceClient::new(&config.source)?);
        Ok(Self::with_parts(config, store, source))
    }

    pub fn in_memory(config: Config, source: Arc<dyn SourceClient>) -> Result<Self> {
        let store = Arc::new(SqliteStore::in_memory()?);
        Ok(Self::with_parts(config, store, source))
    }

    fn with_parts(config: Config, store: Arc<SqliteStore>, source: Arc<dyn SourceClient>) -> Self {
        let username = Some(config.source.channel_username.clone()).filter(|u| !u.is_empty());
        let gate = Arc::new(AuthGate::new(
            source.clone(),
            store.clone(),
            username,
            config.source.phone_number.clone(),
        ));
        let ingestor = Arc::new(Ingestor::with_page_size(
            source.clone(),
            store.clone(),
            config.polling.page_size,
        ));

        Self {
            config,
            store,
            source,
            gate,
            ingestor,
        }
    }

    /// A poller over this context's gate and ingestor.
    pub fn poller(&self) -> Poller<SqliteStore> {
        Poller::new(self.gate.clone(), self.ingestor.clone(), &self.config.polling)
    }

    fn default_db_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| HarvestError::Config("Could not find data directory".into()))?;
        let harvester_dir = data_dir.join("harvester");
        std::fs::create_dir_all(&harvester_dir)?;
        Ok(harvester_dir.join("harvester.db"))
    }
}
