//! Application context built once at startup.
//!
//! Holds the configuration, the token store and the API client, and hands
//! them to whatever needs them. Nothing in the crate keeps global state.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::api::{ApiClient, ApiError, UserInfo};
use crate::auth::{FileTier, KeyringTier, StorageTier, TokenStore};
use crate::config::{Config, DurableBackend};
use crate::export::{BusinessType, ExportService, Exporter};

pub struct AppContext {
    config: Config,
    client: ApiClient,
}

impl AppContext {
    /// Build the context with the storage tiers the configuration selects.
    pub fn from_config(config: Config) -> Result<Self> {
        let durable: Box<dyn StorageTier> = match config.durable_backend {
            DurableBackend::File => Box::new(FileTier::new(config.data_dir()?)),
            DurableBackend::Keyring => Box::new(KeyringTier::new()),
        };
        let session: Box<dyn StorageTier> = Box::new(FileTier::new(config.session_dir()));
        debug!(durable = ?config.durable_backend, "Storage tiers selected");

        Self::with_store(config, TokenStore::new(durable, session))
    }

    /// Build the context around an already constructed token store.
    pub fn with_store(config: Config, store: TokenStore) -> Result<Self> {
        let client = ApiClient::new(
            &config.base_url,
            Duration::from_secs(config.request_timeout_secs),
            Arc::new(store),
        )
        .context("Failed to create API client")?
        .with_accept_language(config.accept_language.clone());

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn store(&self) -> &TokenStore {
        self.client.store()
    }

    pub fn exports(&self) -> ExportService {
        ExportService::new(self.client.clone())
    }

    pub fn exporter(&self, business: BusinessType) -> Exporter {
        Exporter::new(self.exports(), business)
    }

    /// Resume a stored login on startup.
    ///
    /// Returns the account when the stored token is still accepted, `None`
    /// when there is no token or the backend rejected it (the store is
    /// cleared in that case).
    pub async fn restore_session(&self) -> Result<Option<UserInfo>, ApiError> {
        if !self.store().is_authenticated() {
            debug!("No stored credential, skipping user info");
            return Ok(None);
        }

        match self.client.user_info().await {
            Ok(user) => {
                info!(username = %user.username, "Session restored");
                Ok(Some(user))
            }
            Err(ApiError::Unauthorized) => {
                info!("Stored credential rejected, logged out");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
