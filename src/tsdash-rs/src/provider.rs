use reqwest::Client as HttpClient;
use std::sync::Arc;
use tokio::sync::Mutex;

use tsdash_core::{ConnectionConfig, ConnectionStore};

use crate::client::TypesenseClient;
use crate::request::RequestOptions;
use crate::{ClientError, Result};

/// Hands out the client for the currently saved connection.
///
/// The handle is built lazily from the store and memoized until
/// [`reset_client`](Self::reset_client). Building happens under the lock, so
/// concurrent callers never end up with two live handles.
pub struct ClientProvider {
    store: Arc<dyn ConnectionStore>,
    http: HttpClient,
    options: RequestOptions,
    current: Mutex<Option<Arc<TypesenseClient>>>,
}

impl ClientProvider {
    pub fn new(store: Arc<dyn ConnectionStore>) -> Self {
        Self::with_options(store, HttpClient::new(), RequestOptions::default())
    }

    pub fn with_options(
        store: Arc<dyn ConnectionStore>,
        http: HttpClient,
        options: RequestOptions,
    ) -> Self {
        Self {
            store,
            http,
            options,
            current: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &Arc<dyn ConnectionStore> {
        &self.store
    }

    /// Current client, built from the store on first use
    pub async fn get_client(&self) -> Result<Arc<TypesenseClient>> {
        let mut current = self.current.lock().await;
        if let Some(client) = current.as_ref() {
            return Ok(client.clone());
        }

        let form = self.store.load()?;
        if form.is_empty() {
            return Err(ClientError::NotConnected);
        }
        let config = form.validate()?;

        tracing::debug!(host = %config.host, port = config.port, "Building Typesense client");
        let client = Arc::new(TypesenseClient::with_http(
            self.http.clone(),
            config,
            self.options.clone(),
        ));
        *current = Some(client.clone());
        Ok(client)
    }

    /// Drop the current client; the next `get_client` rebuilds from the store
    pub async fn reset_client(&self) {
        if self.current.lock().await.take().is_some() {
            tracing::debug!("Typesense client reset");
        }
    }

    /// Persist `config` and invalidate the current client
    pub async fn save(&self, config: &ConnectionConfig) -> Result<()> {
        self.store.save(config)?;
        self.reset_client().await;
        Ok(())
    }

    /// Forget the saved connection and invalidate the current client
    pub async fn clear(&self) -> Result<()> {
        self.store.clear()?;
        self.reset_client().await;
        Ok(())
    }

    pub fn is_connected(&self) -> Result<bool> {
        Ok(self.store.is_connected()?)
    }
}
