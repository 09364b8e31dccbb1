use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use sha2::{Digest, Sha256};

use crate::error::AppError;

/// Timeouts applied uniformly to every pooled client.
#[derive(Clone, Copy, Debug)]
pub struct PoolTimeouts {
    pub connect: Duration,
    pub read: Duration,
    pub pool_idle: Duration,
}

impl Default for PoolTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(5),
            read: Duration::from_secs(30),
            pool_idle: Duration::from_secs(90),
        }
    }
}

/// A process-wide registry of shared `reqwest::Client`s, keyed by a hash of
/// the credential + model that selected them, following spec.md §4.10's
/// "singleton keyed by credential+model hash; reconfiguration closes and
/// replaces the pool".
#[derive(Default)]
pub struct ConnectionPool {
    clients: Mutex<HashMap<String, Arc<reqwest::Client>>>,
    max_connections: usize,
}

impl ConnectionPool {
    #[must_use]
    pub fn new(max_connections: usize) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            max_connections,
        }
    }

    fn key(credential: &str, model: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(credential.as_bytes());
        hasher.update(b"::");
        hasher.update(model.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Returns the shared client for `(credential, model)`, building it on
    /// first use with bounded keep-alive connections and HTTP/2 enabled.
    pub fn client_for(&self, credential: &str, model: &str) -> Result<Arc<reqwest::Client>, AppError> {
        let key = Self::key(credential, model);
        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(client) = clients.get(&key) {
            return Ok(Arc::clone(client));
        }
        let timeouts = PoolTimeouts::default();
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(self.max_connections)
            .pool_idle_timeout(timeouts.pool_idle)
            .connect_timeout(timeouts.connect)
            .timeout(timeouts.read)
            .build()
            .map_err(AppError::Reqwest)?;
        let client = Arc::new(client);
        clients.insert(key, Arc::clone(&client));
        Ok(client)
    }

    /// Drops the cached client for `(credential, model)`, forcing the next
    /// `client_for` call to rebuild it against new settings.
    pub fn reconfigure(&self, credential: &str, model: &str) {
        let key = Self::key(credential, model);
        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());
        clients.remove(&key);
    }
}
