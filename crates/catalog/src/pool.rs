use crate::error::{CatalogError, Result};
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tokio_postgres::Client;
use tracing::{error, warn};

/// Connection parameters for the catalog database (spec §6, `CATALOG_*`).
#[derive(Clone, Debug)]
pub struct CatalogConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl CatalogConfig {
    pub fn connection_string(&self) -> String {
        format!(
            "host={} port={} user={} password={} dbname={}",
            self.host, self.port, self.user, self.password, self.database
        )
    }
}

const RECONNECT_BASE_DELAY: Duration = Duration::from_millis(200);
const RECONNECT_MAX_DELAY: Duration = Duration::from_secs(10);
const RECONNECT_MAX_ATTEMPTS: usize = 10;

/// Holds the live connection and reconnects with bounded backoff on failure
/// (spec §4.1: "All reads tolerate stale connections by reconnecting with
/// bounded backoff"). A single serialized connection is sufficient for the
/// catalog's role as checkpoint/config store, not a hot data path.
pub struct CatalogPool {
    config: CatalogConfig,
    client: Mutex<Client>,
}

impl CatalogPool {
    pub async fn connect(config: CatalogConfig) -> Result<Self> {
        let client = connect_once(&config).await?;
        Ok(Self {
            config,
            client: Mutex::new(client),
        })
    }

    /// Returns a guard over the live connection, reconnecting first if the
    /// prior connection was closed underneath us.
    pub async fn client(&self) -> Result<MutexGuard<'_, Client>> {
        let guard = self.client.lock().await;
        if !guard.is_closed() {
            return Ok(guard);
        }
        self.reconnect(guard).await
    }

    async fn reconnect<'a>(&'a self, mut guard: MutexGuard<'a, Client>) -> Result<MutexGuard<'a, Client>> {
        let mut delay = RECONNECT_BASE_DELAY;
        for attempt in 1..=RECONNECT_MAX_ATTEMPTS {
            match connect_once(&self.config).await {
                Ok(client) => {
                    *guard = client;
                    return Ok(guard);
                }
                Err(err) => {
                    warn!(attempt, %err, "catalog reconnect attempt failed");
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(RECONNECT_MAX_DELAY);
                }
            }
        }

        error!("catalog reconnect exhausted all attempts");
        Err(CatalogError::ReconnectFailed {
            attempts: RECONNECT_MAX_ATTEMPTS,
        })
    }
}

async fn connect_once(config: &CatalogConfig) -> Result<Client> {
    let connector = native_tls::TlsConnector::builder().build()?;
    let connector = postgres_native_tls::MakeTlsConnector::new(connector);
    let (client, connection) =
        tokio_postgres::connect(&config.connection_string(), connector).await?;

    tokio::spawn(async move {
        if let Err(err) = connection.await {
            error!(%err, "catalog connection closed");
        }
    });

    Ok(client)
}
