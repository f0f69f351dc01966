use crate::error::{ConnectorError, Result};
use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;
use tokio_postgres::{Client, Config, NoTls, config::{ReplicationMode, SslMode}};
use tracing::{error, warn};

/// Connects to Postgres honoring the sslmode encoded in the connection
/// string, falling back to plaintext for `prefer` when the handshake fails.
pub async fn connect(conninfo: &str) -> Result<Client> {
    let config = parse_config(conninfo)?;
    connect_with_config(config).await
}

/// Connects in logical-replication mode: the only statements the server
/// will accept on this socket are `IDENTIFY_SYSTEM`, `CREATE_REPLICATION_SLOT`,
/// `START_REPLICATION` and friends.
pub async fn connect_replication(conninfo: &str) -> Result<Client> {
    let mut config = parse_config(conninfo)?;
    config.replication_mode(ReplicationMode::Logical);
    connect_with_config(config).await
}

fn parse_config(conninfo: &str) -> Result<Config> {
    conninfo
        .parse::<Config>()
        .map_err(|e| ConnectorError::InvalidUrl(e.to_string()))
}

async fn connect_with_config(config: Config) -> Result<Client> {
    match config.get_ssl_mode() {
        SslMode::Disable => connect_plain(config).await,
        SslMode::Prefer => match connect_tls(config.clone()).await {
            Ok(client) => Ok(client),
            Err(error) => {
                warn!(%error, "TLS handshake failed, retrying without TLS");
                connect_plain(config).await
            }
        },
        _ => connect_tls(config).await,
    }
}

async fn connect_tls(config: Config) -> Result<Client> {
    let connector = TlsConnector::builder().build()?;
    let tls = MakeTlsConnector::new(connector);
    let (client, connection) = config.connect(tls).await?;
    tokio::spawn(async move {
        if let Err(err) = connection.await {
            error!(%err, "postgres connection closed");
        }
    });
    Ok(client)
}

async fn connect_plain(config: Config) -> Result<Client> {
    let (client, connection) = config.connect(NoTls).await?;
    tokio::spawn(async move {
        if let Err(err) = connection.await {
            error!(%err, "postgres connection closed");
        }
    });
    Ok(client)
}
