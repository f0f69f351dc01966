//! Shared helper for integration tests that need a real catalog database.

use catalog::{CatalogConfig, CatalogStore};
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::postgres::Postgres;

#[allow(dead_code)]
pub struct TestCatalog {
    pub store: CatalogStore,
    _container: ContainerAsync<Postgres>,
}

#[allow(dead_code)]
impl TestCatalog {
    /// Starts a fresh Postgres container and connects a `CatalogStore` to
    /// it, running `schema::ensure_schema` the same way `connect` does for
    /// the real deployment.
    pub async fn new() -> Self {
        let container = Postgres::default().start().await.expect("failed to start postgres container");
        let port = container.get_host_port_ipv4(5432).await.expect("failed to map postgres port");

        let config = CatalogConfig {
            host: "127.0.0.1".to_string(),
            port,
            user: "postgres".to_string(),
            password: "postgres".to_string(),
            database: "postgres".to_string(),
        };
        let store = CatalogStore::connect(config).await.expect("failed to connect catalog store");

        Self { store, _container: container }
    }
}
