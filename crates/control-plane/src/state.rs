//! Shared application state: the catalog handle, the registry of live
//! mirror workflows, and process configuration. Each HTTP handler resolves
//! a mirror name against the registry to find its `MirrorHandle` (for
//! signals) and falls back to the catalog alone for pure reads.

use crate::auth::TokenVerifier;
use crate::config::Config;
use crate::error::{ApiError, ApiResult};
use catalog::CatalogStore;
use engine_runtime::mirror::{MirrorHandle, MirrorSupervisor};
use model::core::identifiers::MirrorName;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Running mirrors, keyed by name. Dropping a `MirrorSupervisor` does not
/// stop its spawned task (`tokio::spawn` detaches on drop), so entries are
/// removed here only once `Terminate` has actually been delivered.
#[derive(Clone, Default)]
pub struct MirrorRegistry {
    inner: Arc<RwLock<HashMap<MirrorName, (MirrorHandle, Option<MirrorSupervisor>)>>>,
}

impl MirrorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, name: MirrorName, handle: MirrorHandle, supervisor: MirrorSupervisor) {
        self.inner.write().await.insert(name, (handle, Some(supervisor)));
    }

    pub async fn get(&self, name: &MirrorName) -> ApiResult<MirrorHandle> {
        self.inner
            .read()
            .await
            .get(name)
            .map(|(handle, _)| handle.clone())
            .ok_or_else(|| ApiError::MirrorNotRunning(name.to_string()))
    }

    pub async fn remove(&self, name: &MirrorName) {
        self.inner.write().await.remove(name);
    }

    pub async fn is_running(&self, name: &MirrorName) -> bool {
        self.inner.read().await.contains_key(name)
    }
}

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<CatalogStore>,
    pub registry: MirrorRegistry,
    pub config: Arc<Config>,
    pub verifier: Arc<dyn TokenVerifier>,
}
