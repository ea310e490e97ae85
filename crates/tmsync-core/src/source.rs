// ── Current-state boundary ──
//
// The differ never talks to a device. Whatever fetches the running
// configuration implements `CurrentSource`; a tenant the device has never
// seen is `Ok(None)`, which callers treat as an empty tree.

use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use crate::error::CoreError;
use crate::model::{CommonState, ConfigTree};

/// Supplier of a tenant's running configuration.
pub trait CurrentSource {
    fn fetch(&self, tenant: &str) -> impl Future<Output = Result<Option<ConfigTree>, CoreError>> + Send;
}

/// Fetch a tenant, treating "not found" as an empty tree.
pub async fn fetch_current<S: CurrentSource + Sync>(source: &S, tenant: &str) -> Result<ConfigTree, CoreError> {
    let tree = source.fetch(tenant).await?;
    if tree.is_none() {
        debug!(tenant, "no current state, starting from an empty tree");
    }
    Ok(tree.unwrap_or_default())
}

/// Reads `<dir>/<tenant>.json` snapshots.
#[derive(Debug, Clone)]
pub struct FileSource {
    dir: PathBuf,
}

impl FileSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, tenant: &str) -> PathBuf {
        self.dir.join(format!("{tenant}.json"))
    }
}

impl CurrentSource for FileSource {
    #[instrument(skip(self), fields(dir = %self.dir.display()))]
    async fn fetch(&self, tenant: &str) -> Result<Option<ConfigTree>, CoreError> {
        let path = self.path_for(tenant);
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => serde_json::from_str(&text).map(Some).map_err(|e| CoreError::Source {
                tenant: tenant.to_owned(),
                message: format!("{}: {e}", path.display()),
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CoreError::Source {
                tenant: tenant.to_owned(),
                message: format!("{}: {e}", path.display()),
            }),
        }
    }
}

/// Read a config tree from a JSON file.
pub async fn load_tree(path: &Path) -> Result<ConfigTree, CoreError> {
    let text = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&text)?)
}

/// Load persisted shared-object state; a missing file is an empty state.
pub async fn load_common_state(path: &Path) -> Result<CommonState, CoreError> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => Ok(serde_json::from_str(&text)?),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(CommonState::new()),
        Err(e) => Err(e.into()),
    }
}

pub async fn save_common_state(path: &Path, state: &CommonState) -> Result<(), CoreError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let text = serde_json::to_string_pretty(state)?;
    tokio::fs::write(path, text).await?;
    Ok(())
}
