pub mod local;
pub mod provider;
pub mod signer;

pub use local::*;
pub use provider::*;

use std::sync::Arc;

use crate::config::Config;

/// Build the configured blob store
pub fn from_config(config: &Config) -> Arc<dyn StorageProvider> {
    Arc::new(LocalStorage::new(config.storage.local_path.clone()))
}
