use async_trait::async_trait;
use lb_bootstrap_types::{Address, Network};
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::{AddressRegistry, RegistryError};

// ═══════════════════════════════════════════════════════════════════════════
// STORE TRAIT
// ═══════════════════════════════════════════════════════════════════════════

/// Durable storage for address registries, one document per network
#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// Load the registry of `network`; an absent document yields an empty registry.
    /// Ephemeral networks never touch storage.
    async fn load(&self, network: &Network) -> Result<AddressRegistry, RegistryError>;

    /// Replace the stored document with the full registry.
    /// On failure the previously stored document stays intact. No-op for ephemeral networks.
    async fn persist(&self, registry: &AddressRegistry) -> Result<(), RegistryError>;
}

// ═══════════════════════════════════════════════════════════════════════════
// JSON FILE STORE
// ═══════════════════════════════════════════════════════════════════════════

/// Stores `<dir>/<network>.json` documents
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, network: &Network) -> PathBuf {
        self.dir.join(format!("{}.json", network.name))
    }
}

#[async_trait]
impl RegistryStore for JsonFileStore {
    async fn load(&self, network: &Network) -> Result<AddressRegistry, RegistryError> {
        if network.ephemeral {
            debug!(network = %network, "Ephemeral network, starting with an empty registry");
            return Ok(AddressRegistry::empty(network.clone()));
        }

        let path = self.path_for(network);
        let path_display = path.display().to_string();

        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(network = %network, path = %path_display, "No prior deployment recorded");
                return Ok(AddressRegistry::empty(network.clone()));
            }
            Err(source) => {
                return Err(RegistryError::Io {
                    path: path_display,
                    source,
                })
            }
        };

        let registry = AddressRegistry::from_json(network.clone(), &path_display, &contents)?;
        info!(
            network = %network,
            path = %path_display,
            entries = registry.len(),
            "Loaded deployment registry"
        );
        Ok(registry)
    }

    async fn persist(&self, registry: &AddressRegistry) -> Result<(), RegistryError> {
        let network = registry.network();
        if network.ephemeral {
            debug!(network = %network, "Ephemeral network, skipping registry persistence");
            return Ok(());
        }

        let contents = registry.to_json()?;
        let dir = self.dir.clone();
        let path = self.path_for(network);
        let path_display = path.display().to_string();

        tokio::task::spawn_blocking(move || write_atomically(&dir, &path, contents.as_bytes()))
            .await
            .map_err(|e| RegistryError::Io {
                path: path_display.clone(),
                source: std::io::Error::other(e.to_string()),
            })??;

        debug!(network = %network, path = %path_display, entries = registry.len(), "Registry persisted");
        Ok(())
    }
}

/// Write to a sibling temporary file, sync it, then rename over the target
fn write_atomically(dir: &Path, path: &Path, contents: &[u8]) -> Result<(), RegistryError> {
    let io_err = |source: std::io::Error| RegistryError::Io {
        path: path.display().to_string(),
        source,
    };

    std::fs::create_dir_all(dir).map_err(io_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(contents).map_err(io_err)?;
    tmp.write_all(b"\n").map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;

    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════
// IN-MEMORY STORE (for testing)
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: Mutex<HashMap<String, BTreeMap<String, Address>>>,
    writes: AtomicUsize,
    fail_persist: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a stored document, as if a previous run had persisted it
    pub async fn seed(&self, registry: &AddressRegistry) {
        let entries = registry.iter().map(|(k, v)| (k.to_string(), v)).collect();
        self.documents
            .lock()
            .await
            .insert(registry.network().name.clone(), entries);
    }

    /// Stored entries for a network, if a document exists
    pub async fn document(&self, network: &str) -> Option<BTreeMap<String, Address>> {
        self.documents.lock().await.get(network).cloned()
    }

    /// Number of successful persist calls that reached storage
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make subsequent persists fail (to exercise abort paths)
    pub fn set_fail_persist(&self, fail: bool) {
        self.fail_persist.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl RegistryStore for MemoryStore {
    async fn load(&self, network: &Network) -> Result<AddressRegistry, RegistryError> {
        if network.ephemeral {
            return Ok(AddressRegistry::empty(network.clone()));
        }

        let documents = self.documents.lock().await;
        let entries = documents.get(&network.name).cloned().unwrap_or_default();
        let registry = AddressRegistry::from_entries(network.clone(), entries);
        Ok(registry)
    }

    async fn persist(&self, registry: &AddressRegistry) -> Result<(), RegistryError> {
        if registry.network().ephemeral {
            return Ok(());
        }

        if self.fail_persist.load(Ordering::SeqCst) {
            return Err(RegistryError::Io {
                path: "memory".to_string(),
                source: std::io::Error::other("simulated storage failure"),
            });
        }

        let entries = registry.iter().map(|(k, v)| (k.to_string(), v)).collect();
        self.documents
            .lock()
            .await
            .insert(registry.network().name.clone(), entries);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lb_bootstrap_types::ContractName;

    async fn populated(network: Network) -> AddressRegistry {
        let mut registry = AddressRegistry::empty(network);
        for (i, name) in ContractName::ALL.into_iter().enumerate() {
            registry
                .resolve(name, || async move {
                    Ok::<_, RegistryError>(Address::repeat_byte(i as u8 + 1))
                })
                .await
                .unwrap();
        }
        registry
    }

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        let network = Network::new("local_geth");
        let registry = populated(network.clone()).await;

        store.persist(&registry).await.unwrap();
        let loaded = store.load(&network).await.unwrap();

        assert_eq!(loaded, registry);
        assert_eq!(store.writes(), 1);
    }

    #[tokio::test]
    async fn test_memory_store_ephemeral_never_written() {
        let store = MemoryStore::new();
        let registry = populated(Network::new("hardhat")).await;

        store.persist(&registry).await.unwrap();

        assert_eq!(store.writes(), 0);
        assert!(store.document("hardhat").await.is_none());
        assert!(store.load(&Network::new("hardhat")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_store_failure_keeps_previous_document() {
        let store = MemoryStore::new();
        let network = Network::new("local_geth");
        let mut registry = AddressRegistry::empty(network.clone());
        registry
            .resolve(ContractName::WIota, || async {
                Ok::<_, RegistryError>(Address::repeat_byte(9))
            })
            .await
            .unwrap();
        store.persist(&registry).await.unwrap();

        store.set_fail_persist(true);
        let updated = populated(network.clone()).await;
        assert!(store.persist(&updated).await.is_err());

        let loaded = store.load(&network).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.get(ContractName::WIota), Some(Address::repeat_byte(9)));
    }
}
