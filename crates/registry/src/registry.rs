use lb_bootstrap_types::{Address, ContractName, Network};
use std::collections::BTreeMap;
use std::future::Future;
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::RegistryError;

/// Outcome of resolving a registry entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Address was already recorded, nothing was provisioned
    Reused(Address),
    /// Provisioning ran and its address was recorded
    Provisioned(Address),
}

impl Resolution {
    pub fn address(&self) -> Address {
        match self {
            Resolution::Reused(address) | Resolution::Provisioned(address) => *address,
        }
    }

    pub fn was_provisioned(&self) -> bool {
        matches!(self, Resolution::Provisioned(_))
    }
}

/// Contract name to address mapping for one network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressRegistry {
    network: Network,
    /// Keyed by registry name; keys this tool does not manage are kept untouched
    entries: BTreeMap<String, Address>,
}

impl AddressRegistry {
    pub fn empty(network: Network) -> Self {
        Self {
            network,
            entries: BTreeMap::new(),
        }
    }

    pub fn from_entries(
        network: Network,
        entries: impl IntoIterator<Item = (String, Address)>,
    ) -> Self {
        Self {
            network,
            entries: entries.into_iter().collect(),
        }
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn get(&self, name: ContractName) -> Option<Address> {
        self.entries.get(name.as_str()).copied()
    }

    pub fn contains(&self, name: ContractName) -> bool {
        self.entries.contains_key(name.as_str())
    }

    /// Address of an entry an earlier step or run must have produced
    pub fn require(&self, name: ContractName) -> Result<Address, RegistryError> {
        self.get(name).ok_or_else(|| RegistryError::MissingEntry {
            network: self.network.name.clone(),
            name,
        })
    }

    /// Return the recorded address, or run `provision` and record its result.
    ///
    /// `provision` is never invoked when the entry already exists. A failed
    /// provisioning leaves the registry unchanged.
    pub async fn resolve<F, Fut, E>(&mut self, name: ContractName, provision: F) -> Result<Resolution, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Address, E>>,
    {
        if let Some(address) = self.get(name) {
            debug!(network = %self.network, contract = %name, address = %address, "Reusing recorded address");
            return Ok(Resolution::Reused(address));
        }

        let address = provision().await?;
        self.entries.insert(name.as_str().to_string(), address);

        info!(network = %self.network, contract = %name, address = %address, "Recorded new address");
        Ok(Resolution::Provisioned(address))
    }

    /// Explicitly forget an entry so the next resolve provisions it again
    pub fn reset(&mut self, name: ContractName) -> Option<Address> {
        let previous = self.entries.remove(name.as_str());
        if let Some(address) = previous {
            warn!(network = %self.network, contract = %name, previous = %address, "Registry entry reset");
        }
        previous
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Address)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Serialize to the on-disk document shape `{name: address}`
    pub fn to_json(&self) -> Result<String, RegistryError> {
        let document: BTreeMap<&str, String> = self
            .entries
            .iter()
            .map(|(name, address)| (name.as_str(), address.to_checksum(None)))
            .collect();

        serde_json::to_string_pretty(&document)
            .map_err(|e| RegistryError::Serialization(e.to_string()))
    }

    /// Parse a stored document; any malformed content is a corrupt registry
    pub fn from_json(network: Network, path: &str, contents: &str) -> Result<Self, RegistryError> {
        let corrupt = |reason: String| RegistryError::CorruptRegistry {
            network: network.name.clone(),
            path: path.to_string(),
            reason,
        };

        let document: BTreeMap<String, String> =
            serde_json::from_str(contents).map_err(|e| corrupt(e.to_string()))?;

        let mut entries = BTreeMap::new();
        for (name, value) in document {
            let address = Address::from_str(value.trim())
                .map_err(|e| corrupt(format!("entry '{name}' is not an address: {e}")))?;
            entries.insert(name, address);
        }

        Ok(Self { network, entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn addr(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    #[tokio::test]
    async fn test_resolve_provisions_once() {
        let mut registry = AddressRegistry::empty(Network::new("local_geth"));
        let calls = AtomicUsize::new(0);

        let first = registry
            .resolve(ContractName::WIota, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, RegistryError>(addr(0x11))
            })
            .await
            .unwrap();

        let second = registry
            .resolve(ContractName::WIota, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, RegistryError>(addr(0x22))
            })
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first, Resolution::Provisioned(addr(0x11)));
        assert_eq!(second, Resolution::Reused(addr(0x11)));
    }

    #[tokio::test]
    async fn test_failed_provision_leaves_registry_unchanged() {
        let mut registry = AddressRegistry::empty(Network::new("local_geth"));

        let result = registry
            .resolve(ContractName::MockErc20, || async {
                Err::<Address, _>("deploy reverted")
            })
            .await;

        assert_eq!(result, Err("deploy reverted"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_require_missing_entry() {
        let registry = AddressRegistry::empty(Network::new("iota_evm_testnet"));
        let err = registry.require(ContractName::LbRouter).unwrap_err();
        assert!(matches!(
            err,
            RegistryError::MissingEntry { name: ContractName::LbRouter, .. }
        ));
    }

    #[tokio::test]
    async fn test_reset_allows_reprovision() {
        let mut registry = AddressRegistry::empty(Network::new("local_geth"));
        registry
            .resolve(ContractName::LbFactory, || async { Ok::<_, RegistryError>(addr(1)) })
            .await
            .unwrap();

        assert_eq!(registry.reset(ContractName::LbFactory), Some(addr(1)));
        assert_eq!(registry.reset(ContractName::LbFactory), None);

        let resolved = registry
            .resolve(ContractName::LbFactory, || async { Ok::<_, RegistryError>(addr(2)) })
            .await
            .unwrap();
        assert_eq!(resolved, Resolution::Provisioned(addr(2)));
    }

    #[test]
    fn test_json_document_shape() {
        let network = Network::new("local_geth");
        let contents = r#"{
  "wIOTA": "0x1111111111111111111111111111111111111111",
  "Custom": "0x2222222222222222222222222222222222222222"
}"#;

        let registry = AddressRegistry::from_json(network.clone(), "mem", contents).unwrap();
        assert_eq!(registry.get(ContractName::WIota), Some(addr(0x11)));
        assert_eq!(registry.len(), 2);

        let written = registry.to_json().unwrap();
        let reparsed = AddressRegistry::from_json(network, "mem", &written).unwrap();
        assert_eq!(reparsed, registry);
        assert!(written.contains("\"Custom\""));
    }

    #[test]
    fn test_corrupt_documents() {
        let network = Network::new("local_geth");
        for contents in ["", "[]", "{\"wIOTA\": 5}", "{\"wIOTA\": \"0xnothex\"}", "{"] {
            let err = AddressRegistry::from_json(network.clone(), "mem", contents).unwrap_err();
            assert!(
                matches!(err, RegistryError::CorruptRegistry { .. }),
                "expected corrupt registry for {contents:?}"
            );
        }
    }
}
