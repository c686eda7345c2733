use lb_bootstrap_registry::{AddressRegistry, JsonFileStore, RegistryError, RegistryStore};
use lb_bootstrap_types::{Address, ContractName, Network};
use tempfile::TempDir;

async fn record(registry: &mut AddressRegistry, name: ContractName, byte: u8) {
    registry
        .resolve(name, || async move {
            Ok::<_, RegistryError>(Address::repeat_byte(byte))
        })
        .await
        .unwrap();
}

fn file_count(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

#[tokio::test]
async fn test_file_store_roundtrip() {
    let tmp = TempDir::new().unwrap();
    let store = JsonFileStore::new(tmp.path().join("deployments"));
    let network = Network::new("local_geth");

    let mut registry = store.load(&network).await.unwrap();
    assert!(registry.is_empty());

    record(&mut registry, ContractName::WIota, 0x01).await;
    record(&mut registry, ContractName::LbFactory, 0x02).await;
    store.persist(&registry).await.unwrap();

    let path = store.path_for(&network);
    assert!(path.ends_with("deployments/local_geth.json"));

    let loaded = store.load(&network).await.unwrap();
    assert_eq!(loaded, registry);

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert!(raw.get("wIOTA").is_some());
    assert!(raw.get("LBFactory").is_some());
}

#[tokio::test]
async fn test_unknown_keys_survive_a_run() {
    let tmp = TempDir::new().unwrap();
    let store = JsonFileStore::new(tmp.path());
    let network = Network::new("shimmer_evm_testnet");

    std::fs::write(
        store.path_for(&network),
        r#"{"Multicall": "0x3333333333333333333333333333333333333333"}"#,
    )
    .unwrap();

    let mut registry = store.load(&network).await.unwrap();
    record(&mut registry, ContractName::MockErc20, 0x04).await;
    store.persist(&registry).await.unwrap();

    let loaded = store.load(&network).await.unwrap();
    assert_eq!(loaded.len(), 2);
    assert!(loaded.names().any(|name| name == "Multicall"));
}

#[tokio::test]
async fn test_ephemeral_network_never_touches_disk() {
    let tmp = TempDir::new().unwrap();
    let store = JsonFileStore::new(tmp.path());
    let network = Network::new("hardhat");
    assert!(network.ephemeral);

    let mut registry = store.load(&network).await.unwrap();
    record(&mut registry, ContractName::WIota, 0x01).await;
    store.persist(&registry).await.unwrap();

    assert_eq!(file_count(tmp.path()), 0);
    assert!(store.load(&network).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_corrupt_file_is_reported() {
    let tmp = TempDir::new().unwrap();
    let store = JsonFileStore::new(tmp.path());
    let network = Network::new("local_wasp");

    std::fs::write(store.path_for(&network), "{ not json").unwrap();

    let err = store.load(&network).await.unwrap_err();
    match err {
        RegistryError::CorruptRegistry { network, path, .. } => {
            assert_eq!(network, "local_wasp");
            assert!(path.ends_with("local_wasp.json"));
        }
        other => panic!("expected corrupt registry, got {other:?}"),
    }
}

#[tokio::test]
async fn test_failed_persist_leaves_no_partial_file() {
    let tmp = TempDir::new().unwrap();
    let store = JsonFileStore::new(tmp.path());
    let network = Network::new("local_geth");

    // A directory in place of the document makes the final rename fail
    std::fs::create_dir(store.path_for(&network)).unwrap();

    let mut registry = AddressRegistry::empty(network.clone());
    record(&mut registry, ContractName::LbRouter, 0x05).await;

    let err = store.persist(&registry).await.unwrap_err();
    assert!(matches!(err, RegistryError::Io { .. }));

    // Only the blocking directory remains; the temporary file was cleaned up
    assert_eq!(file_count(tmp.path()), 1);
    assert!(store.path_for(&network).is_dir());
}

#[tokio::test]
async fn test_overwrite_replaces_whole_document() {
    let tmp = TempDir::new().unwrap();
    let store = JsonFileStore::new(tmp.path());
    let network = Network::new("iota_evm_testnet");

    let mut registry = AddressRegistry::empty(network.clone());
    record(&mut registry, ContractName::LbFactory, 0x0a).await;
    store.persist(&registry).await.unwrap();

    registry.reset(ContractName::LbFactory);
    record(&mut registry, ContractName::LbFactory, 0x0b).await;
    store.persist(&registry).await.unwrap();

    let loaded = store.load(&network).await.unwrap();
    assert_eq!(
        loaded.get(ContractName::LbFactory),
        Some(Address::repeat_byte(0x0b))
    );
    assert_eq!(file_count(tmp.path()), 1);
}
