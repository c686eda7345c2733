use lb_bootstrap_types::ContractName;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("corrupt registry for network '{network}' at {path}: {reason}")]
    CorruptRegistry {
        network: String,
        path: String,
        reason: String,
    },

    #[error("registry for network '{network}' has no {name} entry; run the deployment first")]
    MissingEntry { network: String, name: ContractName },

    #[error("registry storage error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(String),
}
