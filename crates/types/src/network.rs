use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of the in-process development network whose state never outlives a run
pub const EPHEMERAL_NETWORK: &str = "hardhat";

/// Target network of a provisioning run
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Network {
    pub name: String,
    /// Ephemeral networks never read or write durable storage
    pub ephemeral: bool,
}

impl Network {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let ephemeral = name == EPHEMERAL_NETWORK;
        Self { name, ephemeral }
    }

    pub fn persistent(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ephemeral: false,
        }
    }

    pub fn ephemeral(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ephemeral: true,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
