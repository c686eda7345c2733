use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("{method} rejected: {reason}")]
    Rejected { method: String, reason: String },

    #[error("transaction {tx_hash} reverted: {reason}")]
    Reverted { tx_hash: String, reason: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("transaction {tx_hash} not confirmed after {waited_secs}s")]
    ConfirmationTimeout { tx_hash: String, waited_secs: u64 },
}

impl ClientError {
    /// Human readable reason, without the variant prefix
    pub fn reason(&self) -> String {
        match self {
            ClientError::Rejected { reason, .. } | ClientError::Reverted { reason, .. } => {
                reason.clone()
            }
            other => other.to_string(),
        }
    }

    /// True when the remote side refused or reverted the call
    pub fn is_remote_failure(&self) -> bool {
        matches!(self, ClientError::Rejected { .. } | ClientError::Reverted { .. })
    }
}
