//! Outcome of a minting attempt.

use serde::{Deserialize, Serialize};

/// Status of a mint, serialized as `PROCESSING`, `FINISHED` or `ERROR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MintStatus {
    Processing,
    Finished,
    Error,
}

/// Tagged record of a mint attempt.
///
/// ```
/// use checkout_core::types::{MintState, MintStatus};
///
/// let mint: MintState = serde_json::from_value(serde_json::json!({
///     "status": "PROCESSING",
///     "transactionHash": "0xabc",
/// })).unwrap();
///
/// assert_eq!(mint.status, MintStatus::Processing);
/// assert_eq!(mint.transaction_hash.as_deref(), Some("0xabc"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintState {
    pub status: MintStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<String>,
}

impl MintState {
    pub fn processing() -> Self {
        Self {
            status: MintStatus::Processing,
            transaction_hash: None,
        }
    }

    pub fn submitted(transaction_hash: impl Into<String>) -> Self {
        Self {
            status: MintStatus::Processing,
            transaction_hash: Some(transaction_hash.into()),
        }
    }

    pub fn finished(transaction_hash: Option<String>) -> Self {
        Self {
            status: MintStatus::Finished,
            transaction_hash,
        }
    }

    pub fn error(transaction_hash: Option<String>) -> Self {
        Self {
            status: MintStatus::Error,
            transaction_hash,
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == MintStatus::Error
    }

    pub fn is_finished(&self) -> bool {
        self.status == MintStatus::Finished
    }
}
