//! Miscellaneous common types used throughout the checkout codebase.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Represents a key-value pair map. The key is a `String`.
pub type Record<V> = std::collections::BTreeMap<String, V>;

/// Represents any JSON value. Used for serializing/deserializing arbitrary JSON data.
pub type AnyJson = serde_json::Value;

/// An account that proved ownership through the unlock-account flow.
///
/// ```
/// use checkout_core::types::AccountIdentity;
///
/// let account: AccountIdentity = serde_json::from_value(serde_json::json!({
///     "address": "0xF5C28ce24Acf47849988f147d5C75787c0103534",
///     "email": "julien@unlock-protocol.com",
/// })).unwrap();
///
/// assert_eq!(account.email.as_deref(), Some("julien@unlock-protocol.com"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountIdentity {
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl AccountIdentity {
    pub fn wallet(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            email: None,
        }
    }

    /// Addresses are compared case-insensitively.
    pub fn same_address(&self, other: &AccountIdentity) -> bool {
        self.address.eq_ignore_ascii_case(&other.address)
    }
}

impl Display for AccountIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.email {
            Some(email) => write!(f, "{} <{}>", self.address, email),
            None => write!(f, "{}", self.address),
        }
    }
}

/// A message signed by the buyer when the paywall asks for one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedMessage {
    pub address: String,
    pub signature: String,
}
