//! Paywall configuration supplied by the embedding site.
//!
//! A [`PaywallConfig`] describes the locks offered for sale and which optional
//! steps the buyer goes through. Most settings can be given at the top level and
//! overridden per lock; [`PaywallConfig::resolve`] folds both levels into the
//! [`LockSettings`] the checkout flow navigates with.

use bon::Builder;
use serde::{Deserialize, Deserializer, Serialize};
use url::Url;

use crate::{
    errors::{Error, Result},
    types::{AnyJson, Gate, KeyPrice, Record},
};

/// A field collected from each recipient on the metadata step.
#[derive(Builder, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataInput {
    #[builder(into)]
    pub name: String,

    #[serde(rename = "type", default = "MetadataInput::default_type")]
    #[builder(into, default = MetadataInput::default_type())]
    pub input_type: String,

    #[serde(default)]
    #[builder(default)]
    pub required: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(into)]
    pub default_value: Option<String>,
}

impl MetadataInput {
    fn default_type() -> String {
        "text".to_string()
    }
}

/// Configuration of a single lock offered by the paywall.
///
/// Every optional setting overrides the matching top-level one of
/// [`PaywallConfig`].
#[derive(Builder, Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(into)]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(into)]
    pub key_price: Option<KeyPrice>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(into)]
    pub currency: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_recipient: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_recipients: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_recipients: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_inputs: Option<Vec<MetadataInput>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promo: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captcha: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gitcoin: Option<bool>,
}

impl LockConfig {
    fn gate_flag(&self, gate: Gate) -> Option<bool> {
        match gate {
            Gate::Password => self.password,
            Gate::Promo => self.promo,
            Gate::Captcha => self.captcha,
            Gate::Guild => self.guild,
            Gate::Gitcoin => self.gitcoin,
        }
    }
}

/// Configuration of a checkout session.
///
/// ```
/// use checkout_core::config::PaywallConfig;
///
/// let config = PaywallConfig::from_value(serde_json::json!({
///     "title": "Members only",
///     "persistentCheckout": true,
///     "locks": {
///         "0xCE0...": { "network": 137, "maxRecipients": 3 }
///     }
/// })).unwrap();
///
/// let settings = config.resolve("0xce0...").unwrap();
/// assert_eq!(settings.max_recipients, 3);
/// assert!(!settings.skip_quantity);
/// ```
#[derive(Builder, Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaywallConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(into)]
    pub title: Option<String>,

    #[serde(
        default,
        deserialize_with = "lenient_url",
        skip_serializing_if = "Option::is_none"
    )]
    pub icon: Option<Url>,

    /// Removes the close button from the checkout.
    #[serde(default)]
    #[builder(default)]
    pub persistent_checkout: bool,

    /// Message the buyer must sign before purchasing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(into)]
    pub message_to_sign: Option<String>,

    #[serde(
        default,
        deserialize_with = "lenient_url",
        skip_serializing_if = "Option::is_none"
    )]
    pub redirect_uri: Option<Url>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_recipient: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_recipients: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_recipients: Option<u32>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[builder(default)]
    pub metadata_inputs: Vec<MetadataInput>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promo: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captcha: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gitcoin: Option<bool>,

    /// Locks offered, keyed by lock address.
    #[serde(default)]
    #[builder(default)]
    pub locks: Record<LockConfig>,
}

/// Settings of a lock after folding lock-level overrides into the top level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockSettings {
    pub min_recipients: u32,
    pub max_recipients: u32,
    pub skip_quantity: bool,
    pub skip_recipient: bool,
    pub gates: Vec<Gate>,
    pub metadata_inputs: Vec<MetadataInput>,
    pub key_price: Option<KeyPrice>,
}

impl PaywallConfig {
    /// Parse and normalize a configuration.
    pub fn from_value(value: AnyJson) -> Result<Self> {
        let config: PaywallConfig = serde_json::from_value(value)?;
        if config.locks.is_empty() {
            return Err(Error::NoLocks);
        }
        Ok(config.normalized())
    }

    /// Parse a configuration, falling back to the default one when it is malformed.
    pub fn from_value_or_default(value: AnyJson) -> Self {
        Self::from_value(value)
            .inspect_err(|err| {
                #[cfg(feature = "tracing")]
                tracing::warn!("Invalid paywall config: {err}; using defaults")
            })
            .unwrap_or_default()
    }

    /// Repair inconsistent recipient bounds instead of rejecting them.
    pub fn normalized(mut self) -> Self {
        (self.min_recipients, self.max_recipients) =
            normalize_bounds(self.min_recipients, self.max_recipients);
        for lock in self.locks.values_mut() {
            (lock.min_recipients, lock.max_recipients) =
                normalize_bounds(lock.min_recipients, lock.max_recipients);
        }
        self
    }

    /// Find a lock by address. Addresses compare case-insensitively.
    pub fn lock(&self, address: &str) -> Option<(&str, &LockConfig)> {
        self.locks
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(address))
            .map(|(key, lock)| (key.as_str(), lock))
    }

    pub fn has_lock(&self, address: &str) -> bool {
        self.lock(address).is_some()
    }

    /// Settings for a given lock, `None` if the lock is not offered.
    pub fn resolve(&self, address: &str) -> Option<LockSettings> {
        self.lock(address).map(|(_, lock)| self.settings_for(Some(lock)))
    }

    /// Settings when no lock has been chosen yet.
    pub fn defaults(&self) -> LockSettings {
        self.settings_for(None)
    }

    fn settings_for(&self, lock: Option<&LockConfig>) -> LockSettings {
        let max_recipients = lock
            .and_then(|l| l.max_recipients)
            .or(self.max_recipients)
            .unwrap_or(1)
            .max(1);
        let min_recipients = lock
            .and_then(|l| l.min_recipients)
            .or(self.min_recipients)
            .unwrap_or(1)
            .clamp(1, max_recipients);
        let metadata_inputs = lock
            .and_then(|l| l.metadata_inputs.clone())
            .unwrap_or_else(|| self.metadata_inputs.clone());
        let skip_recipient = lock
            .and_then(|l| l.skip_recipient)
            .or(self.skip_recipient)
            .unwrap_or(true)
            && metadata_inputs.is_empty();
        let gates = Gate::ALL
            .into_iter()
            .filter(|gate| {
                lock.and_then(|l| l.gate_flag(*gate))
                    .or(self.gate_flag(*gate))
                    .unwrap_or(false)
            })
            .collect();

        LockSettings {
            min_recipients,
            max_recipients,
            skip_quantity: max_recipients == 1,
            skip_recipient,
            gates,
            metadata_inputs,
            key_price: lock.and_then(|l| l.key_price),
        }
    }

    fn gate_flag(&self, gate: Gate) -> Option<bool> {
        match gate {
            Gate::Password => self.password,
            Gate::Promo => self.promo,
            Gate::Captcha => self.captcha,
            Gate::Guild => self.guild,
            Gate::Gitcoin => self.gitcoin,
        }
    }
}

impl TryFrom<AnyJson> for PaywallConfig {
    type Error = Error;

    fn try_from(value: AnyJson) -> Result<Self> {
        Self::from_value(value)
    }
}

fn normalize_bounds(min: Option<u32>, max: Option<u32>) -> (Option<u32>, Option<u32>) {
    let max = max.map(|m| m.max(1));
    let min = match (min, max) {
        (Some(min), Some(max)) => Some(min.clamp(1, max)),
        (Some(min), None) => Some(min.max(1)),
        (None, _) => None,
    };
    (min, max)
}

fn lenient_url<'de, D>(deserializer: D) -> std::result::Result<Option<Url>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| {
        Url::parse(&s)
            .inspect_err(|err| {
                #[cfg(feature = "tracing")]
                tracing::warn!("Ignoring invalid URL '{s}' in paywall config: {err}")
            })
            .ok()
    }))
}
