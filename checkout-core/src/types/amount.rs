//! [`KeyPrice`] represents the price of a single membership key.
//!
//! This module holds its type definition and implementations.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Price of one key in the smallest unit of the lock currency.
///
/// Uses a `u128` internally to support large values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct KeyPrice(pub u128);

impl KeyPrice {
    /// Price of `quantity` keys, or `None` on overflow.
    pub fn checked_total(self, quantity: u32) -> Option<KeyPrice> {
        self.0.checked_mul(quantity as u128).map(KeyPrice)
    }

    pub fn is_free(&self) -> bool {
        self.0 == 0
    }
}

impl From<u32> for KeyPrice {
    fn from(value: u32) -> Self {
        KeyPrice(value as u128)
    }
}

impl From<u64> for KeyPrice {
    fn from(value: u64) -> Self {
        KeyPrice(value as u128)
    }
}

impl From<u128> for KeyPrice {
    fn from(value: u128) -> Self {
        KeyPrice(value)
    }
}

impl Display for KeyPrice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for KeyPrice {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for KeyPrice {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let value = s.parse::<u128>().map_err(serde::de::Error::custom)?;
        Ok(KeyPrice(value))
    }
}
