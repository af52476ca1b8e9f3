use std::{fmt::Display, str::FromStr};

use checkout_core::types::Gate;
use serde::{Deserialize, Serialize};

use crate::errors::Error;

/// Tag of every checkout state.
///
/// Declaration order is the canonical order of the purchase path, which is
/// what [`rank`](CheckoutStep::rank) exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckoutStep {
    Select,
    Quantity,
    Metadata,
    MessageToSign,
    Password,
    Promo,
    Captcha,
    Guild,
    Gitcoin,
    Payment,
    Card,
    Confirm,
    Minting,
    Returning,
    UnlockAccount,
}

impl CheckoutStep {
    pub const ALL: [CheckoutStep; 15] = [
        CheckoutStep::Select,
        CheckoutStep::Quantity,
        CheckoutStep::Metadata,
        CheckoutStep::MessageToSign,
        CheckoutStep::Password,
        CheckoutStep::Promo,
        CheckoutStep::Captcha,
        CheckoutStep::Guild,
        CheckoutStep::Gitcoin,
        CheckoutStep::Payment,
        CheckoutStep::Card,
        CheckoutStep::Confirm,
        CheckoutStep::Minting,
        CheckoutStep::Returning,
        CheckoutStep::UnlockAccount,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CheckoutStep::Select => "SELECT",
            CheckoutStep::Quantity => "QUANTITY",
            CheckoutStep::Metadata => "METADATA",
            CheckoutStep::MessageToSign => "MESSAGE_TO_SIGN",
            CheckoutStep::Password => "PASSWORD",
            CheckoutStep::Promo => "PROMO",
            CheckoutStep::Captcha => "CAPTCHA",
            CheckoutStep::Guild => "GUILD",
            CheckoutStep::Gitcoin => "GITCOIN",
            CheckoutStep::Payment => "PAYMENT",
            CheckoutStep::Card => "CARD",
            CheckoutStep::Confirm => "CONFIRM",
            CheckoutStep::Minting => "MINTING",
            CheckoutStep::Returning => "RETURNING",
            CheckoutStep::UnlockAccount => "UNLOCK_ACCOUNT",
        }
    }

    pub fn rank(&self) -> usize {
        *self as usize
    }

    pub fn gate(gate: Gate) -> CheckoutStep {
        match gate {
            Gate::Password => CheckoutStep::Password,
            Gate::Promo => CheckoutStep::Promo,
            Gate::Captcha => CheckoutStep::Captcha,
            Gate::Guild => CheckoutStep::Guild,
            Gate::Gitcoin => CheckoutStep::Gitcoin,
        }
    }

    pub fn as_gate(&self) -> Option<Gate> {
        match self {
            CheckoutStep::Password => Some(Gate::Password),
            CheckoutStep::Promo => Some(Gate::Promo),
            CheckoutStep::Captcha => Some(Gate::Captcha),
            CheckoutStep::Guild => Some(Gate::Guild),
            CheckoutStep::Gitcoin => Some(Gate::Gitcoin),
            _ => None,
        }
    }

    /// Steps that can only be shown to a known account.
    pub fn requires_account(&self) -> bool {
        !matches!(
            self,
            CheckoutStep::Select
                | CheckoutStep::Quantity
                | CheckoutStep::Metadata
                | CheckoutStep::UnlockAccount
        )
    }
}

impl Display for CheckoutStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for CheckoutStep {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CheckoutStep::ALL
            .into_iter()
            .find(|step| step.name() == s)
            .ok_or_else(|| Error::UnknownState(s.to_string()))
    }
}
