//! Payment method and gating step types.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// How the buyer pays for the keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PaymentMethod {
    /// Pay with the lock currency from the connected wallet.
    Crypto,
    /// Pay with a credit card. The card is chosen on its own step.
    Card {
        #[serde(default, rename = "cardId", skip_serializing_if = "Option::is_none")]
        card_id: Option<String>,
    },
    /// Free claim, sponsored by the lock manager.
    Claim,
}

impl PaymentMethod {
    pub fn card() -> Self {
        PaymentMethod::Card { card_id: None }
    }

    pub fn is_card(&self) -> bool {
        matches!(self, PaymentMethod::Card { .. })
    }
}

/// An optional step that must be passed before paying.
///
/// The declaration order is the order in which gates are visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gate {
    Password,
    Promo,
    Captcha,
    Guild,
    Gitcoin,
}

impl Gate {
    pub const ALL: [Gate; 5] = [
        Gate::Password,
        Gate::Promo,
        Gate::Captcha,
        Gate::Guild,
        Gate::Gitcoin,
    ];
}

impl Display for Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Gate::Password => "password",
            Gate::Promo => "promo",
            Gate::Captcha => "captcha",
            Gate::Guild => "guild",
            Gate::Gitcoin => "gitcoin",
        };
        write!(f, "{name}")
    }
}
