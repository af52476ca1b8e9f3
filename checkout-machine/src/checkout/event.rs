use checkout_core::{
    config::PaywallConfig,
    types::{AccountIdentity, Gate, MintState, PaymentMethod, Record, SignedMessage},
};

use crate::{
    machine::{ActorId, Ticket},
    services::MintRequest,
    unlock_account::{UnlockAccountEffect, UnlockAccountEvent},
};

/// Events accepted by [`CheckoutMachine`](super::CheckoutMachine).
#[derive(Debug, Clone, PartialEq)]
pub enum CheckoutEvent {
    SelectLock {
        lock: String,
        /// The account already holds a valid key on this lock.
        existing_member: bool,
    },
    SelectQuantity {
        quantity: u32,
    },
    SubmitRecipients {
        recipients: Vec<String>,
        metadata: Vec<Record<String>>,
    },
    SignMessage(SignedMessage),
    SubmitPassword {
        data: Vec<String>,
    },
    SubmitPromo {
        data: Vec<String>,
    },
    SolveCaptcha {
        data: Vec<String>,
    },
    SubmitGuild {
        data: Vec<String>,
    },
    SubmitGitcoin {
        data: Vec<String>,
    },
    SelectPaymentMethod {
        method: PaymentMethod,
    },
    SelectCardToCharge {
        card_id: String,
    },
    ConfirmMint,
    /// Progress or outcome of the mint started under `ticket`.
    MintUpdated {
        ticket: Ticket,
        mint: MintState,
    },
    RetryMint,
    MakeAnotherPurchase,
    UnlockAccount,
    /// Event for the live unlock-account child.
    Child(UnlockAccountEvent),
    /// Asynchronous result addressed to a specific child incarnation.
    ChildSettled {
        child: ActorId,
        event: UnlockAccountEvent,
    },
    /// The authentication context switched account.
    AccountChanged {
        account: Option<AccountIdentity>,
    },
    Disconnect,
    UpdatePaywallConfig {
        config: Box<PaywallConfig>,
    },
    ResetCheckout,
    Back,
}

impl CheckoutEvent {
    pub fn name(&self) -> &'static str {
        match self {
            CheckoutEvent::SelectLock { .. } => "SELECT_LOCK",
            CheckoutEvent::SelectQuantity { .. } => "SELECT_QUANTITY",
            CheckoutEvent::SubmitRecipients { .. } => "SUBMIT_RECIPIENTS",
            CheckoutEvent::SignMessage(_) => "SIGN_MESSAGE",
            CheckoutEvent::SubmitPassword { .. } => "SUBMIT_PASSWORD",
            CheckoutEvent::SubmitPromo { .. } => "SUBMIT_PROMO",
            CheckoutEvent::SolveCaptcha { .. } => "SOLVE_CAPTCHA",
            CheckoutEvent::SubmitGuild { .. } => "SUBMIT_GUILD",
            CheckoutEvent::SubmitGitcoin { .. } => "SUBMIT_GITCOIN",
            CheckoutEvent::SelectPaymentMethod { .. } => "SELECT_PAYMENT_METHOD",
            CheckoutEvent::SelectCardToCharge { .. } => "SELECT_CARD_TO_CHARGE",
            CheckoutEvent::ConfirmMint => "CONFIRM_MINT",
            CheckoutEvent::MintUpdated { .. } => "MINT_UPDATED",
            CheckoutEvent::RetryMint => "RETRY_MINT",
            CheckoutEvent::MakeAnotherPurchase => "MAKE_ANOTHER_PURCHASE",
            CheckoutEvent::UnlockAccount => "UNLOCK_ACCOUNT",
            CheckoutEvent::Child(event) | CheckoutEvent::ChildSettled { event, .. } => event.name(),
            CheckoutEvent::AccountChanged { .. } => "ACCOUNT_CHANGED",
            CheckoutEvent::Disconnect => "DISCONNECT",
            CheckoutEvent::UpdatePaywallConfig { .. } => "UPDATE_PAYWALL_CONFIG",
            CheckoutEvent::ResetCheckout => "RESET_CHECKOUT",
            CheckoutEvent::Back => "BACK",
        }
    }

    /// The gate a submission event belongs to, with its data.
    pub(crate) fn gate_submission(&self) -> Option<(Gate, &[String])> {
        match self {
            CheckoutEvent::SubmitPassword { data } => Some((Gate::Password, data.as_slice())),
            CheckoutEvent::SubmitPromo { data } => Some((Gate::Promo, data.as_slice())),
            CheckoutEvent::SolveCaptcha { data } => Some((Gate::Captcha, data.as_slice())),
            CheckoutEvent::SubmitGuild { data } => Some((Gate::Guild, data.as_slice())),
            CheckoutEvent::SubmitGitcoin { data } => Some((Gate::Gitcoin, data.as_slice())),
            _ => None,
        }
    }
}

/// Side effects requested by [`CheckoutMachine`](super::CheckoutMachine).
#[derive(Debug, Clone, PartialEq)]
pub enum CheckoutEffect {
    StartMint {
        ticket: Ticket,
        request: MintRequest,
    },
    /// Watch a mint submitted before a reload.
    AwaitMint {
        ticket: Ticket,
        transaction_hash: String,
    },
    Cancel {
        ticket: Ticket,
    },
    Child {
        child: ActorId,
        effect: UnlockAccountEffect,
    },
    ChildStopped {
        child: ActorId,
    },
    AccountChanged {
        account: Option<AccountIdentity>,
    },
    /// Forwarded to external auth teardown.
    Disconnect,
}
