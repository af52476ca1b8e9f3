#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use checkout_core::{config::PaywallConfig, types::AccountIdentity};
use checkout_machine::{
    services::{Authenticator, MintProgress, MintReceipt, MintRequest, Minter},
    unlock_account::Credentials,
};
use serde_json::json;
use tokio::sync::Notify;

pub const LOCK: &str = "0xCE0F1e3D3a5C2d1A3aC26d2DC6eB24A8D3A6e10b";

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct FakeError(pub String);

pub fn me() -> AccountIdentity {
    AccountIdentity::wallet("0xme")
}

/// One lock, quantity fixed to one, no gates.
pub fn simple_config() -> PaywallConfig {
    PaywallConfig::from_value(json!({
        "title": "Members only",
        "locks": { LOCK: { "network": 137, "keyPrice": "1000" } }
    }))
    .unwrap()
}

pub fn guild_config(guild: bool) -> PaywallConfig {
    PaywallConfig::from_value(json!({
        "locks": { LOCK: { "network": 137, "guild": guild } }
    }))
    .unwrap()
}

pub enum MintOutcome {
    Succeed(&'static str),
    /// Report the transaction hash before succeeding.
    SubmitThenSucceed(&'static str),
    Fail,
}

#[derive(Default)]
pub struct FakeMinter {
    outcomes: Mutex<VecDeque<MintOutcome>>,
    requests: Mutex<Vec<MintRequest>>,
    awaited: Mutex<Vec<String>>,
    gate: Option<Arc<Notify>>,
}

impl FakeMinter {
    pub fn new(outcomes: impl IntoIterator<Item = MintOutcome>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Every call blocks until `gate` is notified.
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn requests(&self) -> Vec<MintRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn awaited(&self) -> Vec<String> {
        self.awaited.lock().unwrap().clone()
    }

    async fn pass_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
    }
}

impl Minter for FakeMinter {
    type Error = FakeError;

    async fn mint(
        &self,
        request: MintRequest,
        progress: MintProgress,
    ) -> Result<MintReceipt, FakeError> {
        self.requests.lock().unwrap().push(request);
        let outcome = self
            .outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(MintOutcome::Succeed("0xtx"));

        if let MintOutcome::SubmitThenSucceed(hash) = &outcome {
            progress.submitted(*hash);
        }
        self.pass_gate().await;

        match outcome {
            MintOutcome::Succeed(hash) | MintOutcome::SubmitThenSucceed(hash) => Ok(MintReceipt {
                transaction_hash: Some(hash.to_string()),
            }),
            MintOutcome::Fail => Err(FakeError("insufficient funds".to_string())),
        }
    }

    async fn wait_for_mint(&self, transaction_hash: String) -> Result<MintReceipt, FakeError> {
        self.awaited.lock().unwrap().push(transaction_hash);
        self.pass_gate().await;
        Ok(MintReceipt {
            transaction_hash: None,
        })
    }
}

#[derive(Default)]
pub struct FakeAuthenticator {
    gate: Option<Arc<Notify>>,
    disconnects: Mutex<usize>,
}

impl FakeAuthenticator {
    pub fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn disconnects(&self) -> usize {
        *self.disconnects.lock().unwrap()
    }

    async fn pass_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
    }
}

impl Authenticator for FakeAuthenticator {
    type Error = FakeError;

    async fn sign_in(&self, credentials: Credentials) -> Result<AccountIdentity, FakeError> {
        self.pass_gate().await;
        if credentials.password != "hunter2" {
            return Err(FakeError("wrong password".to_string()));
        }
        Ok(AccountIdentity {
            address: "0xemail".to_string(),
            email: Some(credentials.email),
        })
    }

    async fn connect_wallet(&self) -> Result<AccountIdentity, FakeError> {
        self.pass_gate().await;
        Ok(me())
    }

    async fn disconnect(&self) -> Result<(), FakeError> {
        *self.disconnects.lock().unwrap() += 1;
        Ok(())
    }
}
