//! # Checkout Machine
//!
//! State machines sequencing a membership checkout, and a tokio runtime to
//! drive them.
//!
//! The purchase flow is a [`CheckoutMachine`](checkout::CheckoutMachine): lock
//! selection, quantity, recipients, message signing, gating steps, payment,
//! confirmation and minting. When a step needs a known account it hands over to
//! a nested [`UnlockAccountMachine`](unlock_account::UnlockAccountMachine) and
//! resumes where it left off once the account is unlocked.
//!
//! ## Quick Start
//!
//! ```rust
//! use checkout_core::{config::PaywallConfig, types::{AccountIdentity, PaymentMethod}};
//! use checkout_machine::{
//!     checkout::{CheckoutEffect, CheckoutEvent, CheckoutMachine, CheckoutStep},
//!     machine::Machine,
//! };
//!
//! let config = PaywallConfig::from_value(serde_json::json!({
//!     "title": "Members only",
//!     "locks": { "0xCE0": { "network": 137, "keyPrice": "1000" } }
//! })).unwrap();
//!
//! let mut checkout = CheckoutMachine::new(config, Some(AccountIdentity::wallet("0xme")));
//! checkout.send(CheckoutEvent::SelectLock { lock: "0xCE0".into(), existing_member: false });
//! checkout.send(CheckoutEvent::SelectPaymentMethod { method: PaymentMethod::Crypto });
//! assert_eq!(checkout.step(), CheckoutStep::Confirm);
//!
//! // Machines never perform side effects, they describe them.
//! let effects = checkout.send(CheckoutEvent::ConfirmMint).effects();
//! assert!(matches!(effects.as_slice(), [CheckoutEffect::StartMint { .. }]));
//! ```
//!
//! ## Modules
//!
//! - [`machine`]: The [`Machine`](machine::Machine) trait, tickets and transitions.
//! - [`checkout`]: The purchase flow and its navigation graph.
//! - [`unlock_account`]: Email and wallet sign in.
//! - [`connect`]: A "connect wallet" flow outside of a purchase.
//! - [`actor`]: Runs machines on tokio tasks and executes their effects.
//! - [`services`]: Traits for minting and authentication backends.
//! - [`bridge`]: Messages to the page embedding the checkout.
//! - [`session`]: Top navigation and close behavior of a running checkout.
//! - [`view`]: Mapping from checkout states to renderers.
//! - [`errors`]: Error types.
//!
//! ## Asynchronous Work
//!
//! Effects that take time, such as minting or signing in, carry a
//! [`Ticket`](machine::Ticket). The actor runs them on spawned tasks and feeds
//! the result back as an event with the same ticket. A machine only accepts the
//! result for the ticket it is waiting for, so a result arriving after the user
//! moved on is dropped.

pub mod actor;
pub mod bridge;
pub mod checkout;
pub mod connect;
pub mod errors;
pub mod machine;
pub mod services;
pub mod session;
pub mod unlock_account;
pub mod view;
