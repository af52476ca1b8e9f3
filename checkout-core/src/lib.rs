//! Checkout core library.
//!
//! This library provides the paywall configuration model and the value types
//! shared by the checkout state machines: selected payment method, mint state,
//! signed message and account identity.

pub mod config;
pub mod errors;
pub mod types;
