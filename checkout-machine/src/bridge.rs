//! Messages sent to the page hosting an embedded checkout.
//!
//! The transport is not part of this crate. Implement [`Communication`] on top
//! of whatever carries messages to the host, or use [`ChannelCommunication`]
//! and forward what it receives.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Account information shared with the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// Wire form of the host messages.
///
/// ```
/// use checkout_machine::bridge::{OutboundMessage, UserInfo};
///
/// let message = OutboundMessage::UserInfo(UserInfo {
///     address: Some("0xabc".to_string()),
/// });
/// assert_eq!(
///     serde_json::to_value(&message).unwrap(),
///     serde_json::json!({ "type": "userInfo", "payload": { "address": "0xabc" } })
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum OutboundMessage {
    UserInfo(UserInfo),
    CloseModal,
}

/// Capability to talk to the host page.
pub trait Communication: Send + Sync + 'static {
    /// Whether the checkout runs embedded in a host page.
    fn inside_iframe(&self) -> bool;

    fn emit_user_info(&self, info: UserInfo);

    fn emit_close_modal(&self);
}

/// Forwards every message to an mpsc receiver.
#[derive(Debug, Clone)]
pub struct ChannelCommunication {
    sender: mpsc::UnboundedSender<OutboundMessage>,
}

impl ChannelCommunication {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutboundMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    fn emit(&self, message: OutboundMessage) {
        if self.sender.send(message).is_err() {
            #[cfg(feature = "tracing")]
            tracing::debug!("Host channel closed, dropping message");
        }
    }
}

impl Communication for ChannelCommunication {
    fn inside_iframe(&self) -> bool {
        true
    }

    fn emit_user_info(&self, info: UserInfo) {
        self.emit(OutboundMessage::UserInfo(info));
    }

    fn emit_close_modal(&self) {
        self.emit(OutboundMessage::CloseModal);
    }
}

/// A checkout running as its own page. Nothing is emitted.
#[derive(Debug, Clone, Copy, Default)]
pub struct Standalone;

impl Communication for Standalone {
    fn inside_iframe(&self) -> bool {
        false
    }

    fn emit_user_info(&self, _info: UserInfo) {}

    fn emit_close_modal(&self) {}
}
