use std::{sync::Arc, time::Duration};

use checkout_core::{
    config::PaywallConfig,
    types::{AccountIdentity, PaymentMethod},
};
use checkout_machine::{
    bridge::ChannelCommunication,
    checkout::{CheckoutEvent, CheckoutStep},
    services::{Authenticator, MintProgress, MintReceipt, MintRequest, Minter},
    session::Checkout,
    unlock_account::{Credentials, UnlockAccountEvent},
    view::ViewRegistry,
};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct SimulationError(String);

/// Pretends to send a purchase transaction.
struct SimulatedChain;

impl Minter for SimulatedChain {
    type Error = SimulationError;

    async fn mint(
        &self,
        request: MintRequest,
        progress: MintProgress,
    ) -> Result<MintReceipt, SimulationError> {
        tracing::info!(
            "Purchasing {} key(s) on {} for {:?}",
            request.quantity,
            request.lock,
            request.recipients
        );
        tokio::time::sleep(Duration::from_millis(200)).await;
        progress.submitted("0x5e1f");
        tokio::time::sleep(Duration::from_millis(500)).await;
        Ok(MintReceipt {
            transaction_hash: Some("0x5e1f".to_string()),
        })
    }

    async fn wait_for_mint(&self, transaction_hash: String) -> Result<MintReceipt, SimulationError> {
        tokio::time::sleep(Duration::from_millis(500)).await;
        Ok(MintReceipt {
            transaction_hash: Some(transaction_hash),
        })
    }
}

struct SimulatedAuth;

impl Authenticator for SimulatedAuth {
    type Error = SimulationError;

    async fn sign_in(&self, credentials: Credentials) -> Result<AccountIdentity, SimulationError> {
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok(AccountIdentity {
            address: "0xF5C28ce24Acf47849988f147d5C75787c0103534".to_string(),
            email: Some(credentials.email),
        })
    }

    async fn connect_wallet(&self) -> Result<AccountIdentity, SimulationError> {
        Err(SimulationError("no wallet installed".to_string()))
    }

    async fn disconnect(&self) -> Result<(), SimulationError> {
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = PaywallConfig::from_value_or_default(json!({
        "title": "Unlock Community",
        "icon": "https://unlock-protocol.com/images/svg/unlock-logo.svg",
        "locks": {
            "0xCE0F1e3D3a5C2d1A3aC26d2DC6eB24A8D3A6e10b": {
                "name": "Membership",
                "network": 137,
                "keyPrice": "10000000000000000",
                "maxRecipients": 3
            }
        }
    }));

    let (communication, mut host) = ChannelCommunication::new();
    tokio::spawn(async move {
        while let Some(message) = host.recv().await {
            match serde_json::to_string(&message) {
                Ok(message) => tracing::info!("To host: {}", message),
                Err(err) => tracing::error!("Unserializable host message: {}", err),
            }
        }
    });

    let session = Checkout::builder()
        .paywall_config(config)
        .minter(Arc::new(SimulatedChain))
        .authenticator(Arc::new(SimulatedAuth))
        .communication(Arc::new(communication))
        .build()
        .start();

    let views = CheckoutStep::ALL
        .into_iter()
        .fold(ViewRegistry::new(), |views, step| {
            views.register(step, format!("<{}Screen/>", step.name().to_lowercase()))
        });

    let mut snapshots = session.handle().subscribe();
    tokio::spawn(async move {
        while snapshots.changed().await.is_ok() {
            let snapshot = snapshots.borrow_and_update().clone();
            match views.render(&snapshot) {
                Ok(view) => tracing::info!("{} renders {}", snapshot.value, view),
                Err(err) => tracing::error!("{}", err),
            }
        }
    });

    let script = [
        CheckoutEvent::SelectLock {
            lock: "0xce0f1e3d3a5c2d1a3ac26d2dc6eb24a8d3a6e10b".to_string(),
            existing_member: false,
        },
        CheckoutEvent::SelectQuantity { quantity: 2 },
        CheckoutEvent::Child(UnlockAccountEvent::ChooseEmail),
        CheckoutEvent::Child(UnlockAccountEvent::SubmitEmail {
            email: "julien@unlock-protocol.com".to_string(),
        }),
        CheckoutEvent::Child(UnlockAccountEvent::SubmitPassword {
            password: "correct horse".to_string(),
        }),
    ];
    for event in script {
        if let Err(err) = session.send(event) {
            tracing::error!("{}", err);
            return;
        }
    }

    let payment = match session.wait_for_step(CheckoutStep::Payment).await {
        Ok(snapshot) => snapshot,
        Err(err) => {
            tracing::error!("{}", err);
            return;
        }
    };
    tracing::info!(
        "Signed in as {:?}, paying for {:?}",
        payment.context.account,
        payment.path
    );

    let _ = session.send(CheckoutEvent::SelectPaymentMethod {
        method: PaymentMethod::Crypto,
    });
    let _ = session.send(CheckoutEvent::ConfirmMint);

    match session.wait_for_step(CheckoutStep::Returning).await {
        Ok(done) => tracing::info!("Purchase complete: {:?}", done.context.mint),
        Err(err) => tracing::error!("{}", err),
    }
}
