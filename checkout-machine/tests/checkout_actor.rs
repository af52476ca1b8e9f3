mod common;

use std::{sync::Arc, time::Duration};

use checkout_core::{
    config::PaywallConfig,
    types::{AccountIdentity, MintState, MintStatus, PaymentMethod},
};
use checkout_machine::{
    bridge::{ChannelCommunication, OutboundMessage, UserInfo},
    checkout::{CheckoutEvent, CheckoutStep},
    session::{Checkout, CheckoutSession},
    unlock_account::UnlockAccountEvent,
};
use common::{FakeAuthenticator, FakeMinter, LOCK, MintOutcome, me};
use tokio::sync::{Notify, mpsc::UnboundedReceiver};

async fn within<T>(future: impl Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), future)
        .await
        .expect("timed out")
}

/// Let spawned tasks run.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

fn start(
    config: PaywallConfig,
    account: Option<AccountIdentity>,
    minter: Arc<FakeMinter>,
    authenticator: Arc<FakeAuthenticator>,
) -> (
    CheckoutSession<ChannelCommunication>,
    UnboundedReceiver<OutboundMessage>,
) {
    let (communication, messages) = ChannelCommunication::new();
    let session = Checkout::builder()
        .paywall_config(config)
        .maybe_account(account)
        .minter(minter)
        .authenticator(authenticator)
        .communication(Arc::new(communication))
        .build()
        .start();
    (session, messages)
}

fn select_and_confirm(session: &CheckoutSession<ChannelCommunication>) {
    session
        .send(CheckoutEvent::SelectLock {
            lock: LOCK.to_string(),
            existing_member: false,
        })
        .unwrap();
    session
        .send(CheckoutEvent::SelectPaymentMethod {
            method: PaymentMethod::Crypto,
        })
        .unwrap();
    session.send(CheckoutEvent::ConfirmMint).unwrap();
}

#[tokio::test]
async fn test_mint_failure_then_retry() {
    let minter = Arc::new(FakeMinter::new([
        MintOutcome::Fail,
        MintOutcome::Succeed("0xok"),
    ]));
    let (session, _messages) = start(
        common::simple_config(),
        Some(me()),
        minter.clone(),
        Arc::default(),
    );

    select_and_confirm(&session);
    let failed = within(session.handle().wait_for(|snapshot| {
        snapshot
            .context
            .mint
            .as_ref()
            .is_some_and(MintState::is_error)
    }))
    .await
    .unwrap();
    assert_eq!(failed.step, CheckoutStep::Minting);
    assert!(failed.can_back);

    session.send(CheckoutEvent::RetryMint).unwrap();
    let done = within(session.wait_for_step(CheckoutStep::Returning))
        .await
        .unwrap();
    assert_eq!(
        done.context.mint,
        Some(MintState::finished(Some("0xok".to_string())))
    );

    let requests = minter.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0], requests[1]);
    assert_eq!(requests[0].buyer, "0xme");
    assert_eq!(requests[0].recipients, vec!["0xme".to_string()]);
    assert_eq!(requests[0].total_price.map(|price| price.0), Some(1000));
}

#[tokio::test]
async fn test_submitted_hash_is_reported_before_completion() {
    let gate = Arc::new(Notify::new());
    let minter = Arc::new(
        FakeMinter::new([MintOutcome::SubmitThenSucceed("0xabc")]).gated(gate.clone()),
    );
    let (session, _messages) = start(
        common::simple_config(),
        Some(me()),
        minter,
        Arc::default(),
    );

    select_and_confirm(&session);
    let submitted = within(session.handle().wait_for(|snapshot| {
        snapshot
            .context
            .mint
            .as_ref()
            .is_some_and(|mint| mint.transaction_hash.is_some())
    }))
    .await
    .unwrap();
    assert_eq!(submitted.step, CheckoutStep::Minting);
    assert_eq!(
        submitted.context.mint,
        Some(MintState::submitted("0xabc"))
    );
    assert!(!submitted.can_back);

    gate.notify_one();
    let done = within(session.wait_for_step(CheckoutStep::Returning))
        .await
        .unwrap();
    assert_eq!(
        done.context.mint.map(|mint| mint.status),
        Some(MintStatus::Finished)
    );
}

#[tokio::test]
async fn test_reset_drops_mint_in_flight() {
    let gate = Arc::new(Notify::new());
    let minter = Arc::new(FakeMinter::default().gated(gate.clone()));
    let (session, _messages) = start(
        common::simple_config(),
        Some(me()),
        minter.clone(),
        Arc::default(),
    );

    select_and_confirm(&session);
    within(session.wait_for_step(CheckoutStep::Minting))
        .await
        .unwrap();
    within(async {
        while minter.requests().is_empty() {
            settle().await;
        }
    })
    .await;

    session.send(CheckoutEvent::ResetCheckout).unwrap();
    within(session.wait_for_step(CheckoutStep::Select))
        .await
        .unwrap();
    gate.notify_one();
    settle().await;

    let snapshot = session.snapshot();
    assert_eq!(snapshot.step, CheckoutStep::Select);
    assert!(snapshot.context.mint.is_none());
    assert!(snapshot.context.selected_lock.is_none());
}

#[tokio::test]
async fn test_late_sign_in_after_back_is_dropped() {
    let gate = Arc::new(Notify::new());
    let authenticator = Arc::new(FakeAuthenticator::gated(gate.clone()));
    let (session, _messages) = start(
        common::simple_config(),
        None,
        Arc::default(),
        authenticator,
    );

    session
        .send(CheckoutEvent::SelectLock {
            lock: LOCK.to_string(),
            existing_member: false,
        })
        .unwrap();
    for event in [
        UnlockAccountEvent::ChooseEmail,
        UnlockAccountEvent::SubmitEmail {
            email: "julien@unlock-protocol.com".to_string(),
        },
        UnlockAccountEvent::SubmitPassword {
            password: "hunter2".to_string(),
        },
    ] {
        session.send(CheckoutEvent::Child(event)).unwrap();
    }
    within(session.handle().wait_for(|snapshot| {
        snapshot
            .unlock_account
            .as_ref()
            .is_some_and(|child| child.value == "AUTHENTICATING")
    }))
    .await
    .unwrap();

    session.send(CheckoutEvent::Back).unwrap();
    within(session.wait_for_step(CheckoutStep::Select))
        .await
        .unwrap();
    gate.notify_one();
    settle().await;

    let snapshot = session.snapshot();
    assert_eq!(snapshot.step, CheckoutStep::Select);
    assert!(snapshot.context.account.is_none());
    assert!(snapshot.unlock_account.is_none());
}

#[tokio::test]
async fn test_wallet_unlock_resumes_and_informs_host() {
    let (session, mut messages) = start(
        common::simple_config(),
        None,
        Arc::default(),
        Arc::default(),
    );
    assert_eq!(
        within(messages.recv()).await,
        Some(OutboundMessage::UserInfo(UserInfo { address: None }))
    );

    session
        .send(CheckoutEvent::SelectLock {
            lock: LOCK.to_lowercase(),
            existing_member: false,
        })
        .unwrap();
    session
        .send(CheckoutEvent::Child(UnlockAccountEvent::ChooseWallet))
        .unwrap();

    let payment = within(session.wait_for_step(CheckoutStep::Payment))
        .await
        .unwrap();
    assert_eq!(payment.context.account, Some(me()));
    assert_eq!(payment.context.selected_lock.as_deref(), Some(LOCK));
    assert_eq!(
        within(messages.recv()).await,
        Some(OutboundMessage::UserInfo(UserInfo {
            address: Some("0xme".to_string())
        }))
    );
}

#[tokio::test]
async fn test_disconnect_tears_down_auth() {
    let authenticator = Arc::new(FakeAuthenticator::default());
    let (session, mut messages) = start(
        common::simple_config(),
        Some(me()),
        Arc::default(),
        authenticator.clone(),
    );
    assert_eq!(
        within(messages.recv()).await,
        Some(OutboundMessage::UserInfo(UserInfo {
            address: Some("0xme".to_string())
        }))
    );

    session.send(CheckoutEvent::Disconnect).unwrap();
    assert_eq!(
        within(messages.recv()).await,
        Some(OutboundMessage::UserInfo(UserInfo { address: None }))
    );
    within(async {
        while authenticator.disconnects() == 0 {
            settle().await;
        }
    })
    .await;
    assert!(session.snapshot().context.account.is_none());
}

#[tokio::test]
async fn test_config_update_leaves_disabled_gate() {
    let (session, _messages) = start(
        common::guild_config(true),
        Some(me()),
        Arc::default(),
        Arc::default(),
    );
    session
        .send(CheckoutEvent::SelectLock {
            lock: LOCK.to_string(),
            existing_member: false,
        })
        .unwrap();
    within(session.wait_for_step(CheckoutStep::Guild))
        .await
        .unwrap();

    assert!(!session.update_config(common::guild_config(true)).unwrap());
    assert!(session.update_config(common::guild_config(false)).unwrap());
    within(session.wait_for_step(CheckoutStep::Payment))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_can_is_answered_by_the_actor() {
    let (session, _messages) = start(
        common::simple_config(),
        Some(me()),
        Arc::default(),
        Arc::default(),
    );
    let handle = session.handle();
    assert!(!handle.can(CheckoutEvent::Back).await.unwrap());
    assert!(!handle.can(CheckoutEvent::ConfirmMint).await.unwrap());
    assert!(
        handle
            .can(CheckoutEvent::SelectLock {
                lock: LOCK.to_string(),
                existing_member: false,
            })
            .await
            .unwrap()
    );
    assert!(
        !handle
            .can(CheckoutEvent::SelectLock {
                lock: "0xunknown".to_string(),
                existing_member: false,
            })
            .await
            .unwrap()
    );

    handle.stop().unwrap();
    within(async {
        while handle.can(CheckoutEvent::Back).await.is_ok() {
            settle().await;
        }
    })
    .await;
    assert!(session.send(CheckoutEvent::Back).is_err());
}

#[tokio::test]
async fn test_resume_waits_for_submitted_mint() {
    let gate = Arc::new(Notify::new());
    let minter = Arc::new(
        FakeMinter::new([MintOutcome::SubmitThenSucceed("0xabc")]).gated(gate.clone()),
    );
    let (session, _messages) = start(
        common::simple_config(),
        Some(me()),
        minter,
        Arc::default(),
    );
    select_and_confirm(&session);
    within(session.handle().wait_for(|snapshot| {
        snapshot
            .context
            .mint
            .as_ref()
            .is_some_and(|mint| mint.transaction_hash.is_some())
    }))
    .await
    .unwrap();

    // Reload: the state survives as JSON, the tasks do not.
    let persisted = serde_json::to_value(session.persist()).unwrap();
    session.handle().stop().unwrap();
    assert_eq!(persisted["state"], "MINTING");

    let minter = Arc::new(FakeMinter::default());
    let (communication, _messages) = ChannelCommunication::new();
    let resumed = Checkout::builder()
        .paywall_config(common::simple_config())
        .account(me())
        .minter(minter.clone())
        .authenticator(Arc::new(FakeAuthenticator::default()))
        .communication(Arc::new(communication))
        .resume(serde_json::from_value(persisted).unwrap())
        .build()
        .start();

    let done = within(resumed.wait_for_step(CheckoutStep::Returning))
        .await
        .unwrap();
    assert_eq!(minter.awaited(), vec!["0xabc".to_string()]);
    assert!(minter.requests().is_empty());
    assert_eq!(
        done.context.mint,
        Some(MintState::finished(Some("0xabc".to_string())))
    );
}
