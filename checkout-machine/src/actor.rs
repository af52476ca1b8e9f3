//! Tokio runtime for machines.
//!
//! [`MachineActor::spawn`] moves a [`Machine`] onto its own task. Events are
//! applied one at a time in arrival order, and every applied event publishes a
//! fresh snapshot on a `watch` channel. Effects go to an [`EffectHandler`],
//! which starts the asynchronous work they describe through [`Tasks`]; the
//! outcome of that work comes back as an ordinary event.
//!
//! The actor stops when [`ActorHandle::stop`] is called or when every handle
//! and snapshot subscriber is gone. Running tasks are aborted either way.

use std::{collections::HashMap, fmt::Debug, sync::Arc};

use checkout_core::types::{AccountIdentity, MintState};
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
};

use crate::{
    bridge::{Communication, UserInfo},
    checkout::{CheckoutEffect, CheckoutEvent, CheckoutMachine},
    connect::{ConnectEffect, ConnectEvent, ConnectMachine},
    errors::{Error, Result},
    machine::{ActorId, Machine, Ticket, Transition},
    services::{Authenticator, MintProgress, Minter},
    unlock_account::{UnlockAccountEffect, UnlockAccountEvent, UnlockAccountMachine},
};

enum Command<E> {
    Event(E),
    Can(E, oneshot::Sender<bool>),
    Stop,
}

/// Delivers events to a running actor.
pub struct EventSender<E> {
    tx: mpsc::UnboundedSender<Command<E>>,
}

impl<E> Clone for EventSender<E> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<E> Debug for EventSender<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSender")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl<E> EventSender<E> {
    pub fn send(&self, event: E) -> Result<()> {
        self.tx
            .send(Command::Event(event))
            .map_err(|_| Error::ActorStopped)
    }
}

/// Key of a running task: the ticket it was started under, and the child
/// actor that owns it if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskKey {
    pub owner: Option<ActorId>,
    pub ticket: Ticket,
}

impl TaskKey {
    pub fn own(ticket: Ticket) -> Self {
        Self {
            owner: None,
            ticket,
        }
    }

    pub fn child(owner: ActorId, ticket: Ticket) -> Self {
        Self {
            owner: Some(owner),
            ticket,
        }
    }
}

/// Asynchronous work started on behalf of one actor.
pub struct Tasks<E> {
    sender: EventSender<E>,
    running: HashMap<TaskKey, JoinHandle<()>>,
}

impl<E: Send + 'static> Tasks<E> {
    fn new(sender: EventSender<E>) -> Self {
        Self {
            sender,
            running: HashMap::new(),
        }
    }

    /// Sender into the owning actor.
    pub fn sender(&self) -> EventSender<E> {
        self.sender.clone()
    }

    /// Run `task` and deliver the event it resolves to, if any.
    pub fn spawn<F>(&mut self, key: TaskKey, task: F)
    where
        F: Future<Output = Option<E>> + Send + 'static,
    {
        self.running.retain(|_, handle| !handle.is_finished());

        let sender = self.sender.clone();
        let handle = tokio::spawn(async move {
            if let Some(event) = task.await {
                // The actor may have stopped meanwhile.
                let _ = sender.send(event);
            }
        });
        if let Some(previous) = self.running.insert(key, handle) {
            previous.abort();
        }
    }

    /// Run work nobody waits for.
    pub fn detach<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(task);
    }

    pub fn abort(&mut self, key: &TaskKey) {
        if let Some(handle) = self.running.remove(key) {
            #[cfg(feature = "tracing")]
            tracing::debug!("Aborting task {:?}", key);
            handle.abort();
        }
    }

    /// Abort every task started for child `owner`.
    pub fn abort_owner(&mut self, owner: ActorId) {
        self.running.retain(|key, handle| {
            let owned = key.owner == Some(owner);
            if owned {
                handle.abort();
            }
            !owned
        });
    }

    /// Number of tasks still running.
    pub fn running(&self) -> usize {
        self.running
            .values()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    fn abort_all(&mut self) {
        for (_, handle) in self.running.drain() {
            handle.abort();
        }
    }
}

/// Executes the effects of machine `M`.
pub trait EffectHandler<M: Machine>: Send + 'static {
    fn handle(&mut self, effect: M::Effect, tasks: &mut Tasks<M::Event>);
}

/// Handle to a running actor. Cheap to clone.
pub struct ActorHandle<M: Machine> {
    sender: EventSender<M::Event>,
    snapshots: watch::Receiver<M::Snapshot>,
}

impl<M: Machine> Clone for ActorHandle<M> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            snapshots: self.snapshots.clone(),
        }
    }
}

impl<M: Machine> ActorHandle<M> {
    pub fn send(&self, event: M::Event) -> Result<()> {
        self.sender.send(event)
    }

    /// Whether the machine would apply `event` right now.
    pub async fn can(&self, event: M::Event) -> Result<bool> {
        let (reply, answer) = oneshot::channel();
        self.sender
            .tx
            .send(Command::Can(event, reply))
            .map_err(|_| Error::ActorStopped)?;
        answer.await.map_err(|_| Error::ActorStopped)
    }

    /// The latest published snapshot.
    pub fn snapshot(&self) -> M::Snapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<M::Snapshot> {
        self.snapshots.clone()
    }

    /// Wait until a published snapshot satisfies `predicate`.
    pub async fn wait_for(
        &self,
        predicate: impl FnMut(&M::Snapshot) -> bool,
    ) -> Result<M::Snapshot> {
        let mut snapshots = self.snapshots.clone();
        let snapshot = snapshots
            .wait_for(predicate)
            .await
            .map_err(|_| Error::ActorStopped)?;
        Ok(snapshot.clone())
    }

    pub fn sender(&self) -> EventSender<M::Event> {
        self.sender.clone()
    }

    pub fn stop(&self) -> Result<()> {
        self.sender
            .tx
            .send(Command::Stop)
            .map_err(|_| Error::ActorStopped)
    }
}

/// A machine running on its own tokio task.
pub struct MachineActor<M: Machine, H> {
    machine: M,
    handler: H,
    tasks: Tasks<M::Event>,
    commands: mpsc::UnboundedReceiver<Command<M::Event>>,
    snapshots: watch::Sender<M::Snapshot>,
}

impl<M, H> MachineActor<M, H>
where
    M: Machine + Send + 'static,
    H: EffectHandler<M>,
{
    /// Start `machine`. Must be called within a tokio runtime.
    pub fn spawn(mut machine: M, handler: H) -> ActorHandle<M> {
        let (tx, commands) = mpsc::unbounded_channel();
        let sender = EventSender { tx };
        let startup = machine.start();
        let (snapshots, receiver) = watch::channel(machine.snapshot());

        let actor = Self {
            machine,
            handler,
            tasks: Tasks::new(sender.clone()),
            commands,
            snapshots,
        };
        tokio::spawn(actor.run(startup));

        ActorHandle {
            sender,
            snapshots: receiver,
        }
    }

    async fn run(mut self, startup: Vec<M::Effect>) {
        #[cfg(feature = "tracing")]
        tracing::debug!("Actor started in {}", self.machine.state_name());

        self.execute(startup);
        self.publish();

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Event(event)) => self.dispatch(event),
                    Some(Command::Can(event, reply)) => {
                        let _ = reply.send(self.machine.can(&event));
                    }
                    Some(Command::Stop) | None => break,
                },
                _ = self.snapshots.closed() => break,
            }
        }

        self.tasks.abort_all();

        #[cfg(feature = "tracing")]
        tracing::debug!("Actor stopped in {}", self.machine.state_name());
    }

    fn dispatch(&mut self, event: M::Event) {
        if let Transition::Taken { effects, .. } = self.machine.send(event) {
            self.execute(effects);
            self.publish();
        }
    }

    fn execute(&mut self, effects: Vec<M::Effect>) {
        for effect in effects {
            self.handler.handle(effect, &mut self.tasks);
        }
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.machine.snapshot());
    }
}

/// Runs [`CheckoutMachine`] effects against the given services.
pub struct CheckoutEffects<S, A, C> {
    minter: Arc<S>,
    authenticator: Arc<A>,
    communication: Arc<C>,
}

impl<S, A, C> CheckoutEffects<S, A, C> {
    pub fn new(minter: Arc<S>, authenticator: Arc<A>, communication: Arc<C>) -> Self {
        Self {
            minter,
            authenticator,
            communication,
        }
    }
}

impl<S, A, C> EffectHandler<CheckoutMachine> for CheckoutEffects<S, A, C>
where
    S: Minter,
    A: Authenticator,
    C: Communication,
{
    fn handle(&mut self, effect: CheckoutEffect, tasks: &mut Tasks<CheckoutEvent>) {
        match effect {
            CheckoutEffect::StartMint { ticket, request } => {
                #[cfg(feature = "tracing")]
                tracing::info!("Minting {} key(s) on {} {}", request.quantity, request.lock, ticket);

                let minter = self.minter.clone();
                let progress = MintProgress::new(ticket, tasks.sender());
                tasks.spawn(TaskKey::own(ticket), async move {
                    let mint = match minter.mint(request, progress).await {
                        Ok(receipt) => MintState::finished(receipt.transaction_hash),
                        #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
                        Err(err) => {
                            #[cfg(feature = "tracing")]
                            tracing::warn!("Mint {} failed: {}", ticket, err);
                            MintState::error(None)
                        }
                    };
                    Some(CheckoutEvent::MintUpdated { ticket, mint })
                });
            }
            CheckoutEffect::AwaitMint {
                ticket,
                transaction_hash,
            } => {
                let minter = self.minter.clone();
                tasks.spawn(TaskKey::own(ticket), async move {
                    let mint = match minter.wait_for_mint(transaction_hash.clone()).await {
                        Ok(receipt) => MintState::finished(
                            receipt.transaction_hash.or(Some(transaction_hash)),
                        ),
                        #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
                        Err(err) => {
                            #[cfg(feature = "tracing")]
                            tracing::warn!("Mint {} failed: {}", transaction_hash, err);
                            MintState::error(Some(transaction_hash))
                        }
                    };
                    Some(CheckoutEvent::MintUpdated { ticket, mint })
                });
            }
            CheckoutEffect::Cancel { ticket } => tasks.abort(&TaskKey::own(ticket)),
            CheckoutEffect::Child { child, effect } => {
                run_unlock_effect(&self.authenticator, Some(child), effect, tasks, move |event| {
                    CheckoutEvent::ChildSettled { child, event }
                });
            }
            CheckoutEffect::ChildStopped { child } => tasks.abort_owner(child),
            CheckoutEffect::AccountChanged { account } => {
                relay_user_info(self.communication.as_ref(), account);
            }
            CheckoutEffect::Disconnect => disconnect(&self.authenticator, tasks),
        }
    }
}

/// Runs [`ConnectMachine`] effects.
pub struct ConnectEffects<A, C> {
    authenticator: Arc<A>,
    communication: Arc<C>,
}

impl<A, C> ConnectEffects<A, C> {
    pub fn new(authenticator: Arc<A>, communication: Arc<C>) -> Self {
        Self {
            authenticator,
            communication,
        }
    }
}

impl<A, C> EffectHandler<ConnectMachine> for ConnectEffects<A, C>
where
    A: Authenticator,
    C: Communication,
{
    fn handle(&mut self, effect: ConnectEffect, tasks: &mut Tasks<ConnectEvent>) {
        match effect {
            ConnectEffect::Child { child, effect } => {
                run_unlock_effect(&self.authenticator, Some(child), effect, tasks, move |event| {
                    ConnectEvent::ChildSettled { child, event }
                });
            }
            ConnectEffect::ChildStopped { child } => tasks.abort_owner(child),
            ConnectEffect::AccountChanged { account } => {
                relay_user_info(self.communication.as_ref(), account);
            }
            ConnectEffect::Disconnect => disconnect(&self.authenticator, tasks),
        }
    }
}

/// Runs a standalone [`UnlockAccountMachine`].
pub struct UnlockAccountEffects<A> {
    authenticator: Arc<A>,
}

impl<A> UnlockAccountEffects<A> {
    pub fn new(authenticator: Arc<A>) -> Self {
        Self { authenticator }
    }
}

impl<A: Authenticator> EffectHandler<UnlockAccountMachine> for UnlockAccountEffects<A> {
    fn handle(&mut self, effect: UnlockAccountEffect, tasks: &mut Tasks<UnlockAccountEvent>) {
        run_unlock_effect(&self.authenticator, None, effect, tasks, |event| event);
    }
}

fn run_unlock_effect<A, E>(
    authenticator: &Arc<A>,
    owner: Option<ActorId>,
    effect: UnlockAccountEffect,
    tasks: &mut Tasks<E>,
    wrap: impl FnOnce(UnlockAccountEvent) -> E + Send + 'static,
) where
    A: Authenticator,
    E: Send + 'static,
{
    match effect {
        UnlockAccountEffect::StartSignIn {
            ticket,
            credentials,
        } => {
            let authenticator = authenticator.clone();
            tasks.spawn(TaskKey { owner, ticket }, async move {
                let result = authenticator
                    .sign_in(credentials)
                    .await
                    .map_err(|err| err.to_string());
                Some(wrap(UnlockAccountEvent::SignInSettled { ticket, result }))
            });
        }
        UnlockAccountEffect::StartWalletConnect { ticket } => {
            let authenticator = authenticator.clone();
            tasks.spawn(TaskKey { owner, ticket }, async move {
                let result = authenticator
                    .connect_wallet()
                    .await
                    .map_err(|err| err.to_string());
                Some(wrap(UnlockAccountEvent::WalletSettled { ticket, result }))
            });
        }
        UnlockAccountEffect::Cancel { ticket } => tasks.abort(&TaskKey { owner, ticket }),
    }
}

fn relay_user_info<C: Communication>(communication: &C, account: Option<AccountIdentity>) {
    if communication.inside_iframe() {
        communication.emit_user_info(UserInfo {
            address: account.map(|account| account.address),
        });
    }
}

fn disconnect<A: Authenticator, E: Send + 'static>(authenticator: &Arc<A>, tasks: &Tasks<E>) {
    let authenticator = authenticator.clone();
    tasks.detach(async move {
        match authenticator.disconnect().await {
            Ok(()) => {}
            #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
            Err(err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!("Disconnect failed: {}", err);
            }
        }
    });
}
