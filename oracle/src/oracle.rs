//! Validation and cosigning of the channel actions.
//!
//! The sender signature is checked first, then every action goes through
//! validate, cosign, store and publish while holding the lock of its channel,
//! so two actions can never extend the history from the same pointer.
use std::sync::Arc;

use adapter::{prelude::*, Adapter, UnlockedState};
use dashmap::DashMap;
use futures::future::try_join;
use primitives::{
    chain::ChainReader,
    history::HistoryEntry,
    storage::{self, ContentStore, NamingService},
    token::{FixedAction, UpdateAction},
    ActionKind, Address, ChannelAccount, ChannelId, ContentPointer, CoreActionData, OracleToken,
    PrevState, Reconstructor, SenderEnvelope, Snapshot,
};
use slog::{error, info, warn, Logger};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{error::stale_prev_state, Error};

/// A cosigned token and the pointer it was published at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accepted {
    pub token: OracleToken,
    pub pointer: ContentPointer,
}

pub struct Oracle<C: Unlocked, S, N, R> {
    adapter: Adapter<C, UnlockedState<C>>,
    reconstructor: Reconstructor<S, N, R>,
    /// One lock per channel, held from validation until the new pointer is published
    /// and removed once no action holds or waits for it.
    locks: DashMap<ChannelId, Arc<Mutex<()>>>,
    logger: Logger,
}

impl<C, S, N, R> Oracle<C, S, N, R>
where
    C: Unlocked,
    S: ContentStore,
    N: NamingService,
    R: ChainReader,
{
    pub fn new(
        adapter: Adapter<C, UnlockedState<C>>,
        reconstructor: Reconstructor<S, N, R>,
        logger: Logger,
    ) -> Self {
        Self {
            adapter,
            reconstructor,
            locks: DashMap::new(),
            logger,
        }
    }

    /// The address of the oracle keypair.
    pub fn whoami(&self) -> Address {
        self.adapter.whoami()
    }

    pub fn reconstructor(&self) -> &Reconstructor<S, N, R> {
        &self.reconstructor
    }

    /// Opens a new channel with the deposit of the opener.
    ///
    /// The envelope links to genesis and the cosigned token is published
    /// under a newly created key for the channel.
    pub async fn open(&self, envelope: SenderEnvelope) -> Result<Accepted, Error> {
        let action = fixed_action(&envelope, ActionKind::Open)?;

        let accepted = self.accept_open(&envelope, action).await;
        self.logged(&action.channel_id, ActionKind::Open, accepted)
    }

    /// Adds the deposit of a stakeholder to an open channel.
    ///
    /// The submitted envelope links to genesis, the cosigned token links to
    /// the current pointer of the channel.
    pub async fn join(&self, envelope: SenderEnvelope) -> Result<Accepted, Error> {
        let action = fixed_action(&envelope, ActionKind::Join)?;

        let accepted = self.accept_join(&envelope, action).await;
        self.logged(&action.channel_id, ActionKind::Join, accepted)
    }

    /// Transfers `amount` from the sender of the Update to `receiver`.
    ///
    /// The Update should list the balances of every participant after the
    /// transfer, exactly as the Oracle computes them from the current state.
    pub async fn update(
        &self,
        envelope: SenderEnvelope,
        amount: u64,
        receiver: Address,
    ) -> Result<Accepted, Error> {
        let update = match &envelope.data {
            CoreActionData::Update(update) => update,
            data => {
                return Err(Error::InvalidAction {
                    expected: ActionKind::Update,
                    actual: data.action(),
                })
            }
        };
        let channel_id = &update.channel_id;

        let accepted = self
            .accept_update(&envelope, update, amount, receiver)
            .await;
        self.logged(channel_id, ActionKind::Update, accepted)
    }

    /// Withdraws the whole balance of the sender from the channel.
    pub async fn leave(&self, envelope: SenderEnvelope) -> Result<Accepted, Error> {
        let action = fixed_action(&envelope, ActionKind::Leave)?;

        let accepted = self.accept_leave(&envelope, action).await;
        self.logged(&action.channel_id, ActionKind::Leave, accepted)
    }

    /// The current state of the channel.
    pub async fn state(&self, channel_id: &ChannelId) -> Result<Snapshot, Error> {
        Ok(self.reconstructor.last_channel_state(channel_id).await?)
    }

    /// Every token of the channel, newest first.
    pub async fn history(&self, channel_id: &ChannelId) -> Result<Vec<HistoryEntry>, Error> {
        Ok(self.reconstructor.history(channel_id).await?)
    }

    async fn accept_open(
        &self,
        envelope: &SenderEnvelope,
        action: &FixedAction,
    ) -> Result<Accepted, Error> {
        ensure_genesis(envelope)?;
        ensure_own_deposit(action)?;
        self.verify_sender(envelope)?;

        let channel_id = &action.channel_id;
        let _channel = self.lock(channel_id).await;
        let (published, account) = try_join(
            self.published_pointer(channel_id),
            self.channel_account(channel_id),
        )
        .await?;
        if published.is_some() || account.is_some() {
            return Err(Error::ChannelAlreadyExists(channel_id.clone()));
        }

        let token = self.cosign(envelope, PrevState::Genesis)?;
        self.append(channel_id, token).await
    }

    async fn accept_join(
        &self,
        envelope: &SenderEnvelope,
        action: &FixedAction,
    ) -> Result<Accepted, Error> {
        ensure_genesis(envelope)?;
        ensure_own_deposit(action)?;
        self.verify_sender(envelope)?;

        let channel_id = &action.channel_id;
        let _channel = self.lock(channel_id).await;
        let current = self.reconstructor.latest_pointer(channel_id).await?;
        self.ensure_open(channel_id).await?;
        // the history we extend should replay
        self.reconstructor
            .reconstruct(channel_id, Some(current.clone()))
            .await?;

        let token = self.cosign(envelope, current.into())?;
        self.append(channel_id, token).await
    }

    async fn accept_update(
        &self,
        envelope: &SenderEnvelope,
        update: &UpdateAction,
        amount: u64,
        receiver: Address,
    ) -> Result<Accepted, Error> {
        self.verify_sender(envelope)?;

        let channel_id = &update.channel_id;
        let _channel = self.lock(channel_id).await;
        let snapshot = self.reconstructor.last_channel_state(channel_id).await?;
        ensure_links_to(envelope, &snapshot.pointer)?;

        let post_state = snapshot.state.transfer(&update.sender, &receiver, amount)?;
        if update.participants.as_slice() != post_state.participants() {
            return Err(Error::BalanceMismatch(format!(
                "expected {:?}, got {:?}",
                post_state.participants(),
                update.participants
            )));
        }

        let token = self.cosign(envelope, snapshot.pointer.into())?;
        self.append(channel_id, token).await
    }

    async fn accept_leave(
        &self,
        envelope: &SenderEnvelope,
        action: &FixedAction,
    ) -> Result<Accepted, Error> {
        ensure_own_deposit(action)?;
        self.verify_sender(envelope)?;

        let channel_id = &action.channel_id;
        let _channel = self.lock(channel_id).await;
        let snapshot = self.reconstructor.last_channel_state(channel_id).await?;
        ensure_links_to(envelope, &snapshot.pointer)?;
        self.ensure_open(channel_id).await?;

        let balance = snapshot
            .state
            .get(&action.address)
            .ok_or(Error::ParticipantNotFound(action.address))?;
        if balance != action.balance {
            return Err(Error::BalanceMismatch(format!(
                "balance of {} is {balance}, got {}",
                action.address, action.balance
            )));
        }

        let token = self.cosign(envelope, snapshot.pointer.into())?;
        self.append(channel_id, token).await
    }

    async fn lock(&self, channel_id: &ChannelId) -> ChannelLock<'_> {
        let lock = self.locks.entry(channel_id.clone()).or_default().clone();

        ChannelLock {
            locks: &self.locks,
            channel_id: channel_id.clone(),
            guard: Some(lock.lock_owned().await),
        }
    }

    fn verify_sender(&self, envelope: &SenderEnvelope) -> Result<(), Error> {
        let sender = envelope.data.sender();
        let payload = envelope.data.to_bytes()?;

        match self
            .adapter
            .verify(sender, &payload, &envelope.sender_signature)
        {
            Ok(true) => Ok(()),
            _ => Err(Error::SignatureInvalid(sender)),
        }
    }

    /// Signs the core data with the sender signature appended.
    fn cosign(&self, envelope: &SenderEnvelope, prev_state: PrevState) -> Result<OracleToken, Error> {
        let action = envelope.signed_action();
        let oracle_signature = self.adapter.sign(&action.to_bytes()?)?;

        Ok(OracleToken {
            action,
            prev_state,
            oracle_signature,
        })
    }

    /// Stores the token and publishes its pointer as the latest of the channel.
    async fn append(&self, channel_id: &ChannelId, token: OracleToken) -> Result<Accepted, Error> {
        let naming = self.reconstructor.naming();
        let pointer = self.reconstructor.store().store(token.to_bytes()?).await?;

        if !naming.key_exists(channel_id).await? {
            naming.create_key(channel_id).await?;
        }
        naming.publish(channel_id, &pointer).await?;

        Ok(Accepted { token, pointer })
    }

    async fn published_pointer(
        &self,
        channel_id: &ChannelId,
    ) -> Result<Option<ContentPointer>, Error> {
        match self.reconstructor.naming().resolve(channel_id).await {
            Ok(pointer) => Ok(Some(pointer)),
            Err(storage::Error::NotFound(_)) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn channel_account(
        &self,
        channel_id: &ChannelId,
    ) -> Result<Option<ChannelAccount>, Error> {
        Ok(self
            .reconstructor
            .chain()
            .channel_account(self.reconstructor.program_id(), channel_id)
            .await?)
    }

    async fn ensure_open(&self, channel_id: &ChannelId) -> Result<(), Error> {
        match self.channel_account(channel_id).await? {
            Some(account) if account.is_open() => Ok(()),
            _ => Err(Error::ChannelNotOpen(channel_id.clone())),
        }
    }

    fn logged(
        &self,
        channel_id: &ChannelId,
        action: ActionKind,
        accepted: Result<Accepted, Error>,
    ) -> Result<Accepted, Error> {
        match &accepted {
            Ok(Accepted { pointer, .. }) => info!(
                self.logger,
                "Action accepted";
                "channel" => channel_id,
                "action" => %action,
                "cid" => pointer
            ),
            Err(err) if err.is_retryable() => error!(
                self.logger,
                "Action failed: {}", err;
                "channel" => channel_id,
                "action" => %action
            ),
            Err(err) => warn!(
                self.logger,
                "Action rejected: {}", err;
                "channel" => channel_id,
                "action" => %action
            ),
        }

        accepted
    }
}

/// The held lock of a channel.
///
/// Its entry is removed on drop unless another action waits for the lock.
struct ChannelLock<'a> {
    locks: &'a DashMap<ChannelId, Arc<Mutex<()>>>,
    channel_id: ChannelId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ChannelLock<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks
            .remove_if(&self.channel_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

fn fixed_action(envelope: &SenderEnvelope, expected: ActionKind) -> Result<&FixedAction, Error> {
    match (&envelope.data, expected) {
        (CoreActionData::Open(action), ActionKind::Open)
        | (CoreActionData::Join(action), ActionKind::Join)
        | (CoreActionData::Leave(action), ActionKind::Leave) => Ok(action),
        (data, expected) => Err(Error::InvalidAction {
            expected,
            actual: data.action(),
        }),
    }
}

fn ensure_genesis(envelope: &SenderEnvelope) -> Result<(), Error> {
    match &envelope.prev_state {
        PrevState::Genesis => Ok(()),
        actual => Err(Error::InvalidPrevState {
            expected: PrevState::Genesis,
            actual: actual.clone(),
        }),
    }
}

fn ensure_links_to(envelope: &SenderEnvelope, current: &ContentPointer) -> Result<(), Error> {
    match envelope.prev_state.pointer() {
        Some(pointer) if pointer == current => Ok(()),
        _ => Err(stale_prev_state(current, &envelope.prev_state)),
    }
}

/// Only the stakeholder can move its own deposit and it cannot be empty.
fn ensure_own_deposit(action: &FixedAction) -> Result<(), Error> {
    if action.sender != action.address {
        return Err(Error::SenderMismatch {
            sender: action.sender,
            address: action.address,
        });
    }

    if action.balance == 0 {
        return Err(Error::InvalidBalance);
    }

    Ok(())
}
