//! Reconstruction of the channel state from the chain of oracle tokens.
//!
//! The naming service points to the latest token of a channel and every token
//! links to its predecessor with `prev_state`. The state only depends on the
//! tokens since the last Update (or the Open) as an Update lists every participant.
use std::{collections::HashSet, sync::Arc};

use slog::{debug, Logger};
use thiserror::Error;

use crate::{
    chain::{self, ChainReader},
    state::{self, ChannelState},
    storage::{self, ContentStore, NamingService},
    token::{self, CoreActionData, OracleToken},
    Address, ChannelId, ContentPointer, PrevState,
};

/// Default bound of the number of tokens walked for a single reconstruction.
pub const DEFAULT_MAX_DEPTH: usize = 10_000;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Malformed token {pointer}: {source}")]
    MalformedToken {
        pointer: ContentPointer,
        #[source]
        source: token::Error,
    },
    #[error("Channel {0} not found")]
    ChannelNotFound(ChannelId),
    #[error("Token {pointer} belongs to channel {actual} instead of {expected}")]
    ForeignToken {
        pointer: ContentPointer,
        expected: ChannelId,
        actual: ChannelId,
    },
    #[error("Token {0} links to genesis but is not an Open")]
    MissingOpen(ContentPointer),
    #[error("Opener {opener} of channel {channel_id} has no stakeholder account")]
    IncompleteChannel {
        channel_id: ChannelId,
        opener: Address,
    },
    #[error("History is longer than {0} tokens")]
    ChainTooDeep(usize),
    #[error("History links back to {0}")]
    Cycle(ContentPointer),
    #[error("Replaying history: {0}")]
    Replay(#[from] state::Error),
    #[error("Storage: {0}")]
    Storage(#[from] storage::Error),
    #[error("Chain: {0}")]
    Chain(#[from] chain::Error),
}

impl Error {
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Storage(err) => err.is_retryable(),
            Error::Chain(err) => err.is_retryable(),
            _ => false,
        }
    }
}

/// A token of the channel history and the pointer it is stored at.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub pointer: ContentPointer,
    pub token: OracleToken,
}

/// The state of a channel as of the token at `pointer`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub pointer: ContentPointer,
    pub state: ChannelState,
}

pub struct Reconstructor<S, N, C> {
    store: Arc<S>,
    naming: Arc<N>,
    chain: Arc<C>,
    program_id: Address,
    max_depth: usize,
    logger: Logger,
}

impl<S, N, C> Clone for Reconstructor<S, N, C> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            naming: self.naming.clone(),
            chain: self.chain.clone(),
            program_id: self.program_id,
            max_depth: self.max_depth,
            logger: self.logger.clone(),
        }
    }
}

impl<S, N, C> Reconstructor<S, N, C>
where
    S: ContentStore,
    N: NamingService,
    C: ChainReader,
{
    pub fn new(
        store: Arc<S>,
        naming: Arc<N>,
        chain: Arc<C>,
        program_id: Address,
        max_depth: usize,
        logger: Logger,
    ) -> Self {
        Self {
            store,
            naming,
            chain,
            program_id,
            max_depth,
            logger,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn naming(&self) -> &Arc<N> {
        &self.naming
    }

    pub fn chain(&self) -> &Arc<C> {
        &self.chain
    }

    pub fn program_id(&self) -> &Address {
        &self.program_id
    }

    /// The pointer to the latest token of the channel.
    pub async fn latest_pointer(&self, channel_id: &ChannelId) -> Result<ContentPointer, Error> {
        match self.naming.resolve(channel_id).await {
            Ok(pointer) => Ok(pointer),
            Err(storage::Error::NotFound(_)) => Err(Error::ChannelNotFound(channel_id.clone())),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn fetch_token(&self, pointer: &ContentPointer) -> Result<OracleToken, Error> {
        let bytes = self.store.fetch(pointer).await?;

        OracleToken::from_bytes(&bytes).map_err(|source| Error::MalformedToken {
            pointer: pointer.clone(),
            source,
        })
    }

    /// The current state of the channel, resolving its latest pointer.
    pub async fn last_channel_state(&self, channel_id: &ChannelId) -> Result<Snapshot, Error> {
        self.reconstruct(channel_id, None).await
    }

    /// Reconstructs the channel state as of `pointer` or as of the latest token if `None`.
    pub async fn reconstruct(
        &self,
        channel_id: &ChannelId,
        pointer: Option<ContentPointer>,
    ) -> Result<Snapshot, Error> {
        let pointer = match pointer {
            Some(pointer) => pointer,
            None => self.latest_pointer(channel_id).await?,
        };

        let tokens = self.relevant_tokens(channel_id, &pointer).await?;
        let state = ChannelState::replay(tokens.iter().map(|entry| entry.token.data()))?;

        Ok(Snapshot { pointer, state })
    }

    /// The tokens, oldest first, from the last Update or the Open up to `pointer`.
    pub async fn relevant_tokens(
        &self,
        channel_id: &ChannelId,
        pointer: &ContentPointer,
    ) -> Result<Vec<HistoryEntry>, Error> {
        let mut tokens = self.walk(channel_id, pointer, true).await?;
        tokens.reverse();

        Ok(tokens)
    }

    /// Every token of the channel history, newest first.
    pub async fn history(&self, channel_id: &ChannelId) -> Result<Vec<HistoryEntry>, Error> {
        let pointer = self.latest_pointer(channel_id).await?;

        self.walk(channel_id, &pointer, false).await
    }

    /// Walks the `prev_state` links starting at `pointer` until the Open token,
    /// or until the first Update when `stop_at_update` is set.
    async fn walk(
        &self,
        channel_id: &ChannelId,
        pointer: &ContentPointer,
        stop_at_update: bool,
    ) -> Result<Vec<HistoryEntry>, Error> {
        let mut tokens = Vec::new();
        let mut visited = HashSet::new();
        let mut next = Some(pointer.clone());

        while let Some(pointer) = next.take() {
            if tokens.len() >= self.max_depth {
                return Err(Error::ChainTooDeep(self.max_depth));
            }
            if !visited.insert(pointer.clone()) {
                return Err(Error::Cycle(pointer));
            }

            let token = self.fetch_token(&pointer).await?;
            let data = token.data();

            if data.channel_id() != channel_id {
                return Err(Error::ForeignToken {
                    pointer,
                    expected: channel_id.clone(),
                    actual: data.channel_id().clone(),
                });
            }

            debug!(
                self.logger,
                "Fetched token";
                "channel" => channel_id,
                "action" => %data.action(),
                "cid" => &pointer
            );

            next = match (data, &token.prev_state) {
                (CoreActionData::Open(open), _) => {
                    if stop_at_update {
                        self.ensure_opener_settled(channel_id, &open.address)
                            .await?;
                    }
                    None
                }
                (CoreActionData::Update(_), _) if stop_at_update => None,
                (_, PrevState::Genesis) => return Err(Error::MissingOpen(pointer)),
                (_, PrevState::Pointer(prev)) => Some(prev.clone()),
            };

            tokens.push(HistoryEntry { pointer, token });
        }

        Ok(tokens)
    }

    async fn ensure_opener_settled(
        &self,
        channel_id: &ChannelId,
        opener: &Address,
    ) -> Result<(), Error> {
        match self
            .chain
            .stakeholder_account(&self.program_id, channel_id, opener)
            .await?
        {
            Some(_) => Ok(()),
            None => Err(Error::IncompleteChannel {
                channel_id: channel_id.clone(),
                opener: *opener,
            }),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        channel::{StakeholderAccount, StakeholderStatus},
        chain::pda,
        state::Participant,
        storage::NameKey,
        token::{FixedAction, UpdateAction},
        util::logging::discard_logger,
        Signature,
    };
    use async_trait::async_trait;
    use dashmap::DashMap;
    use pretty_assertions::assert_eq;

    const PROGRAM: Address = Address::new([42; 32]);
    const A: Address = Address::new([1; 32]);
    const B: Address = Address::new([2; 32]);

    #[derive(Default)]
    struct Fakes {
        tokens: DashMap<ContentPointer, Vec<u8>>,
        names: DashMap<ChannelId, ContentPointer>,
        accounts: DashMap<Address, Vec<u8>>,
    }

    #[async_trait]
    impl ContentStore for Fakes {
        async fn store(&self, bytes: Vec<u8>) -> Result<ContentPointer, storage::Error> {
            let pointer: ContentPointer = format!("t{}", self.tokens.len() + 1)
                .parse()
                .expect("Valid pointer");
            self.tokens.insert(pointer.clone(), bytes);
            Ok(pointer)
        }

        async fn fetch(&self, pointer: &ContentPointer) -> Result<Vec<u8>, storage::Error> {
            self.tokens
                .get(pointer)
                .map(|bytes| bytes.clone())
                .ok_or_else(|| storage::Error::NotFound(pointer.to_string()))
        }
    }

    #[async_trait]
    impl NamingService for Fakes {
        async fn create_key(&self, name: &ChannelId) -> Result<NameKey, storage::Error> {
            Ok(NameKey {
                name: name.to_string(),
                id: name.to_string(),
            })
        }

        async fn key_exists(&self, name: &ChannelId) -> Result<bool, storage::Error> {
            Ok(self.names.contains_key(name))
        }

        async fn publish(
            &self,
            name: &ChannelId,
            pointer: &ContentPointer,
        ) -> Result<(), storage::Error> {
            self.names.insert(name.clone(), pointer.clone());
            Ok(())
        }

        async fn resolve(&self, name: &ChannelId) -> Result<ContentPointer, storage::Error> {
            self.names
                .get(name)
                .map(|pointer| pointer.clone())
                .ok_or_else(|| storage::Error::NotFound(name.to_string()))
        }
    }

    #[async_trait]
    impl ChainReader for Fakes {
        async fn account_data(&self, address: &Address) -> Result<Option<Vec<u8>>, chain::Error> {
            Ok(self.accounts.get(address).map(|data| data.clone()))
        }
    }

    fn channel() -> ChannelId {
        "c1".parse().unwrap()
    }

    fn fixed(address: Address, balance: u64) -> FixedAction {
        FixedAction {
            channel_id: channel(),
            address,
            balance,
            sender: address,
        }
    }

    struct Setup {
        fakes: Arc<Fakes>,
        reconstructor: Reconstructor<Fakes, Fakes, Fakes>,
    }

    impl Setup {
        fn new(max_depth: usize) -> Self {
            let fakes = Arc::new(Fakes::default());
            let reconstructor = Reconstructor::new(
                fakes.clone(),
                fakes.clone(),
                fakes.clone(),
                PROGRAM,
                max_depth,
                discard_logger(),
            );

            Self {
                fakes,
                reconstructor,
            }
        }

        fn settle(&self, stakeholder: Address, balance: u64) {
            let (address, _) = pda::stakeholder_address(&PROGRAM, &channel(), &stakeholder).unwrap();
            let account = StakeholderAccount {
                stakeholder_address: stakeholder,
                balance,
                status: StakeholderStatus::Active,
            };
            self.fakes
                .accounts
                .insert(address, account.to_account_data().unwrap());
        }

        /// Stores the token after the current latest one and publishes it.
        async fn append(&self, data: CoreActionData) -> ContentPointer {
            let prev_state = match self.fakes.names.get(&channel()) {
                Some(pointer) => PrevState::Pointer(pointer.clone()),
                None => PrevState::Genesis,
            };
            self.append_with(data, prev_state).await
        }

        async fn append_with(&self, data: CoreActionData, prev_state: PrevState) -> ContentPointer {
            let token = OracleToken {
                action: data.with_signature(Signature::default()),
                prev_state,
                oracle_signature: Signature::default(),
            };
            let pointer = self.fakes.store(token.to_bytes().unwrap()).await.unwrap();
            self.fakes.publish(&channel(), &pointer).await.unwrap();
            pointer
        }
    }

    fn participants(entries: &[(Address, u64)]) -> Vec<Participant> {
        entries
            .iter()
            .map(|&(address, balance)| Participant { address, balance })
            .collect()
    }

    #[tokio::test]
    async fn reconstructs_and_is_idempotent() {
        let setup = Setup::new(DEFAULT_MAX_DEPTH);
        setup.settle(A, 100);

        setup.append(CoreActionData::Open(fixed(A, 100))).await;
        setup.append(CoreActionData::Join(fixed(B, 50))).await;
        setup
            .append(CoreActionData::Update(UpdateAction {
                channel_id: channel(),
                participants: participants(&[(A, 70), (B, 80)]),
                sender: A,
            }))
            .await;
        let latest = setup.append(CoreActionData::Leave(fixed(A, 70))).await;

        let first = setup
            .reconstructor
            .last_channel_state(&channel())
            .await
            .expect("Should reconstruct");
        let second = setup
            .reconstructor
            .reconstruct(&channel(), Some(latest.clone()))
            .await
            .expect("Should reconstruct");

        assert_eq!(latest, first.pointer);
        assert_eq!(participants(&[(B, 80)]), first.state.participants());
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn walk_stops_at_the_last_update() {
        let setup = Setup::new(DEFAULT_MAX_DEPTH);
        setup.settle(A, 100);

        let open = setup.append(CoreActionData::Open(fixed(A, 100))).await;
        setup.append(CoreActionData::Join(fixed(B, 50))).await;
        setup
            .append(CoreActionData::Update(UpdateAction {
                channel_id: channel(),
                participants: participants(&[(A, 60), (B, 90)]),
                sender: A,
            }))
            .await;
        setup.append(CoreActionData::Join(fixed(A, 5))).await;

        // the tokens before the Update are not needed anymore
        setup.fakes.tokens.remove(&open);

        let tokens = setup
            .reconstructor
            .relevant_tokens(&channel(), &setup.reconstructor.latest_pointer(&channel()).await.unwrap())
            .await
            .expect("Should walk");
        assert_eq!(2, tokens.len());
        assert_eq!(crate::token::ActionKind::Update, tokens[0].token.data().action());

        let snapshot = setup
            .reconstructor
            .last_channel_state(&channel())
            .await
            .unwrap();
        assert_eq!(participants(&[(A, 65), (B, 90)]), snapshot.state.participants());

        // while the full history needs every token
        assert!(matches!(
            setup.reconstructor.history(&channel()).await,
            Err(Error::Storage(storage::Error::NotFound(_)))
        ));
    }

    #[tokio::test]
    async fn full_history_is_newest_first() {
        let setup = Setup::new(DEFAULT_MAX_DEPTH);
        setup.settle(A, 100);

        let open = setup.append(CoreActionData::Open(fixed(A, 100))).await;
        let join = setup.append(CoreActionData::Join(fixed(B, 50))).await;

        let history = setup.reconstructor.history(&channel()).await.unwrap();
        let pointers: Vec<_> = history.into_iter().map(|entry| entry.pointer).collect();

        assert_eq!(vec![join, open], pointers);
    }

    #[tokio::test]
    async fn unsettled_opener_is_an_incomplete_channel() {
        let setup = Setup::new(DEFAULT_MAX_DEPTH);
        setup.append(CoreActionData::Open(fixed(A, 100))).await;

        assert!(matches!(
            setup.reconstructor.last_channel_state(&channel()).await,
            Err(Error::IncompleteChannel { opener, .. }) if opener == A
        ));
    }

    #[tokio::test]
    async fn unknown_channel() {
        let setup = Setup::new(DEFAULT_MAX_DEPTH);

        assert!(matches!(
            setup.reconstructor.last_channel_state(&channel()).await,
            Err(Error::ChannelNotFound(_))
        ));
    }

    #[tokio::test]
    async fn depth_is_bounded() {
        let setup = Setup::new(3);
        setup.settle(A, 100);

        setup.append(CoreActionData::Open(fixed(A, 100))).await;
        for _ in 0..3 {
            setup.append(CoreActionData::Join(fixed(B, 1))).await;
        }

        assert!(matches!(
            setup.reconstructor.last_channel_state(&channel()).await,
            Err(Error::ChainTooDeep(3))
        ));
    }

    #[tokio::test]
    async fn cyclic_history_is_rejected() {
        let setup = Setup::new(DEFAULT_MAX_DEPTH);

        // "t1" links to "t2" and "t2" links back to "t1"
        setup
            .append_with(CoreActionData::Join(fixed(B, 1)), "t2".parse().unwrap())
            .await;
        setup
            .append_with(CoreActionData::Join(fixed(A, 1)), "t1".parse().unwrap())
            .await;

        assert!(matches!(
            setup.reconstructor.last_channel_state(&channel()).await,
            Err(Error::Cycle(_))
        ));
    }

    #[tokio::test]
    async fn join_linking_to_genesis_is_rejected() {
        let setup = Setup::new(DEFAULT_MAX_DEPTH);
        setup.append(CoreActionData::Join(fixed(B, 1))).await;

        assert!(matches!(
            setup.reconstructor.last_channel_state(&channel()).await,
            Err(Error::MissingOpen(_))
        ));
    }

    #[tokio::test]
    async fn malformed_token() {
        let setup = Setup::new(DEFAULT_MAX_DEPTH);
        let pointer = setup.fakes.store(vec![1, 2, 3]).await.unwrap();
        setup.fakes.publish(&channel(), &pointer).await.unwrap();

        assert!(matches!(
            setup.reconstructor.last_channel_state(&channel()).await,
            Err(Error::MalformedToken { .. })
        ));
    }
}
