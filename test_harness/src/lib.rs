//! End-to-end channel scenarios: stakeholders drive their actions through the
//! Oracle and anchor them with the dummy channel program, all in memory.
use std::sync::Arc;

use adapter::test_util::{
    keypair_adapter, KeypairAdapter, ALICE_SECRET, BOB_SECRET, CAROL_SECRET,
};
use channel_client::{
    test_util::{setup_driver, DriverSetup, DummyDriver},
    Outcome,
};
use once_cell::sync::Lazy;
use oracle::test_util::DummyOracle;
use primitives::{
    history::HistoryEntry, Address, ChannelId, CoreActionData, Participant, Snapshot,
};

pub static ALICE_KEYPAIR: Lazy<KeypairAdapter> = Lazy::new(|| keypair_adapter(&ALICE_SECRET));
pub static BOB_KEYPAIR: Lazy<KeypairAdapter> = Lazy::new(|| keypair_adapter(&BOB_SECRET));
pub static CAROL_KEYPAIR: Lazy<KeypairAdapter> = Lazy::new(|| keypair_adapter(&CAROL_SECRET));

/// The channel of the scenarios.
pub static C1: Lazy<ChannelId> = Lazy::new(|| "c1".parse().expect("Valid channel id"));

/// A registered Oracle and a stakeholder client sharing the in-memory
/// content store, naming service and chain.
pub struct Harness {
    pub setup: DriverSetup,
}

impl Harness {
    pub async fn new() -> Self {
        Self {
            setup: setup_driver().await,
        }
    }

    pub fn driver(&self) -> &DummyDriver {
        &self.setup.driver
    }

    pub fn oracle(&self) -> &Arc<DummyOracle> {
        &self.setup.oracle.oracle
    }

    /// Invites `joiner` on behalf of `inviter` and joins with `amount`.
    pub async fn invite_and_join(
        &self,
        channel_id: &ChannelId,
        inviter: &KeypairAdapter,
        joiner: &KeypairAdapter,
        amount: u64,
    ) -> Outcome {
        self.driver()
            .invite(channel_id, inviter, joiner.whoami())
            .await
            .expect("Should invite");

        self.driver()
            .join(channel_id, joiner, amount)
            .await
            .expect("Should join")
    }

    pub async fn balances(&self, channel_id: &ChannelId) -> Vec<(Address, u64)> {
        let snapshot = self
            .driver()
            .state(channel_id)
            .await
            .expect("Should reconstruct");

        balances(&snapshot)
    }

    /// Every token of the channel, newest first.
    pub async fn history(&self, channel_id: &ChannelId) -> Vec<HistoryEntry> {
        self.oracle()
            .history(channel_id)
            .await
            .expect("Should walk the history")
    }
}

pub fn balances(snapshot: &Snapshot) -> Vec<(Address, u64)> {
    snapshot
        .state
        .participants()
        .iter()
        .map(|Participant { address, balance }| (*address, *balance))
        .collect()
}

/// The deposits of Open and Join tokens less the withdrawals of Leave tokens.
pub fn deposited(history: &[HistoryEntry]) -> u128 {
    history
        .iter()
        .fold(0_i128, |total, entry| match entry.token.data() {
            CoreActionData::Open(action) | CoreActionData::Join(action) => {
                total + i128::from(action.balance)
            }
            CoreActionData::Leave(action) => total - i128::from(action.balance),
            CoreActionData::Update(_) => total,
        })
        .try_into()
        .unwrap_or_default()
}
