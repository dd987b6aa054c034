//! Testing utilities for the Oracle
use std::sync::Arc;

use adapter::{
    dummy::{DummyChain, MemoryNaming, MemoryStore},
    ed25519::{Ed25519, UnlockedWallet},
    test_util::{keypair_adapter, KeypairAdapter, ORACLE_SECRET},
};
use primitives::{
    chain::pda,
    history::DEFAULT_MAX_DEPTH,
    test_util::PROGRAM_ID,
    util::logging::discard_logger,
    Address, ChannelAccount, ChannelId, ChannelStatus, CoreActionData, PrevState,
    Reconstructor, SenderEnvelope, StakeholderAccount, StakeholderStatus,
};

use crate::Oracle;

pub type DummyOracle = Oracle<Ed25519<UnlockedWallet>, MemoryStore, MemoryNaming, DummyChain>;

/// The Oracle and handles to its in-memory collaborators.
pub struct Setup {
    pub oracle: Arc<DummyOracle>,
    pub store: MemoryStore,
    pub naming: MemoryNaming,
    pub chain: DummyChain,
}

/// An Oracle signing with the `ORACLE` keypair over in-memory collaborators.
pub fn setup_oracle() -> Setup {
    let store = MemoryStore::new();
    let naming = MemoryNaming::new();
    let chain = DummyChain::new(*PROGRAM_ID);

    let reconstructor = Reconstructor::new(
        Arc::new(store.clone()),
        Arc::new(naming.clone()),
        Arc::new(chain.clone()),
        *PROGRAM_ID,
        DEFAULT_MAX_DEPTH,
        discard_logger(),
    );
    let oracle = Oracle::new(keypair_adapter(&ORACLE_SECRET), reconstructor, discard_logger());

    Setup {
        oracle: Arc::new(oracle),
        store,
        naming,
        chain,
    }
}

pub fn sign_envelope(
    sender: &KeypairAdapter,
    data: CoreActionData,
    prev_state: PrevState,
) -> SenderEnvelope {
    let payload = data.to_bytes().expect("Should encode the core data");
    let sender_signature = sender.sign(&payload).expect("Should sign");

    SenderEnvelope {
        data,
        prev_state,
        sender_signature,
    }
}

/// Writes the accounts of an anchored Open directly, bypassing the program.
pub fn settle_open(chain: &DummyChain, channel_id: &ChannelId, opener: Address, balance: u64) {
    let (channel_pda, _) = pda::channel_address(&PROGRAM_ID, channel_id).expect("Valid seeds");
    let (stakeholder_pda, _) =
        pda::stakeholder_address(&PROGRAM_ID, channel_id, &opener).expect("Valid seeds");

    let channel = ChannelAccount {
        channel_id: channel_id.to_string(),
        oracle_address: keypair_adapter(&ORACLE_SECRET).whoami(),
        current_status: ChannelStatus::Open,
        num_of_stakeholders: 1,
    };
    let stakeholder = StakeholderAccount {
        stakeholder_address: opener,
        balance,
        status: StakeholderStatus::Active,
    };

    chain.set_account(channel_pda, channel.to_account_data().expect("Should encode"));
    chain.set_account(
        stakeholder_pda,
        stakeholder.to_account_data().expect("Should encode"),
    );
}
