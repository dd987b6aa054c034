//! In-memory [`ContentStore`], [`NamingService`] and chain clients intended for testing.
//!
//! The [`DummyChain`] interprets the channel program instructions the same way
//! the deployed program does, including checking the oracle signature through
//! the Ed25519 verification instruction preceding each anchored token.
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use dashmap::DashMap;
use primitives::{
    chain::{
        pda, AccountMeta, Blockhash, ChainReader, ChainWriter, Ed25519Verification,
        Error as ChainError, Instruction, Message, ProgramInstruction, Transaction,
    },
    channel::{
        ChannelAccount, ChannelStatus, OracleAccount, StakeholderAccount, StakeholderStatus,
    },
    storage::{ContentStore, Error, NameKey, NamingService},
    token::FixedAction,
    Address, ChannelId, ContentPointer, CoreActionData, OracleToken, Signature,
};
use sha2::{Digest, Sha256};
use solana_sdk::{
    ed25519_instruction, ed25519_program, feature_set::FeatureSet, hash::hash,
    pubkey::Pubkey, sanitize::Sanitize,
};

#[doc(inline)]
pub use self::program::ProgramError;

/// Content pointers are the hex encoded SHA-256 of the stored bytes.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    contents: Arc<DashMap<ContentPointer, Vec<u8>>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every following call fails with [`Error::Unavailable`] until set back to `false`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.contents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }

    fn ensure_available(&self) -> Result<(), Error> {
        match self.unavailable.load(Ordering::SeqCst) {
            true => Err(Error::Unavailable("memory store is offline".into())),
            false => Ok(()),
        }
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn store(&self, bytes: Vec<u8>) -> Result<ContentPointer, Error> {
        self.ensure_available()?;

        let pointer = hex::encode(Sha256::digest(&bytes))
            .parse::<ContentPointer>()
            .map_err(|err| Error::InvalidResponse(err.to_string()))?;
        self.contents.insert(pointer.clone(), bytes);

        Ok(pointer)
    }

    async fn fetch(&self, pointer: &ContentPointer) -> Result<Vec<u8>, Error> {
        self.ensure_available()?;

        self.contents
            .get(pointer)
            .map(|bytes| bytes.value().clone())
            .ok_or_else(|| Error::NotFound(pointer.to_string()))
    }
}

/// A key without a published pointer resolves to [`Error::NotFound`].
#[derive(Debug, Clone, Default)]
pub struct MemoryNaming {
    names: Arc<DashMap<ChannelId, Option<ContentPointer>>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryNaming {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every following call fails with [`Error::Unavailable`] until set back to `false`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<(), Error> {
        match self.unavailable.load(Ordering::SeqCst) {
            true => Err(Error::Unavailable("memory naming is offline".into())),
            false => Ok(()),
        }
    }
}

#[async_trait]
impl NamingService for MemoryNaming {
    async fn create_key(&self, name: &ChannelId) -> Result<NameKey, Error> {
        self.ensure_available()?;

        self.names.entry(name.clone()).or_insert(None);

        Ok(NameKey {
            name: name.to_string(),
            id: format!("key-{name}"),
        })
    }

    async fn key_exists(&self, name: &ChannelId) -> Result<bool, Error> {
        self.ensure_available()?;

        Ok(self.names.contains_key(name))
    }

    async fn publish(&self, name: &ChannelId, pointer: &ContentPointer) -> Result<(), Error> {
        self.ensure_available()?;

        match self.names.get_mut(name) {
            Some(mut published) => {
                *published = Some(pointer.clone());
                Ok(())
            }
            None => Err(Error::NotFound(format!("key {name}"))),
        }
    }

    async fn resolve(&self, name: &ChannelId) -> Result<ContentPointer, Error> {
        self.ensure_available()?;

        self.names
            .get(name)
            .and_then(|published| published.value().clone())
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }
}

/// A simulated chain with the channel program deployed at `program_id`.
#[derive(Debug, Clone)]
pub struct DummyChain {
    program_id: Address,
    accounts: Arc<DashMap<Address, Vec<u8>>>,
    /// Confirmed transactions
    transactions: Arc<DashMap<Signature, Transaction>>,
    slot: Arc<AtomicU64>,
    fail_next: Arc<AtomicBool>,
}

impl DummyChain {
    pub fn new(program_id: Address) -> Self {
        Self {
            program_id,
            accounts: Default::default(),
            transactions: Default::default(),
            slot: Default::default(),
            fail_next: Default::default(),
        }
    }

    pub fn program_id(&self) -> Address {
        self.program_id
    }

    /// The next submitted transaction fails to confirm without being applied.
    pub fn fail_next_submission(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn set_account(&self, address: Address, data: Vec<u8>) {
        self.accounts.insert(address, data);
    }

    pub fn transaction(&self, signature: &Signature) -> Option<Transaction> {
        self.transactions.get(signature).map(|tx| tx.value().clone())
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    fn verify_signatures(transaction: &Transaction) -> Result<(), ProgramError> {
        Sanitize::sanitize(transaction).map_err(|err| ProgramError::Malformed(err.to_string()))?;

        transaction
            .verify()
            .map_err(|err| ProgramError::Signatures(err.to_string()))
    }

    fn execute(&self, transaction: &Transaction) -> Result<(), ProgramError> {
        Self::verify_signatures(transaction)?;

        let instructions = decompile(&transaction.message);
        let mut staged = program::Staged::new(&self.accounts);

        for (index, instruction) in instructions.iter().enumerate() {
            if instruction.program_id == ed25519_program::id() {
                ed25519_instruction::verify(
                    &instruction.data,
                    &[&instruction.data],
                    &FeatureSet::all_enabled(),
                )
                .map_err(|_| ProgramError::Ed25519Verification)?;
                continue;
            }

            if instruction.program_id != Pubkey::from(self.program_id) {
                return Err(ProgramError::UnknownProgram(instruction.program_id.into()));
            }

            let preceding = index
                .checked_sub(1)
                .and_then(|preceding| instructions.get(preceding));
            program::process(&self.program_id, &mut staged, instruction, preceding)?;
        }

        staged.commit();

        Ok(())
    }
}

/// The instructions of a sanitized message, with their account metas.
fn decompile(message: &Message) -> Vec<Instruction> {
    message
        .instructions
        .iter()
        .map(|compiled| {
            let accounts = compiled
                .accounts
                .iter()
                .map(|&index| {
                    let index = usize::from(index);

                    AccountMeta {
                        pubkey: message.account_keys[index],
                        is_signer: message.is_signer(index),
                        is_writable: message.is_writable(index),
                    }
                })
                .collect();

            Instruction {
                program_id: *compiled.program_id(&message.account_keys),
                accounts,
                data: compiled.data.clone(),
            }
        })
        .collect()
}

#[async_trait]
impl ChainReader for DummyChain {
    async fn account_data(&self, address: &Address) -> Result<Option<Vec<u8>>, ChainError> {
        Ok(self.accounts.get(address).map(|data| data.value().clone()))
    }
}

#[async_trait]
impl ChainWriter for DummyChain {
    async fn latest_blockhash(&self) -> Result<Blockhash, ChainError> {
        let slot = self.slot.fetch_add(1, Ordering::SeqCst);

        Ok(hash(&slot.to_le_bytes()))
    }

    async fn send_and_confirm(&self, transaction: &Transaction) -> Result<Signature, ChainError> {
        let signature: Signature = transaction
            .signatures
            .first()
            .copied()
            .unwrap_or_default()
            .into();
        let failed = |reason: String| ChainError::SubmissionFailed {
            signature: signature.to_base58(),
            reason,
        };

        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(failed("transaction was not confirmed".into()));
        }

        self.execute(transaction)
            .map_err(|err| failed(err.to_string()))?;
        self.transactions.insert(signature, transaction.clone());

        Ok(signature)
    }
}

mod program {
    use super::*;
    use primitives::chain::instruction::Error as InstructionError;
    use thiserror::Error;

    #[derive(Debug, Error)]
    pub enum ProgramError {
        #[error("Malformed transaction: {0}")]
        Malformed(String),
        #[error("Transaction signatures: {0}")]
        Signatures(String),
        #[error("Ed25519 signature verification failed")]
        Ed25519Verification,
        #[error("Unknown program {0}")]
        UnknownProgram(Address),
        #[error("Instruction: {0}")]
        Instruction(#[from] InstructionError),
        #[error("Invalid account data: {0}")]
        AccountData(#[from] primitives::channel::Error),
        #[error("Invalid seeds: {0}")]
        Pda(#[from] pda::Error),
        #[error("Failed to decode the token: {0}")]
        Token(#[from] primitives::token::Error),
        #[error("Wrong account provided: {0}")]
        WrongAccount(&'static str),
        #[error("Oracle signature of the token is not verified by the preceding instruction")]
        OracleNotVerified,
        #[error("{0}")]
        Rejected(&'static str),
    }

    /// Account writes of a transaction, applied only if every instruction succeeds.
    pub(super) struct Staged<'a> {
        accounts: &'a DashMap<Address, Vec<u8>>,
        writes: HashMap<Address, Vec<u8>>,
    }

    impl<'a> Staged<'a> {
        pub(super) fn new(accounts: &'a DashMap<Address, Vec<u8>>) -> Self {
            Self {
                accounts,
                writes: HashMap::new(),
            }
        }

        fn get(&self, address: &Address) -> Option<Vec<u8>> {
            self.writes
                .get(address)
                .cloned()
                .or_else(|| self.accounts.get(address).map(|data| data.value().clone()))
        }

        fn set(&mut self, address: Address, data: Vec<u8>) {
            self.writes.insert(address, data);
        }

        fn channel(&self, address: &Address) -> Result<Option<ChannelAccount>, ProgramError> {
            self.get(address)
                .map(|data| ChannelAccount::from_account_data(&data))
                .transpose()
                .map_err(Into::into)
        }

        fn stakeholder(
            &self,
            address: &Address,
        ) -> Result<Option<StakeholderAccount>, ProgramError> {
            self.get(address)
                .map(|data| StakeholderAccount::from_account_data(&data))
                .transpose()
                .map_err(Into::into)
        }

        fn oracle(&self, address: &Address) -> Result<Option<OracleAccount>, ProgramError> {
            self.get(address)
                .map(|data| OracleAccount::from_account_data(&data))
                .transpose()
                .map_err(Into::into)
        }

        pub(super) fn commit(self) {
            for (address, data) in self.writes {
                self.accounts.insert(address, data);
            }
        }
    }

    pub(super) fn process(
        program_id: &Address,
        staged: &mut Staged<'_>,
        instruction: &Instruction,
        preceding: Option<&Instruction>,
    ) -> Result<(), ProgramError> {
        let keys: Vec<Address> = instruction
            .accounts
            .iter()
            .map(|meta| meta.pubkey.into())
            .collect();
        let signer = instruction
            .accounts
            .first()
            .filter(|meta| meta.is_signer)
            .map(|meta| Address::from(meta.pubkey))
            .ok_or(ProgramError::Rejected("the first account should sign"))?;

        match ProgramInstruction::unpack(&instruction.data)? {
            ProgramInstruction::Open { token } => {
                anchor(program_id, staged, &keys, signer, &token, preceding, open)
            }
            ProgramInstruction::Join { token } => {
                anchor(program_id, staged, &keys, signer, &token, preceding, join)
            }
            ProgramInstruction::Leave { token } => {
                anchor(program_id, staged, &keys, signer, &token, preceding, leave)
            }
            ProgramInstruction::Invite {
                channel_id,
                invitee,
            } => invite(program_id, staged, &keys, signer, &channel_id, invitee),
            ProgramInstruction::ModifyOracle { oracle_address } => {
                modify_oracle(program_id, staged, &keys, signer, oracle_address)
            }
        }
    }

    struct Anchored<'t> {
        action: &'t FixedAction,
        token: &'t OracleToken,
        channel_pda: Address,
        stakeholder_pda: Address,
        oracle: Address,
    }

    /// Checks the accounts & the oracle signature of an Open, Join or Leave token.
    fn anchor(
        program_id: &Address,
        staged: &mut Staged<'_>,
        keys: &[Address],
        signer: Address,
        token: &[u8],
        preceding: Option<&Instruction>,
        apply: fn(&mut Staged<'_>, Anchored<'_>) -> Result<(), ProgramError>,
    ) -> Result<(), ProgramError> {
        let token = OracleToken::from_bytes(token)?;
        let action = match token.data() {
            CoreActionData::Open(action)
            | CoreActionData::Join(action)
            | CoreActionData::Leave(action) => action,
            CoreActionData::Update(_) => {
                return Err(ProgramError::Rejected("Update tokens are not anchored"))
            }
        };

        let [_, channel_pda, stakeholder_pda, oracle_pda, ..] = keys else {
            return Err(ProgramError::WrongAccount("not enough accounts"));
        };

        if *channel_pda != pda::channel_address(program_id, &action.channel_id)?.0 {
            return Err(ProgramError::WrongAccount("channel"));
        }
        if *stakeholder_pda != pda::stakeholder_address(program_id, &action.channel_id, &signer)?.0
        {
            return Err(ProgramError::WrongAccount("stakeholder"));
        }
        if signer != action.sender {
            return Err(ProgramError::Rejected(
                "Sender of this TX is not the same as defined in token",
            ));
        }
        if action.balance == 0 {
            return Err(ProgramError::Rejected("Provided amount is too low"));
        }

        let oracle = staged
            .oracle(oracle_pda)?
            .filter(|oracle| oracle.oracle_status)
            .ok_or(ProgramError::WrongAccount("oracle is not registered"))?;
        if *oracle_pda != pda::oracle_address(program_id, &oracle.oracle_address)?.0 {
            return Err(ProgramError::WrongAccount("oracle"));
        }

        let verification = preceding
            .map(Ed25519Verification::from_instruction)
            .transpose()?
            .ok_or(ProgramError::OracleNotVerified)?;
        if verification.pubkey != oracle.oracle_address
            || verification.signature != token.oracle_signature
            || verification.message != token.action.to_bytes()?
        {
            return Err(ProgramError::OracleNotVerified);
        }

        apply(
            staged,
            Anchored {
                action,
                token: &token,
                channel_pda: *channel_pda,
                stakeholder_pda: *stakeholder_pda,
                oracle: oracle.oracle_address,
            },
        )
    }

    fn open(staged: &mut Staged<'_>, anchored: Anchored<'_>) -> Result<(), ProgramError> {
        if !anchored.token.prev_state.is_genesis() {
            return Err(ProgramError::Rejected(
                "Wrong 'prev_state' defined within provided token",
            ));
        }
        if staged.stakeholder(&anchored.stakeholder_pda)?.is_some() {
            return Err(ProgramError::Rejected("Stakeholder is already part of channel"));
        }
        if staged.channel(&anchored.channel_pda)?.is_some() {
            return Err(ProgramError::Rejected(
                "Channel with provided 'channel_id' already exists",
            ));
        }

        let channel = ChannelAccount {
            channel_id: anchored.action.channel_id.to_string(),
            oracle_address: anchored.oracle,
            current_status: ChannelStatus::Open,
            num_of_stakeholders: 1,
        };
        let stakeholder = StakeholderAccount {
            stakeholder_address: anchored.action.address,
            balance: anchored.action.balance,
            status: StakeholderStatus::Active,
        };

        staged.set(anchored.channel_pda, channel.to_account_data()?);
        staged.set(anchored.stakeholder_pda, stakeholder.to_account_data()?);

        Ok(())
    }

    fn open_channel(
        staged: &Staged<'_>,
        anchored: &Anchored<'_>,
    ) -> Result<ChannelAccount, ProgramError> {
        let channel = staged
            .channel(&anchored.channel_pda)?
            .ok_or(ProgramError::Rejected("Channel does not exist"))?;

        if channel.channel_id != anchored.action.channel_id.as_str() {
            return Err(ProgramError::Rejected("Wrong Channel ID"));
        }
        if !channel.is_open() {
            return Err(ProgramError::Rejected("Channel is not opened"));
        }

        Ok(channel)
    }

    fn join(staged: &mut Staged<'_>, anchored: Anchored<'_>) -> Result<(), ProgramError> {
        let mut channel = open_channel(staged, &anchored)?;
        let mut stakeholder = staged
            .stakeholder(&anchored.stakeholder_pda)?
            .filter(|stakeholder| stakeholder.status == StakeholderStatus::Invited)
            .ok_or(ProgramError::Rejected("Stakeholder status != invited"))?;

        channel.num_of_stakeholders = channel
            .num_of_stakeholders
            .checked_add(1)
            .ok_or(ProgramError::Rejected("Too many stakeholders"))?;
        stakeholder.balance = anchored.action.balance;
        stakeholder.status = StakeholderStatus::Active;

        staged.set(anchored.channel_pda, channel.to_account_data()?);
        staged.set(anchored.stakeholder_pda, stakeholder.to_account_data()?);

        Ok(())
    }

    fn leave(staged: &mut Staged<'_>, anchored: Anchored<'_>) -> Result<(), ProgramError> {
        if anchored.token.prev_state.is_genesis() {
            return Err(ProgramError::Rejected(
                "Wrong 'prev_state' defined within provided token",
            ));
        }

        let mut channel = open_channel(staged, &anchored)?;
        let mut stakeholder = staged
            .stakeholder(&anchored.stakeholder_pda)?
            .filter(|stakeholder| stakeholder.status == StakeholderStatus::Active)
            .ok_or(ProgramError::Rejected("Stakeholder status != active"))?;

        stakeholder.balance = 0;
        stakeholder.status = StakeholderStatus::Inactive;
        channel.num_of_stakeholders = channel.num_of_stakeholders.saturating_sub(1);
        if channel.num_of_stakeholders == 0 {
            channel.current_status = ChannelStatus::Closed;
        }

        staged.set(anchored.channel_pda, channel.to_account_data()?);
        staged.set(anchored.stakeholder_pda, stakeholder.to_account_data()?);

        Ok(())
    }

    fn invite(
        program_id: &Address,
        staged: &mut Staged<'_>,
        keys: &[Address],
        inviter: Address,
        channel_id: &ChannelId,
        invitee: Address,
    ) -> Result<(), ProgramError> {
        let [_, channel_pda, inviter_pda, invitee_pda, ..] = keys else {
            return Err(ProgramError::WrongAccount("not enough accounts"));
        };

        if *channel_pda != pda::channel_address(program_id, channel_id)?.0 {
            return Err(ProgramError::WrongAccount("channel"));
        }
        if *inviter_pda != pda::stakeholder_address(program_id, channel_id, &inviter)?.0 {
            return Err(ProgramError::WrongAccount("inviter"));
        }
        if *invitee_pda != pda::stakeholder_address(program_id, channel_id, &invitee)?.0 {
            return Err(ProgramError::WrongAccount("invitee"));
        }

        staged
            .stakeholder(inviter_pda)?
            .filter(|stakeholder| stakeholder.status == StakeholderStatus::Active)
            .ok_or(ProgramError::Rejected("msg.sender is not part of the channel"))?;

        let channel = staged
            .channel(channel_pda)?
            .ok_or(ProgramError::Rejected("Channel does not exist"))?;
        if channel.channel_id != channel_id.as_str() {
            return Err(ProgramError::Rejected("Wrong Channel ID"));
        }
        if !channel.is_open() {
            return Err(ProgramError::Rejected("Channel status != opened"));
        }

        if staged.get(invitee_pda).is_some() {
            return Err(ProgramError::Rejected("Stakeholder is already part of channel"));
        }

        let invited = StakeholderAccount {
            stakeholder_address: invitee,
            balance: 0,
            status: StakeholderStatus::Invited,
        };
        staged.set(*invitee_pda, invited.to_account_data()?);

        Ok(())
    }

    /// Registers the oracle or toggles the status of a registered one.
    fn modify_oracle(
        program_id: &Address,
        staged: &mut Staged<'_>,
        keys: &[Address],
        signer: Address,
        oracle_address: Address,
    ) -> Result<(), ProgramError> {
        let [_, oracle_pda, ..] = keys else {
            return Err(ProgramError::WrongAccount("not enough accounts"));
        };

        if signer != oracle_address {
            return Err(ProgramError::Rejected("the oracle should sign"));
        }
        if *oracle_pda != pda::oracle_address(program_id, &oracle_address)?.0 {
            return Err(ProgramError::WrongAccount("oracle"));
        }

        let oracle = match staged.oracle(oracle_pda)? {
            Some(oracle) => OracleAccount {
                oracle_status: !oracle.oracle_status,
                ..oracle
            },
            None => OracleAccount {
                oracle_address,
                oracle_status: true,
            },
        };
        staged.set(*oracle_pda, oracle.to_account_data()?);

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_util::{
        keypair_adapter, KeypairAdapter, ALICE_SECRET, BOB_SECRET, ORACLE_SECRET,
    };
    use primitives::{
        chain::{self, instruction},
        test_util::{open_action, ALICE, BOB, CHANNEL_ID, ORACLE, PROGRAM_ID},
        PrevState,
    };
    use pretty_assertions::assert_eq;

    async fn submit(
        chain: &DummyChain,
        payer: &KeypairAdapter,
        instructions: &[Instruction],
    ) -> Result<Signature, ChainError> {
        let blockhash = chain.latest_blockhash().await?;
        let transaction = chain::transaction(instructions, &payer.whoami(), &blockhash, |message| {
            Ok::<_, ChainError>(payer.sign(message).expect("Should sign"))
        })?;

        chain.send_and_confirm(&transaction).await
    }

    async fn register_oracle(chain: &DummyChain) {
        let oracle = keypair_adapter(&ORACLE_SECRET);
        let register = instruction::modify_oracle(&PROGRAM_ID, &ORACLE).unwrap();

        submit(chain, &oracle, &[register])
            .await
            .expect("Should register the oracle");
    }

    /// An Open token of `ALICE` cosigned by `cosigner`.
    fn open_token(cosigner: &KeypairAdapter) -> OracleToken {
        let alice = keypair_adapter(&ALICE_SECRET);
        let data = open_action(&CHANNEL_ID, *ALICE, 100);
        let sender_signature = alice.sign(&data.to_bytes().unwrap()).unwrap();
        let action = data.with_signature(sender_signature);
        let oracle_signature = cosigner.sign(&action.to_bytes().unwrap()).unwrap();

        OracleToken {
            action,
            prev_state: PrevState::Genesis,
            oracle_signature,
        }
    }

    fn anchor_open(token: &OracleToken) -> Vec<Instruction> {
        let verify = Ed25519Verification {
            pubkey: *ORACLE,
            signature: token.oracle_signature,
            message: token.action.to_bytes().unwrap(),
        }
        .into_instruction();
        let open = instruction::channel_action(
            &PROGRAM_ID,
            ProgramInstruction::Open {
                token: token.to_bytes().unwrap(),
            },
            &CHANNEL_ID,
            &ALICE,
            &ORACLE,
        )
        .unwrap();

        vec![verify, open]
    }

    #[tokio::test]
    async fn memory_store_and_naming() {
        let store = MemoryStore::new();
        let naming = MemoryNaming::new();

        let pointer = store.store(vec![1, 2, 3]).await.expect("Should store");
        assert_eq!(64, pointer.as_str().len());
        assert_eq!(vec![1, 2, 3], store.fetch(&pointer).await.unwrap());
        assert!(matches!(
            store.fetch(&"unknown".parse().unwrap()).await,
            Err(Error::NotFound(_))
        ));

        assert!(!naming.key_exists(&CHANNEL_ID).await.unwrap());
        assert!(matches!(
            naming.publish(&CHANNEL_ID, &pointer).await,
            Err(Error::NotFound(_))
        ));

        naming.create_key(&CHANNEL_ID).await.unwrap();
        assert!(naming.key_exists(&CHANNEL_ID).await.unwrap());
        // nothing published yet
        assert!(matches!(
            naming.resolve(&CHANNEL_ID).await,
            Err(Error::NotFound(_))
        ));

        naming.publish(&CHANNEL_ID, &pointer).await.unwrap();
        assert_eq!(pointer, naming.resolve(&CHANNEL_ID).await.unwrap());

        store.set_unavailable(true);
        assert!(matches!(
            store.fetch(&pointer).await,
            Err(Error::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn anchors_an_open_token_verified_by_the_oracle() {
        let chain = DummyChain::new(*PROGRAM_ID);
        register_oracle(&chain).await;
        let alice = keypair_adapter(&ALICE_SECRET);

        let token = open_token(&keypair_adapter(&ORACLE_SECRET));
        submit(&chain, &alice, &anchor_open(&token))
            .await
            .expect("Should open the channel");

        let channel = chain
            .channel_account(&PROGRAM_ID, &CHANNEL_ID)
            .await
            .unwrap()
            .expect("Should be created");
        assert_eq!(ChannelStatus::Open, channel.current_status);
        assert_eq!(*ORACLE, channel.oracle_address);
        assert_eq!(1, channel.num_of_stakeholders);

        let stakeholder = chain
            .stakeholder_account(&PROGRAM_ID, &CHANNEL_ID, &ALICE)
            .await
            .unwrap()
            .expect("Should be created");
        assert_eq!(100, stakeholder.balance);
        assert_eq!(StakeholderStatus::Active, stakeholder.status);

        // opening the same channel again fails and changes nothing
        let again = submit(&chain, &alice, &anchor_open(&token)).await;
        assert!(matches!(again, Err(ChainError::SubmissionFailed { .. })));
        assert_eq!(2, chain.transaction_count());
    }

    #[tokio::test]
    async fn rejects_tokens_not_signed_by_the_registered_oracle() {
        let chain = DummyChain::new(*PROGRAM_ID);
        let alice = keypair_adapter(&ALICE_SECRET);
        let token = open_token(&keypair_adapter(&ORACLE_SECRET));

        // the oracle is not registered yet
        let unregistered = submit(&chain, &alice, &anchor_open(&token)).await;
        assert!(matches!(unregistered, Err(ChainError::SubmissionFailed { .. })));

        register_oracle(&chain).await;

        // without the verification instruction
        let anchor_only = anchor_open(&token).split_off(1);
        let unverified = submit(&chain, &alice, &anchor_only).await;
        assert!(matches!(unverified, Err(ChainError::SubmissionFailed { .. })));

        // cosigned by another keypair
        let forged = open_token(&keypair_adapter(&BOB_SECRET));
        let forged = submit(&chain, &alice, &anchor_open(&forged)).await;
        assert!(matches!(forged, Err(ChainError::SubmissionFailed { .. })));

        assert_eq!(
            None,
            chain.channel_account(&PROGRAM_ID, &CHANNEL_ID).await.unwrap()
        );
    }

    #[tokio::test]
    async fn invite_requires_an_active_inviter() {
        let chain = DummyChain::new(*PROGRAM_ID);
        register_oracle(&chain).await;
        let alice = keypair_adapter(&ALICE_SECRET);
        let bob = keypair_adapter(&BOB_SECRET);

        let token = open_token(&keypair_adapter(&ORACLE_SECRET));
        submit(&chain, &alice, &anchor_open(&token)).await.unwrap();

        let bob_invites = instruction::invite(&PROGRAM_ID, &CHANNEL_ID, &BOB, &ALICE).unwrap();
        assert!(submit(&chain, &bob, &[bob_invites]).await.is_err());

        let alice_invites = instruction::invite(&PROGRAM_ID, &CHANNEL_ID, &ALICE, &BOB).unwrap();
        submit(&chain, &alice, &[alice_invites.clone()])
            .await
            .expect("Should invite");

        let invited = chain
            .stakeholder_account(&PROGRAM_ID, &CHANNEL_ID, &BOB)
            .await
            .unwrap()
            .expect("Should be created");
        assert_eq!(StakeholderStatus::Invited, invited.status);

        // already invited
        assert!(submit(&chain, &alice, &[alice_invites]).await.is_err());
    }

    #[tokio::test]
    async fn failed_submissions_are_not_applied() {
        let chain = DummyChain::new(*PROGRAM_ID);
        let oracle = keypair_adapter(&ORACLE_SECRET);
        let register = instruction::modify_oracle(&PROGRAM_ID, &ORACLE).unwrap();

        chain.fail_next_submission();
        let failed = submit(&chain, &oracle, &[register.clone()]).await;
        assert!(matches!(&failed, Err(ChainError::SubmissionFailed { .. })));
        assert!(failed.unwrap_err().is_retryable());
        assert_eq!(None, chain.oracle_account(&PROGRAM_ID, &ORACLE).await.unwrap());

        submit(&chain, &oracle, &[register]).await.unwrap();
        assert_eq!(
            Some(OracleAccount {
                oracle_address: *ORACLE,
                oracle_status: true
            }),
            chain.oracle_account(&PROGRAM_ID, &ORACLE).await.unwrap()
        );
    }

    #[tokio::test]
    async fn transactions_need_the_payer_signature() {
        let chain = DummyChain::new(*PROGRAM_ID);
        let register = instruction::modify_oracle(&PROGRAM_ID, &ORACLE).unwrap();
        let alice = keypair_adapter(&ALICE_SECRET);
        // signed by another keypair
        let transaction =
            chain::transaction(&[register], &ORACLE, &Blockhash::default(), |message| {
                alice.sign(message)
            })
            .unwrap();

        let result = chain.send_and_confirm(&transaction).await;
        assert!(matches!(result, Err(ChainError::SubmissionFailed { .. })));

        // without any signature
        let mut unsigned = transaction;
        unsigned.signatures.clear();
        let result = chain.send_and_confirm(&unsigned).await;
        assert!(matches!(
            result,
            Err(ChainError::SubmissionFailed { reason, .. }) if reason.contains("Malformed")
        ));
        assert_eq!(0, chain.transaction_count());
    }
}
