//! The on-chain side of a channel: program derived addresses, the program
//! instructions anchoring channel events and the transactions carrying them.
//!
//! Instructions, messages and transactions are the `solana-program` and
//! `solana-sdk` types, addresses convert to and from a [`Pubkey`](solana_program::pubkey::Pubkey).
use async_trait::async_trait;
use thiserror::Error;

use crate::{
    channel::{ChannelAccount, Error as AccountError, OracleAccount, StakeholderAccount},
    Address, ChannelId, Signature,
};

pub use self::instruction::{Ed25519Verification, ProgramInstruction};
pub use solana_program::{
    hash::Hash as Blockhash,
    instruction::{AccountMeta, Instruction},
    message::Message,
};
pub use solana_sdk::transaction::Transaction;

pub mod instruction;
pub mod pda;

/// Compiles the instructions into a transaction paid and signed by `payer` alone.
pub fn transaction<E>(
    instructions: &[Instruction],
    payer: &Address,
    blockhash: &Blockhash,
    sign: impl FnOnce(&[u8]) -> Result<Signature, E>,
) -> Result<Transaction, E> {
    let message = Message::new_with_blockhash(instructions, Some(&(*payer).into()), blockhash);
    let signature = sign(&message.serialize())?;

    Ok(Transaction {
        signatures: vec![signature.into()],
        message,
    })
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("RPC: {0}")]
    Rpc(String),
    #[error("Chain request timed out")]
    Timeout,
    #[error("Transaction {signature} failed: {reason}")]
    SubmissionFailed { signature: String, reason: String },
    #[error("Confirmation of transaction {0} timed out")]
    ConfirmationTimeout(String),
    #[error("Account data: {0}")]
    AccountData(#[from] AccountError),
    #[error("Program derived address: {0}")]
    Pda(#[from] pda::Error),
    #[error("Instruction: {0}")]
    Instruction(#[from] instruction::Error),
}

impl Error {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Rpc(_)
                | Error::Timeout
                | Error::SubmissionFailed { .. }
                | Error::ConfirmationTimeout(_)
        )
    }
}

#[async_trait]
pub trait ChainReader: Send + Sync {
    /// The data of an account or `None` if the account does not exist.
    async fn account_data(&self, address: &Address) -> Result<Option<Vec<u8>>, Error>;

    async fn channel_account(
        &self,
        program_id: &Address,
        channel_id: &ChannelId,
    ) -> Result<Option<ChannelAccount>, Error> {
        let (address, _bump) = pda::channel_address(program_id, channel_id)?;

        match self.account_data(&address).await? {
            Some(data) => Ok(Some(ChannelAccount::from_account_data(&data)?)),
            None => Ok(None),
        }
    }

    async fn stakeholder_account(
        &self,
        program_id: &Address,
        channel_id: &ChannelId,
        stakeholder: &Address,
    ) -> Result<Option<StakeholderAccount>, Error> {
        let (address, _bump) = pda::stakeholder_address(program_id, channel_id, stakeholder)?;

        match self.account_data(&address).await? {
            Some(data) => Ok(Some(StakeholderAccount::from_account_data(&data)?)),
            None => Ok(None),
        }
    }

    async fn oracle_account(
        &self,
        program_id: &Address,
        oracle: &Address,
    ) -> Result<Option<OracleAccount>, Error> {
        let (address, _bump) = pda::oracle_address(program_id, oracle)?;

        match self.account_data(&address).await? {
            Some(data) => Ok(Some(OracleAccount::from_account_data(&data)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
pub trait ChainWriter: ChainReader {
    async fn latest_blockhash(&self) -> Result<Blockhash, Error>;

    /// Submits the signed transaction and waits for its confirmation.
    ///
    /// Returns the transaction signature.
    async fn send_and_confirm(&self, transaction: &Transaction) -> Result<Signature, Error>;
}
