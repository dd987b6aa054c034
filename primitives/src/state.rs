//! The off-chain balances of a channel.
//!
//! A [`ChannelState`] is never stored, it is always replayed from the
//! channel history, oldest token first.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{token::CoreActionData, Address};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub address: Address,
    pub balance: u64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("Participant {0} is not part of the channel")]
    ParticipantNotFound(Address),
    #[error("Insufficient balance of {sender}: has {balance} but transfers {amount}")]
    InsufficientBalance {
        sender: Address,
        balance: u64,
        amount: u64,
    },
    #[error("Transfer amount should be greater than 0")]
    ZeroAmount,
    #[error("Cannot transfer to self ({0})")]
    SelfTransfer(Address),
    #[error("Balance of {0} overflows")]
    BalanceOverflow(Address),
}

/// Balances of the channel participants, ordered by insertion.
///
/// Addresses are unique, as the state can only be changed through its methods.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelState(Vec<Participant>);

impl ChannelState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replays the actions, oldest first, into an empty state.
    pub fn replay<'a>(
        actions: impl IntoIterator<Item = &'a CoreActionData>,
    ) -> Result<Self, Error> {
        actions
            .into_iter()
            .try_fold(Self::new(), |mut state, action| {
                state.apply(action)?;
                Ok(state)
            })
    }

    /// - Open sets the balance of the opener
    /// - Update overwrites the balance of every listed participant
    /// - Leave removes the participant
    /// - Join adds to the balance of a returning participant or inserts a new one
    pub fn apply(&mut self, action: &CoreActionData) -> Result<(), Error> {
        match action {
            CoreActionData::Open(open) => self.set(open.address, open.balance),
            CoreActionData::Update(update) => {
                for participant in &update.participants {
                    self.set(participant.address, participant.balance);
                }
            }
            CoreActionData::Leave(leave) => {
                self.remove(&leave.address);
            }
            CoreActionData::Join(join) => self.deposit(join.address, join.balance)?,
        }

        Ok(())
    }

    pub fn get(&self, address: &Address) -> Option<u64> {
        self.0
            .iter()
            .find(|participant| &participant.address == address)
            .map(|participant| participant.balance)
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.get(address).is_some()
    }

    pub fn set(&mut self, address: Address, balance: u64) {
        match self.0.iter_mut().find(|p| p.address == address) {
            Some(participant) => participant.balance = balance,
            None => self.0.push(Participant { address, balance }),
        }
    }

    pub fn deposit(&mut self, address: Address, amount: u64) -> Result<(), Error> {
        match self.0.iter_mut().find(|p| p.address == address) {
            Some(participant) => {
                participant.balance = participant
                    .balance
                    .checked_add(amount)
                    .ok_or(Error::BalanceOverflow(address))?;
            }
            None => self.0.push(Participant {
                address,
                balance: amount,
            }),
        }

        Ok(())
    }

    pub fn remove(&mut self, address: &Address) -> Option<u64> {
        let index = self.0.iter().position(|p| &p.address == address)?;

        Some(self.0.remove(index).balance)
    }

    /// The post-state of moving `amount` from `sender` to `receiver`.
    pub fn transfer(
        &self,
        sender: &Address,
        receiver: &Address,
        amount: u64,
    ) -> Result<Self, Error> {
        if amount == 0 {
            return Err(Error::ZeroAmount);
        }
        if sender == receiver {
            return Err(Error::SelfTransfer(*sender));
        }

        let balance = self
            .get(sender)
            .ok_or(Error::ParticipantNotFound(*sender))?;
        if !self.contains(receiver) {
            return Err(Error::ParticipantNotFound(*receiver));
        }
        if balance < amount {
            return Err(Error::InsufficientBalance {
                sender: *sender,
                balance,
                amount,
            });
        }

        let mut post_state = self.clone();
        post_state.set(*sender, balance - amount);
        post_state.deposit(*receiver, amount)?;

        Ok(post_state)
    }

    pub fn total(&self) -> u128 {
        self.0.iter().map(|p| u128::from(p.balance)).sum()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn participants(&self) -> &[Participant] {
        &self.0
    }

    pub fn into_participants(self) -> Vec<Participant> {
        self.0
    }
}
