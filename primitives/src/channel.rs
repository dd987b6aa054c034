use borsh::{BorshDeserialize, BorshSerialize};
use parse_display::Display;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

use crate::Address;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Channel id should be between 1 and 32 bytes long, got {0}")]
    ChannelIdLength(usize),
    #[error("Decoding account data: {0}")]
    AccountData(#[from] std::io::Error),
    #[error("Unknown channel status {0}")]
    UnknownChannelStatus(u8),
    #[error("Unknown stakeholder status {0}")]
    UnknownStakeholderStatus(u8),
}

/// The identifier of a channel.
///
/// It is used as the seed of the channel's program derived account
/// and as the key name for the channel in the naming service,
/// so it can be at most [`ChannelId::MAX_LENGTH`] bytes long.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChannelId(String);

impl ChannelId {
    /// The maximum length of a single program derived address seed.
    pub const MAX_LENGTH: usize = 32;

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChannelId({})", self.0)
    }
}

impl slog::Value for ChannelId {
    fn serialize(
        &self,
        _record: &slog::Record<'_>,
        key: slog::Key,
        serializer: &mut dyn slog::Serializer,
    ) -> slog::Result {
        serializer.emit_str(key, &self.0)
    }
}

impl TryFrom<String> for ChannelId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.len() {
            1..=Self::MAX_LENGTH => Ok(Self(value)),
            len => Err(Error::ChannelIdLength(len)),
        }
    }
}

impl TryFrom<&str> for ChannelId {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::try_from(value.to_string())
    }
}

impl FromStr for ChannelId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s)
    }
}

impl From<ChannelId> for String {
    fn from(channel_id: ChannelId) -> Self {
        channel_id.0
    }
}

impl AsRef<str> for ChannelId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The lifecycle of a channel as tracked by the on-chain program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[display(style = "camelCase")]
pub enum ChannelStatus {
    Uninitialized = 0,
    Open = 1,
    Closed = 2,
}

impl TryFrom<u8> for ChannelStatus {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Uninitialized),
            1 => Ok(Self::Open),
            2 => Ok(Self::Closed),
            status => Err(Error::UnknownChannelStatus(status)),
        }
    }
}

/// The status of a stakeholder account of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[display(style = "camelCase")]
pub enum StakeholderStatus {
    Undefined = 0,
    Invited = 1,
    Active = 2,
    /// The stakeholder left the channel.
    Inactive = 3,
}

impl TryFrom<u8> for StakeholderStatus {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Undefined),
            1 => Ok(Self::Invited),
            2 => Ok(Self::Active),
            3 => Ok(Self::Inactive),
            status => Err(Error::UnknownStakeholderStatus(status)),
        }
    }
}

#[derive(BorshSerialize, BorshDeserialize)]
struct ChannelAccountLayout {
    channel_id: String,
    oracle_address: [u8; 32],
    current_status: u8,
    num_of_stakeholders: u8,
}

#[derive(BorshSerialize, BorshDeserialize)]
struct OracleAccountLayout {
    oracle_address: [u8; 32],
    oracle_status: bool,
}

#[derive(BorshSerialize, BorshDeserialize)]
struct StakeholderAccountLayout {
    stakeholder_address: [u8; 32],
    balance: u64,
    status: u8,
}

/// The account of a channel, owned by the on-chain program at the
/// channel's program derived address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelAccount {
    pub channel_id: String,
    pub oracle_address: Address,
    pub current_status: ChannelStatus,
    pub num_of_stakeholders: u8,
}

impl ChannelAccount {
    /// Accounts are allocated with a fixed size, the data may be followed by zero padding.
    pub fn from_account_data(mut data: &[u8]) -> Result<Self, Error> {
        let layout = ChannelAccountLayout::deserialize(&mut data)?;

        Ok(Self {
            channel_id: layout.channel_id,
            oracle_address: Address::new(layout.oracle_address),
            current_status: layout.current_status.try_into()?,
            num_of_stakeholders: layout.num_of_stakeholders,
        })
    }

    pub fn to_account_data(&self) -> Result<Vec<u8>, Error> {
        let layout = ChannelAccountLayout {
            channel_id: self.channel_id.clone(),
            oracle_address: self.oracle_address.to_bytes(),
            current_status: self.current_status as u8,
            num_of_stakeholders: self.num_of_stakeholders,
        };

        Ok(layout.try_to_vec()?)
    }

    pub fn is_open(&self) -> bool {
        self.current_status == ChannelStatus::Open
    }
}

/// The account of a single stakeholder in a channel, stored at the
/// program derived address of `(channel id, stakeholder)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakeholderAccount {
    pub stakeholder_address: Address,
    pub balance: u64,
    pub status: StakeholderStatus,
}

impl StakeholderAccount {
    pub fn from_account_data(mut data: &[u8]) -> Result<Self, Error> {
        let layout = StakeholderAccountLayout::deserialize(&mut data)?;

        Ok(Self {
            stakeholder_address: Address::new(layout.stakeholder_address),
            balance: layout.balance,
            status: layout.status.try_into()?,
        })
    }

    pub fn to_account_data(&self) -> Result<Vec<u8>, Error> {
        let layout = StakeholderAccountLayout {
            stakeholder_address: self.stakeholder_address.to_bytes(),
            balance: self.balance,
            status: self.status as u8,
        };

        Ok(layout.try_to_vec()?)
    }
}

/// The registration of an oracle with the program, stored at the
/// program derived address of the oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OracleAccount {
    pub oracle_address: Address,
    /// Every `ModifyOracle` instruction toggles the status.
    pub oracle_status: bool,
}

impl OracleAccount {
    pub fn from_account_data(mut data: &[u8]) -> Result<Self, Error> {
        let layout = OracleAccountLayout::deserialize(&mut data)?;

        Ok(Self {
            oracle_address: Address::new(layout.oracle_address),
            oracle_status: layout.oracle_status,
        })
    }

    pub fn to_account_data(&self) -> Result<Vec<u8>, Error> {
        let layout = OracleAccountLayout {
            oracle_address: self.oracle_address.to_bytes(),
            oracle_status: self.oracle_status,
        };

        Ok(layout.try_to_vec()?)
    }
}
