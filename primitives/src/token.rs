//! Channel action tokens.
//!
//! A stakeholder signs the [`CoreActionData`] of an action and sends it to the
//! oracle in a [`SenderEnvelope`]. The oracle countersigns the core data *with*
//! the sender signature appended ([`SignedAction`]) and stores the resulting
//! [`OracleToken`], which links to the previous token of the channel through
//! its `prev_state`.
use parse_display::{Display, FromStr};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    channel::Error as ChannelIdError, ipfs::Error as PointerError, state::Participant, Address,
    ChannelId, PrevState, Signature,
};

pub use codec::Schema;

mod codec;

/// Every decoding failure of a token is a malformed token.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Token is empty or truncated")]
    Truncated,
    #[error("Unknown action tag {0}")]
    UnknownAction(u8),
    #[error("Expected {expected} bytes for the declared shape, got {actual}")]
    Length { expected: usize, actual: usize },
    #[error("Unexpected {0} trailing bytes")]
    TrailingBytes(usize),
    #[error("Update should list between 1 and 255 participants, got {0}")]
    ParticipantCount(usize),
    #[error("Channel id: {0}")]
    ChannelId(#[from] ChannelIdError),
    #[error("prev_state: {0}")]
    PrevState(#[from] PointerError),
    #[error("Hex: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("Decoding: {0}")]
    Decoding(#[from] std::io::Error),
}

/// The action tag of a token or an on-chain instruction.
///
/// Only [`ActionKind::is_off_chain`] kinds are part of a channel history.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, FromStr, Serialize, Deserialize,
)]
#[display(style = "camelCase")]
#[serde(rename_all = "camelCase")]
#[repr(u8)]
pub enum ActionKind {
    Open = 1,
    Join = 2,
    Update = 3,
    Leave = 4,
    ModifyOracle = 5,
    Invite = 6,
}

impl ActionKind {
    pub fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Self::Open),
            2 => Some(Self::Join),
            3 => Some(Self::Update),
            4 => Some(Self::Leave),
            5 => Some(Self::ModifyOracle),
            6 => Some(Self::Invite),
            _ => None,
        }
    }

    pub fn is_off_chain(self) -> bool {
        matches!(self, Self::Open | Self::Join | Self::Update | Self::Leave)
    }
}

/// The payload of Open, Join & Leave: a single `(address, balance)` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixedAction {
    pub channel_id: ChannelId,
    pub address: Address,
    pub balance: u64,
    pub sender: Address,
}

/// The payload of Update: the full snapshot of all the channel participants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAction {
    pub channel_id: ChannelId,
    pub participants: Vec<Participant>,
    pub sender: Address,
}

impl UpdateAction {
    /// The participant count is encoded in a single byte.
    pub fn num_of_stakeholders(&self) -> Result<u8, Error> {
        match self.participants.len() {
            len @ 1..=255 => Ok(len as u8),
            len => Err(Error::ParticipantCount(len)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum CoreActionData {
    Open(FixedAction),
    Join(FixedAction),
    Update(UpdateAction),
    Leave(FixedAction),
}

impl CoreActionData {
    pub fn action(&self) -> ActionKind {
        match self {
            Self::Open(_) => ActionKind::Open,
            Self::Join(_) => ActionKind::Join,
            Self::Update(_) => ActionKind::Update,
            Self::Leave(_) => ActionKind::Leave,
        }
    }

    pub fn channel_id(&self) -> &ChannelId {
        match self {
            Self::Open(fixed) | Self::Join(fixed) | Self::Leave(fixed) => &fixed.channel_id,
            Self::Update(update) => &update.channel_id,
        }
    }

    pub fn sender(&self) -> Address {
        match self {
            Self::Open(fixed) | Self::Join(fixed) | Self::Leave(fixed) => fixed.sender,
            Self::Update(update) => update.sender,
        }
    }

    /// The `(address, balance)` entries carried by this action.
    pub fn participants(&self) -> Vec<Participant> {
        match self {
            Self::Open(fixed) | Self::Join(fixed) | Self::Leave(fixed) => vec![Participant {
                address: fixed.address,
                balance: fixed.balance,
            }],
            Self::Update(update) => update.participants.clone(),
        }
    }

    /// The canonical encoding which the sender signs.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        codec::encode(self, None)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        codec::decode(bytes, false).map(|(data, _)| data)
    }

    pub fn with_signature(self, sender_signature: Signature) -> SignedAction {
        SignedAction {
            data: self,
            sender_signature,
        }
    }
}

/// The core action data together with the sender signature over it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedAction {
    #[serde(flatten)]
    pub data: CoreActionData,
    pub sender_signature: Signature,
}

impl SignedAction {
    /// The canonical encoding with the trailing sender signature, which the oracle signs.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        codec::encode(&self.data, Some(&self.sender_signature))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        match codec::decode(bytes, true)? {
            (data, Some(sender_signature)) => Ok(Self {
                data,
                sender_signature,
            }),
            (_, None) => Err(Error::Truncated),
        }
    }
}

/// What a stakeholder submits to the oracle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderEnvelope {
    pub data: CoreActionData,
    pub prev_state: PrevState,
    pub sender_signature: Signature,
}

impl SenderEnvelope {
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        codec::encode_envelope(
            self.data.to_bytes()?,
            self.prev_state.to_string(),
            &self.sender_signature,
        )
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let (encoded_data, prev_state, sender_signature) = codec::decode_envelope(bytes)?;

        Ok(Self {
            data: CoreActionData::from_bytes(&encoded_data)?,
            prev_state: prev_state.parse()?,
            sender_signature,
        })
    }

    pub fn to_hex(&self) -> Result<String, Error> {
        self.to_bytes().map(hex::encode)
    }

    pub fn from_hex(hex: &str) -> Result<Self, Error> {
        Self::from_bytes(&hex::decode(hex)?)
    }

    pub fn signed_action(&self) -> SignedAction {
        self.data.clone().with_signature(self.sender_signature)
    }
}

/// The oracle cosigned record of an action, the unit stored in the content store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OracleToken {
    #[serde(flatten)]
    pub action: SignedAction,
    pub prev_state: PrevState,
    pub oracle_signature: Signature,
}

impl OracleToken {
    pub fn data(&self) -> &CoreActionData {
        &self.action.data
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        codec::encode_envelope(
            self.action.to_bytes()?,
            self.prev_state.to_string(),
            &self.oracle_signature,
        )
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let (encoded_data, prev_state, oracle_signature) = codec::decode_envelope(bytes)?;

        Ok(Self {
            action: SignedAction::from_bytes(&encoded_data)?,
            prev_state: prev_state.parse()?,
            oracle_signature,
        })
    }

    pub fn to_hex(&self) -> Result<String, Error> {
        self.to_bytes().map(hex::encode)
    }

    pub fn from_hex(hex: &str) -> Result<Self, Error> {
        Self::from_bytes(&hex::decode(hex)?)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn channel() -> ChannelId {
        "c1".parse().expect("Valid channel id")
    }

    fn open(balance: u64) -> CoreActionData {
        CoreActionData::Open(FixedAction {
            channel_id: channel(),
            address: Address::new([1; 32]),
            balance,
            sender: Address::new([1; 32]),
        })
    }

    fn update(participants: usize) -> CoreActionData {
        CoreActionData::Update(UpdateAction {
            channel_id: channel(),
            participants: (0..participants)
                .map(|i| Participant {
                    address: Address::new([i as u8; 32]),
                    balance: i as u64 * 10,
                })
                .collect(),
            sender: Address::new([0; 32]),
        })
    }

    #[test]
    fn open_layout() {
        let bytes = open(100).to_bytes().expect("Should encode");

        let mut expected = vec![1, 2, 0, 0, 0, b'c', b'1'];
        expected.extend_from_slice(&[1; 32]);
        expected.extend_from_slice(&100_u64.to_le_bytes());
        expected.extend_from_slice(&[1; 32]);

        assert_eq!(expected, bytes);
        assert_eq!(open(100), CoreActionData::from_bytes(&bytes).expect("Should decode"));
    }

    #[test]
    fn update_reads_the_participant_count_from_the_tail() {
        for count in 1..=255_usize {
            let data = update(count);
            let bytes = data.to_bytes().expect("Should encode");

            assert_eq!(count as u8, *bytes.last().unwrap());
            assert_eq!(
                (ActionKind::Update, Schema::Update { participants: count as u8 }),
                Schema::detect(&bytes, false).unwrap()
            );
            assert_eq!(data, CoreActionData::from_bytes(&bytes).expect("Should decode"));

            let signed = data.clone().with_signature(Signature::new([3; 64]));
            let signed_bytes = signed.to_bytes().expect("Should encode");
            assert_eq!(count as u8, signed_bytes[signed_bytes.len() - 65]);
            assert_eq!(signed, SignedAction::from_bytes(&signed_bytes).expect("Should decode"));
        }
    }

    #[test]
    fn fixed_actions_round_trip_with_their_tag() {
        let action = FixedAction {
            channel_id: channel(),
            address: Address::new([4; 32]),
            balance: 42,
            sender: Address::new([5; 32]),
        };

        for (kind, data) in [
            (ActionKind::Open, CoreActionData::Open(action.clone())),
            (ActionKind::Join, CoreActionData::Join(action.clone())),
            (ActionKind::Leave, CoreActionData::Leave(action)),
        ] {
            let bytes = data.to_bytes().expect("Should encode");

            assert_eq!(kind as u8, bytes[0]);
            assert_eq!((kind, Schema::Fixed), Schema::detect(&bytes, false).unwrap());
            assert_eq!(data, CoreActionData::from_bytes(&bytes).expect("Should decode"));

            let token = OracleToken {
                action: data.with_signature(Signature::new([3; 64])),
                prev_state: PrevState::Genesis,
                oracle_signature: Signature::new([2; 64]),
            };
            let decoded = OracleToken::from_bytes(&token.to_bytes().unwrap()).expect("Should decode");
            assert_eq!(token, decoded);
            assert_eq!(kind, decoded.data().action());
        }
    }

    #[test]
    fn update_participant_count_bounds() {
        assert!(matches!(update(0).to_bytes(), Err(Error::ParticipantCount(0))));
        assert!(matches!(update(256).to_bytes(), Err(Error::ParticipantCount(256))));
    }

    #[test]
    fn rejects_length_mismatch() {
        let mut bytes = open(5).to_bytes().unwrap();
        bytes.push(0);
        assert!(matches!(
            CoreActionData::from_bytes(&bytes),
            Err(Error::Length { expected: 79, actual: 80 })
        ));

        // declares 3 participants but carries 2
        let mut bytes = update(2).to_bytes().unwrap();
        *bytes.last_mut().unwrap() = 3;
        assert!(matches!(
            CoreActionData::from_bytes(&bytes),
            Err(Error::Length { .. })
        ));

        // unsigned data is not a valid signed action
        let bytes = open(5).to_bytes().unwrap();
        assert!(SignedAction::from_bytes(&bytes).is_err());
    }

    #[test]
    fn rejects_unknown_and_on_chain_only_actions() {
        let mut bytes = open(5).to_bytes().unwrap();
        bytes[0] = 5;
        assert!(matches!(
            CoreActionData::from_bytes(&bytes),
            Err(Error::UnknownAction(5))
        ));

        assert!(matches!(CoreActionData::from_bytes(&[]), Err(Error::Truncated)));
        assert!(matches!(CoreActionData::from_bytes(&[3]), Err(Error::Truncated)));
    }

    #[test]
    fn rejects_string_length_overflowing_the_buffer() {
        let mut bytes = open(5).to_bytes().unwrap();
        bytes[1] = 0xff;
        assert!(CoreActionData::from_bytes(&bytes).is_err());
    }

    #[test]
    fn envelope_layout() {
        let envelope = SenderEnvelope {
            data: open(100),
            prev_state: PrevState::Genesis,
            sender_signature: Signature::new([7; 64]),
        };

        let bytes = envelope.to_bytes().expect("Should encode");
        let core = open(100).to_bytes().unwrap();

        assert_eq!(&(core.len() as u32).to_le_bytes(), &bytes[..4]);
        assert_eq!(&core[..], &bytes[4..4 + core.len()]);
        assert_eq!(&[1, 0, 0, 0, b'0'], &bytes[4 + core.len()..9 + core.len()]);
        assert_eq!(&[7; 64][..], &bytes[9 + core.len()..]);

        let hex = envelope.to_hex().unwrap();
        assert_eq!(envelope, SenderEnvelope::from_hex(&hex).expect("Should decode"));
    }

    #[test]
    fn oracle_token_links_to_prev_state() {
        let token = OracleToken {
            action: update(2).with_signature(Signature::new([1; 64])),
            prev_state: "QmPrevious".parse().unwrap(),
            oracle_signature: Signature::new([2; 64]),
        };

        let decoded = OracleToken::from_bytes(&token.to_bytes().unwrap()).expect("Should decode");
        assert_eq!(token, decoded);
        assert_eq!(ActionKind::Update, decoded.data().action());

        let mut bytes = token.to_bytes().unwrap();
        bytes.push(1);
        assert!(matches!(
            OracleToken::from_bytes(&bytes),
            Err(Error::TrailingBytes(1))
        ));
    }
}
