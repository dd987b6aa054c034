//! Parametric codec for the core action data.
//!
//! Layouts, all integers are little-endian and strings are `u32` length prefixed:
//!
//! - Open, Join & Leave: `action:u8, channelid:string, address:[32], balance:u64, sender:[32][, sig_sender:[64]]`
//! - Update with `N` participants: `action:u8, channelid:string, (address:[32], balance:u64) * N, sender:[32], num_of_stakeholders:u8[, sig_sender:[64]]`
use borsh::{BorshDeserialize, BorshSerialize};

use super::{ActionKind, CoreActionData, Error, FixedAction, UpdateAction};
use crate::{state::Participant, Address, ChannelId, Signature};

const ADDRESS_LEN: usize = Address::LENGTH;
const BALANCE_LEN: usize = 8;
const SIGNATURE_LEN: usize = Signature::LENGTH;

/// The shape of the core action data, which determines its exact length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schema {
    /// Open, Join & Leave
    Fixed,
    /// Update with the given number of participants
    Update { participants: u8 },
}

impl Schema {
    /// The exact length of an encoding with this shape.
    pub fn encoded_len(&self, channel_id_len: usize, with_signature: bool) -> usize {
        let header = 1 + 4 + channel_id_len;
        let body = match self {
            Schema::Fixed => ADDRESS_LEN + BALANCE_LEN + ADDRESS_LEN,
            Schema::Update { participants } => {
                usize::from(*participants) * (ADDRESS_LEN + BALANCE_LEN) + ADDRESS_LEN + 1
            }
        };
        let signature = if with_signature { SIGNATURE_LEN } else { 0 };

        header + body + signature
    }

    /// Determines the shape of `bytes` without decoding them.
    ///
    /// For Update the participant count is read from the byte right before the
    /// trailing sender signature, or from the last byte when there is no signature.
    pub fn detect(bytes: &[u8], with_signature: bool) -> Result<(ActionKind, Schema), Error> {
        let tag = *bytes.first().ok_or(Error::Truncated)?;
        let action = ActionKind::from_u8(tag)
            .filter(|action| action.is_off_chain())
            .ok_or(Error::UnknownAction(tag))?;

        if action != ActionKind::Update {
            return Ok((action, Schema::Fixed));
        }

        let trailer = if with_signature { SIGNATURE_LEN + 1 } else { 1 };
        let count_at = match bytes.len().checked_sub(trailer) {
            // index 0 holds the action tag
            Some(index) if index > 0 => index,
            _ => return Err(Error::Truncated),
        };

        match bytes[count_at] {
            0 => Err(Error::ParticipantCount(0)),
            participants => Ok((action, Schema::Update { participants })),
        }
    }
}

pub(super) fn encode(
    data: &CoreActionData,
    sender_signature: Option<&Signature>,
) -> Result<Vec<u8>, Error> {
    let mut buf = Vec::new();
    buf.push(data.action() as u8);
    data.channel_id().as_str().serialize(&mut buf)?;

    match data {
        CoreActionData::Open(fixed) | CoreActionData::Join(fixed) | CoreActionData::Leave(fixed) => {
            buf.extend_from_slice(fixed.address.as_bytes());
            fixed.balance.serialize(&mut buf)?;
            buf.extend_from_slice(fixed.sender.as_bytes());
        }
        CoreActionData::Update(update) => {
            let count = update.num_of_stakeholders()?;

            for participant in &update.participants {
                buf.extend_from_slice(participant.address.as_bytes());
                participant.balance.serialize(&mut buf)?;
            }
            buf.extend_from_slice(update.sender.as_bytes());
            buf.push(count);
        }
    }

    if let Some(signature) = sender_signature {
        buf.extend_from_slice(signature.as_bytes());
    }

    Ok(buf)
}

pub(super) fn decode(
    bytes: &[u8],
    with_signature: bool,
) -> Result<(CoreActionData, Option<Signature>), Error> {
    let (action, schema) = Schema::detect(bytes, with_signature)?;

    let mut cursor = &bytes[1..];
    let channel_id = String::deserialize(&mut cursor)?;

    let expected = schema.encoded_len(channel_id.len(), with_signature);
    if expected != bytes.len() {
        return Err(Error::Length {
            expected,
            actual: bytes.len(),
        });
    }
    let channel_id = ChannelId::try_from(channel_id)?;

    let data = match schema {
        Schema::Fixed => {
            let fixed = FixedAction {
                channel_id,
                address: read_address(&mut cursor)?,
                balance: u64::deserialize(&mut cursor)?,
                sender: read_address(&mut cursor)?,
            };

            match action {
                ActionKind::Open => CoreActionData::Open(fixed),
                ActionKind::Join => CoreActionData::Join(fixed),
                _ => CoreActionData::Leave(fixed),
            }
        }
        Schema::Update { participants } => {
            let participants = (0..participants)
                .map(|_| {
                    Ok(Participant {
                        address: read_address(&mut cursor)?,
                        balance: u64::deserialize(&mut cursor)?,
                    })
                })
                .collect::<Result<Vec<_>, Error>>()?;
            let sender = read_address(&mut cursor)?;
            // the count byte has been validated by `Schema::detect`
            let _num_of_stakeholders = u8::deserialize(&mut cursor)?;

            CoreActionData::Update(UpdateAction {
                channel_id,
                participants,
                sender,
            })
        }
    };

    let signature = if with_signature {
        Some(Signature::new(read_array::<SIGNATURE_LEN>(&mut cursor)?))
    } else {
        None
    };

    Ok((data, signature))
}

/// `encoded_data:Vec<u8>, prev_state:string, signature:[64]`
pub(super) fn encode_envelope(
    encoded_data: Vec<u8>,
    prev_state: String,
    signature: &Signature,
) -> Result<Vec<u8>, Error> {
    let mut buf = Vec::with_capacity(encoded_data.len() + prev_state.len() + 8 + SIGNATURE_LEN);
    encoded_data.serialize(&mut buf)?;
    prev_state.serialize(&mut buf)?;
    buf.extend_from_slice(signature.as_bytes());

    Ok(buf)
}

pub(super) fn decode_envelope(bytes: &[u8]) -> Result<(Vec<u8>, String, Signature), Error> {
    let mut cursor = bytes;
    let encoded_data = Vec::<u8>::deserialize(&mut cursor)?;
    let prev_state = String::deserialize(&mut cursor)?;
    let signature = Signature::new(read_array::<SIGNATURE_LEN>(&mut cursor)?);

    if !cursor.is_empty() {
        return Err(Error::TrailingBytes(cursor.len()));
    }

    Ok((encoded_data, prev_state, signature))
}

fn read_address(cursor: &mut &[u8]) -> Result<Address, Error> {
    read_array::<ADDRESS_LEN>(cursor).map(Address::new)
}

fn read_array<const N: usize>(cursor: &mut &[u8]) -> Result<[u8; N], Error> {
    if cursor.len() < N {
        return Err(Error::Truncated);
    }
    let (head, rest) = cursor.split_at(N);
    *cursor = rest;

    <[u8; N]>::try_from(head).map_err(|_| Error::Truncated)
}
