use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    ed25519_program,
    instruction::{AccountMeta, Instruction},
    system_program, sysvar,
};
use solana_sdk::ed25519_instruction::{
    DATA_START, PUBKEY_SERIALIZED_SIZE, SIGNATURE_OFFSETS_SERIALIZED_SIZE,
    SIGNATURE_OFFSETS_START, SIGNATURE_SERIALIZED_SIZE,
};
use thiserror::Error;

use super::pda;
use crate::{channel::Error as ChannelIdError, token::ActionKind, Address, ChannelId, Signature};

#[derive(Debug, Error)]
pub enum Error {
    #[error("Unknown instruction variant {0}")]
    UnknownVariant(u8),
    #[error("Instruction data is empty")]
    Empty,
    #[error("Decoding instruction data: {0}")]
    Decoding(#[from] std::io::Error),
    #[error("Unexpected {0} trailing bytes")]
    TrailingBytes(usize),
    #[error("Channel id: {0}")]
    ChannelId(#[from] ChannelIdError),
    #[error("Program derived address: {0}")]
    Pda(#[from] pda::Error),
    #[error("Malformed signature verification instruction: {0}")]
    Ed25519(&'static str),
}

/// The instructions of the channel program.
///
/// Open, Join & Leave carry the oracle token of the action they anchor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramInstruction {
    Open { token: Vec<u8> },
    Join { token: Vec<u8> },
    Leave { token: Vec<u8> },
    ModifyOracle { oracle_address: Address },
    Invite { channel_id: ChannelId, invitee: Address },
}

#[derive(BorshSerialize, BorshDeserialize)]
struct InviteLayout {
    channel_id: String,
    invitee: [u8; 32],
}

impl ProgramInstruction {
    pub fn variant(&self) -> ActionKind {
        match self {
            Self::Open { .. } => ActionKind::Open,
            Self::Join { .. } => ActionKind::Join,
            Self::Leave { .. } => ActionKind::Leave,
            Self::ModifyOracle { .. } => ActionKind::ModifyOracle,
            Self::Invite { .. } => ActionKind::Invite,
        }
    }

    /// `variant:u8` followed by the borsh encoded fields of the variant.
    pub fn pack(&self) -> Result<Vec<u8>, Error> {
        let mut buf = vec![self.variant() as u8];

        match self {
            Self::Open { token } | Self::Join { token } | Self::Leave { token } => {
                token.serialize(&mut buf)?
            }
            Self::ModifyOracle { oracle_address } => {
                buf.extend_from_slice(oracle_address.as_bytes())
            }
            Self::Invite {
                channel_id,
                invitee,
            } => InviteLayout {
                channel_id: channel_id.to_string(),
                invitee: invitee.to_bytes(),
            }
            .serialize(&mut buf)?,
        }

        Ok(buf)
    }

    pub fn unpack(data: &[u8]) -> Result<Self, Error> {
        let (&tag, mut rest) = data.split_first().ok_or(Error::Empty)?;

        let instruction = match ActionKind::from_u8(tag) {
            Some(ActionKind::Open) => Self::Open {
                token: Vec::<u8>::deserialize(&mut rest)?,
            },
            Some(ActionKind::Join) => Self::Join {
                token: Vec::<u8>::deserialize(&mut rest)?,
            },
            Some(ActionKind::Leave) => Self::Leave {
                token: Vec::<u8>::deserialize(&mut rest)?,
            },
            Some(ActionKind::ModifyOracle) => Self::ModifyOracle {
                oracle_address: Address::new(<[u8; 32]>::deserialize(&mut rest)?),
            },
            Some(ActionKind::Invite) => {
                let layout = InviteLayout::deserialize(&mut rest)?;

                Self::Invite {
                    channel_id: layout.channel_id.try_into()?,
                    invitee: Address::new(layout.invitee),
                }
            }
            Some(ActionKind::Update) | None => return Err(Error::UnknownVariant(tag)),
        };

        if !rest.is_empty() {
            return Err(Error::TrailingBytes(rest.len()));
        }

        Ok(instruction)
    }
}

/// Anchors an Open, Join or Leave oracle token.
///
/// Accounts: `[stakeholder (signer), channel, stakeholder account, oracle account, instructions sysvar, system program]`
pub fn channel_action(
    program_id: &Address,
    instruction: ProgramInstruction,
    channel_id: &ChannelId,
    stakeholder: &Address,
    oracle: &Address,
) -> Result<Instruction, Error> {
    let (channel_pda, _) = pda::channel_address(program_id, channel_id)?;
    let (stakeholder_pda, _) = pda::stakeholder_address(program_id, channel_id, stakeholder)?;
    let (oracle_pda, _) = pda::oracle_address(program_id, oracle)?;

    Ok(Instruction::new_with_bytes(
        (*program_id).into(),
        &instruction.pack()?,
        vec![
            AccountMeta::new_readonly((*stakeholder).into(), true),
            AccountMeta::new(channel_pda.into(), false),
            AccountMeta::new(stakeholder_pda.into(), false),
            AccountMeta::new(oracle_pda.into(), false),
            AccountMeta::new_readonly(sysvar::instructions::id(), false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
    ))
}

/// Accounts: `[inviter (signer), channel, inviter account, invitee account, system program]`
pub fn invite(
    program_id: &Address,
    channel_id: &ChannelId,
    inviter: &Address,
    invitee: &Address,
) -> Result<Instruction, Error> {
    let (channel_pda, _) = pda::channel_address(program_id, channel_id)?;
    let (inviter_pda, _) = pda::stakeholder_address(program_id, channel_id, inviter)?;
    let (invitee_pda, _) = pda::stakeholder_address(program_id, channel_id, invitee)?;

    let data = ProgramInstruction::Invite {
        channel_id: channel_id.clone(),
        invitee: *invitee,
    }
    .pack()?;

    Ok(Instruction::new_with_bytes(
        (*program_id).into(),
        &data,
        vec![
            AccountMeta::new_readonly((*inviter).into(), true),
            AccountMeta::new(channel_pda.into(), false),
            AccountMeta::new(inviter_pda.into(), false),
            AccountMeta::new(invitee_pda.into(), false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
    ))
}

/// Registers the oracle with the program.
///
/// Accounts: `[oracle (signer), oracle account, system program]`
pub fn modify_oracle(program_id: &Address, oracle: &Address) -> Result<Instruction, Error> {
    let (oracle_pda, _) = pda::oracle_address(program_id, oracle)?;

    let data = ProgramInstruction::ModifyOracle {
        oracle_address: *oracle,
    }
    .pack()?;

    Ok(Instruction::new_with_bytes(
        (*program_id).into(),
        &data,
        vec![
            AccountMeta::new((*oracle).into(), true),
            AccountMeta::new(oracle_pda.into(), false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
    ))
}

const ED25519_PUBKEY_OFFSET: usize = DATA_START;
const ED25519_SIGNATURE_OFFSET: usize = ED25519_PUBKEY_OFFSET + PUBKEY_SERIALIZED_SIZE;
const ED25519_MESSAGE_OFFSET: usize = ED25519_SIGNATURE_OFFSET + SIGNATURE_SERIALIZED_SIZE;
/// The data is part of the verification instruction itself.
const CURRENT_INSTRUCTION: u16 = u16::MAX;

/// A single signature verification, as checked by the Ed25519 native program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ed25519Verification {
    pub pubkey: Address,
    pub signature: Signature,
    pub message: Vec<u8>,
}

impl Ed25519Verification {
    fn offsets(message_len: u16) -> [u16; SIGNATURE_OFFSETS_SERIALIZED_SIZE / 2] {
        [
            ED25519_SIGNATURE_OFFSET as u16,
            CURRENT_INSTRUCTION,
            ED25519_PUBKEY_OFFSET as u16,
            CURRENT_INSTRUCTION,
            ED25519_MESSAGE_OFFSET as u16,
            message_len,
            CURRENT_INSTRUCTION,
        ]
    }

    /// `num_signatures:u8, padding:u8`, the signature offsets as `u16`s,
    /// followed by the public key, the signature and the message.
    pub fn into_instruction(self) -> Instruction {
        let mut data = Vec::with_capacity(ED25519_MESSAGE_OFFSET + self.message.len());
        data.extend_from_slice(&[1, 0]);
        for offset in Self::offsets(self.message.len() as u16) {
            data.extend_from_slice(&offset.to_le_bytes());
        }
        data.extend_from_slice(self.pubkey.as_bytes());
        data.extend_from_slice(self.signature.as_bytes());
        data.extend_from_slice(&self.message);

        Instruction::new_with_bytes(ed25519_program::id(), &data, vec![])
    }

    /// Parses a verification instruction with a single self-contained signature.
    pub fn from_instruction(instruction: &Instruction) -> Result<Self, Error> {
        if instruction.program_id != ed25519_program::id() {
            return Err(Error::Ed25519("not the Ed25519 program"));
        }

        let data = &instruction.data;
        if data.len() < ED25519_MESSAGE_OFFSET || data[0] != 1 {
            return Err(Error::Ed25519("expected a single signature"));
        }

        let message_len = u16::try_from(data.len() - ED25519_MESSAGE_OFFSET)
            .map_err(|_| Error::Ed25519("message size mismatch"))?;
        let offsets = data[SIGNATURE_OFFSETS_START..DATA_START]
            .chunks_exact(2)
            .map(|bytes| u16::from_le_bytes([bytes[0], bytes[1]]));
        if !offsets.eq(Self::offsets(message_len)) {
            return Err(Error::Ed25519("unexpected offsets"));
        }

        Ok(Self {
            pubkey: Address::from_slice(&data[ED25519_PUBKEY_OFFSET..ED25519_SIGNATURE_OFFSET])
                .map_err(|_| Error::Ed25519("public key"))?,
            signature: Signature::from_slice(&data[ED25519_SIGNATURE_OFFSET..ED25519_MESSAGE_OFFSET])
                .map_err(|_| Error::Ed25519("signature"))?,
            message: data[ED25519_MESSAGE_OFFSET..].to_vec(),
        })
    }
}
