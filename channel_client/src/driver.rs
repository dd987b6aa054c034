//! The stakeholder side of the channel protocol.
//!
//! Every action is signed by the stakeholder, cosigned by the Oracle and,
//! for Open, Join and Leave, anchored with the channel program. The cosignature
//! is always checked against the action we submitted before anything is anchored.
use adapter::{prelude::*, Adapter, UnlockedState};
use primitives::{
    chain::{
        self, instruction, ChainWriter, Ed25519Verification, Instruction, ProgramInstruction,
    },
    oracle::TokenResponse,
    storage::{ContentStore, NamingService},
    token::{FixedAction, UpdateAction},
    ActionKind, Address, ChannelId, ContentPointer, CoreActionData, OracleToken, PrevState,
    Reconstructor, SenderEnvelope, Signature, SignedAction, Snapshot,
};
use slog::{info, Logger};

use crate::{oracle_interface::OracleInterface, Error};

/// A cosigned action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub token: OracleToken,
    /// The pointer the Oracle published the token at.
    pub pointer: ContentPointer,
    /// The anchoring transaction, Updates are not anchored.
    pub transaction: Option<Signature>,
}

pub struct Driver<S, N, W, O> {
    oracle: O,
    /// The Oracle whose cosignatures we accept and the program verifies.
    oracle_address: Address,
    reconstructor: Reconstructor<S, N, W>,
    logger: Logger,
}

impl<S, N, W, O> Driver<S, N, W, O>
where
    S: ContentStore,
    N: NamingService,
    W: ChainWriter,
    O: OracleInterface,
{
    pub fn new(
        oracle: O,
        oracle_address: Address,
        reconstructor: Reconstructor<S, N, W>,
        logger: Logger,
    ) -> Self {
        Self {
            oracle,
            oracle_address,
            reconstructor,
            logger,
        }
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn reconstructor(&self) -> &Reconstructor<S, N, W> {
        &self.reconstructor
    }

    /// The current state of the channel, replayed from its history.
    pub async fn state(&self, channel_id: &ChannelId) -> Result<Snapshot, Error> {
        Ok(self.reconstructor.last_channel_state(channel_id).await?)
    }

    /// Opens the channel with a deposit of `amount`.
    pub async fn open<C: Unlocked>(
        &self,
        channel_id: &ChannelId,
        signer: &Adapter<C, UnlockedState<C>>,
        amount: u64,
    ) -> Result<Outcome, Error> {
        let data = CoreActionData::Open(own_deposit(channel_id, signer, amount)?);
        let envelope = self.envelope(signer, data, PrevState::Genesis)?;

        let response = self.oracle.open(&envelope).await?;
        let token = self.cosigned(signer, &envelope, &response)?;

        self.anchored(signer, token, response.cid).await
    }

    /// Joins an open channel with a deposit of `amount`.
    ///
    /// The channel program only accepts stakeholders invited by an active one.
    pub async fn join<C: Unlocked>(
        &self,
        channel_id: &ChannelId,
        signer: &Adapter<C, UnlockedState<C>>,
        amount: u64,
    ) -> Result<Outcome, Error> {
        let data = CoreActionData::Join(own_deposit(channel_id, signer, amount)?);
        let envelope = self.envelope(signer, data, PrevState::Genesis)?;

        let response = self.oracle.join(&envelope).await?;
        let token = self.cosigned(signer, &envelope, &response)?;

        self.anchored(signer, token, response.cid).await
    }

    /// Transfers `amount` to `receiver`, off-chain only.
    pub async fn update<C: Unlocked>(
        &self,
        channel_id: &ChannelId,
        signer: &Adapter<C, UnlockedState<C>>,
        amount: u64,
        receiver: Address,
    ) -> Result<Outcome, Error> {
        let sender = signer.whoami();
        let snapshot = self.reconstructor.last_channel_state(channel_id).await?;
        let post_state = snapshot.state.transfer(&sender, &receiver, amount)?;

        let data = CoreActionData::Update(UpdateAction {
            channel_id: channel_id.clone(),
            participants: post_state.into_participants(),
            sender,
        });
        let envelope = self.envelope(signer, data, snapshot.pointer.into())?;

        let response = self.oracle.update(&envelope, amount, receiver).await?;
        let token = self.cosigned(signer, &envelope, &response)?;

        Ok(Outcome {
            token,
            pointer: response.cid,
            transaction: None,
        })
    }

    /// Leaves the channel with the whole balance of the signer.
    pub async fn leave<C: Unlocked>(
        &self,
        channel_id: &ChannelId,
        signer: &Adapter<C, UnlockedState<C>>,
    ) -> Result<Outcome, Error> {
        let sender = signer.whoami();
        let snapshot = self.reconstructor.last_channel_state(channel_id).await?;
        let balance = snapshot
            .state
            .get(&sender)
            .ok_or(Error::ParticipantNotFound(sender))?;
        if balance == 0 {
            return Err(Error::InvalidBalance);
        }

        let data = CoreActionData::Leave(FixedAction {
            channel_id: channel_id.clone(),
            address: sender,
            balance,
            sender,
        });
        let envelope = self.envelope(signer, data, snapshot.pointer.into())?;

        let response = self.oracle.leave(&envelope).await?;
        let token = self.cosigned(signer, &envelope, &response)?;

        self.anchored(signer, token, response.cid).await
    }

    /// Invites `invitee` to join the channel, on-chain only.
    pub async fn invite<C: Unlocked>(
        &self,
        channel_id: &ChannelId,
        signer: &Adapter<C, UnlockedState<C>>,
        invitee: Address,
    ) -> Result<Signature, Error> {
        let invite = instruction::invite(
            self.reconstructor.program_id(),
            channel_id,
            &signer.whoami(),
            &invitee,
        )
        .map_err(chain::Error::from)?;

        let signature = self.submit(signer, &[invite]).await?;
        info!(
            self.logger,
            "Invited stakeholder";
            "channel" => channel_id,
            "invitee" => invitee,
            "transaction" => %signature
        );

        Ok(signature)
    }

    /// Anchors a cosigned Open, Join or Leave token with the channel program.
    ///
    /// The Oracle signature is verified by the Ed25519 program in the
    /// instruction preceding the program instruction.
    pub async fn anchor<C: Unlocked>(
        &self,
        signer: &Adapter<C, UnlockedState<C>>,
        token: &OracleToken,
    ) -> Result<Signature, Error> {
        self.verify_cosignature(signer, &token.action, token)?;

        let channel_id = token.data().channel_id();
        let bytes = token.to_bytes()?;
        let program_instruction = match token.data().action() {
            ActionKind::Open => ProgramInstruction::Open { token: bytes },
            ActionKind::Join => ProgramInstruction::Join { token: bytes },
            ActionKind::Leave => ProgramInstruction::Leave { token: bytes },
            kind => return Err(Error::NotAnchored(kind)),
        };

        let verification = Ed25519Verification {
            pubkey: self.oracle_address,
            signature: token.oracle_signature,
            message: token.action.to_bytes()?,
        };
        let anchor = instruction::channel_action(
            self.reconstructor.program_id(),
            program_instruction,
            channel_id,
            &signer.whoami(),
            &self.oracle_address,
        )
        .map_err(chain::Error::from)?;

        let signature = self
            .submit(signer, &[verification.into_instruction(), anchor])
            .await?;
        info!(
            self.logger,
            "Token anchored";
            "channel" => channel_id,
            "action" => %token.data().action(),
            "transaction" => %signature
        );

        Ok(signature)
    }

    fn envelope<C: Unlocked>(
        &self,
        signer: &Adapter<C, UnlockedState<C>>,
        data: CoreActionData,
        prev_state: PrevState,
    ) -> Result<SenderEnvelope, Error> {
        let sender_signature = signer.sign(&data.to_bytes()?)?;
        info!(
            self.logger,
            "Action signed";
            "channel" => data.channel_id(),
            "action" => %data.action(),
            "prev_state" => %prev_state
        );

        Ok(SenderEnvelope {
            data,
            prev_state,
            sender_signature,
        })
    }

    /// Decodes the Oracle token and checks it cosigns exactly our envelope.
    fn cosigned<C: Unlocked>(
        &self,
        signer: &Adapter<C, UnlockedState<C>>,
        envelope: &SenderEnvelope,
        response: &TokenResponse,
    ) -> Result<OracleToken, Error> {
        let token = OracleToken::from_hex(&response.token)?;
        self.verify_cosignature(signer, &envelope.signed_action(), &token)?;

        info!(
            self.logger,
            "Action cosigned";
            "channel" => envelope.data.channel_id(),
            "action" => %envelope.data.action(),
            "cid" => &response.cid
        );

        Ok(token)
    }

    fn verify_cosignature<C: Unlocked>(
        &self,
        signer: &Adapter<C, UnlockedState<C>>,
        expected: &SignedAction,
        token: &OracleToken,
    ) -> Result<(), Error> {
        let invalid = Error::SignatureInvalid {
            oracle: self.oracle_address,
        };
        if token.action != *expected {
            return Err(invalid);
        }

        match signer.verify(
            self.oracle_address,
            &expected.to_bytes()?,
            &token.oracle_signature,
        ) {
            Ok(true) => Ok(()),
            _ => Err(invalid),
        }
    }

    /// Anchors the token, keeping it in the error if the submission fails.
    async fn anchored<C: Unlocked>(
        &self,
        signer: &Adapter<C, UnlockedState<C>>,
        token: OracleToken,
        pointer: ContentPointer,
    ) -> Result<Outcome, Error> {
        match self.anchor(signer, &token).await {
            Ok(transaction) => Ok(Outcome {
                token,
                pointer,
                transaction: Some(transaction),
            }),
            Err(Error::Chain(source)) => Err(Error::SubmissionFailed {
                token: Box::new(token),
                source,
            }),
            Err(err) => Err(err),
        }
    }

    async fn submit<C: Unlocked>(
        &self,
        signer: &Adapter<C, UnlockedState<C>>,
        instructions: &[Instruction],
    ) -> Result<Signature, Error> {
        let chain = self.reconstructor.chain();

        let blockhash = chain.latest_blockhash().await?;
        let transaction =
            chain::transaction(instructions, &signer.whoami(), &blockhash, |message| {
                signer.sign(message)
            })?;

        Ok(chain.send_and_confirm(&transaction).await?)
    }
}

fn own_deposit<C: Unlocked>(
    channel_id: &ChannelId,
    signer: &Adapter<C, UnlockedState<C>>,
    amount: u64,
) -> Result<FixedAction, Error> {
    if amount == 0 {
        return Err(Error::InvalidBalance);
    }

    let sender = signer.whoami();

    Ok(FixedAction {
        channel_id: channel_id.clone(),
        address: sender,
        balance: amount,
        sender,
    })
}
