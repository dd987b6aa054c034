//! The Solana RPC client, reading the channel accounts and submitting
//! the anchoring transactions.
use std::{str::FromStr, time::Duration};

use async_trait::async_trait;
use primitives::{
    chain::{Blockhash, ChainReader, ChainWriter, Error, Transaction},
    Address, Config, Signature,
};
use slog::{debug, info, Logger};
use solana_client::{
    client_error::{ClientError, ClientErrorKind},
    nonblocking::rpc_client::RpcClient,
    rpc_request::RpcError,
};
use solana_sdk::commitment_config::{CommitmentConfig, CommitmentLevel};

pub struct SolanaRpc {
    client: RpcClient,
    confirmation_timeout: Duration,
    poll_interval: Duration,
    logger: Logger,
}

impl SolanaRpc {
    /// `commitment` is one of `processed`, `confirmed` or `finalized`.
    pub fn new(
        rpc_url: &str,
        commitment: &str,
        fetch_timeout: Duration,
        confirmation_timeout: Duration,
        poll_interval: Duration,
        logger: Logger,
    ) -> Result<Self, Error> {
        let commitment = CommitmentLevel::from_str(commitment)
            .map_err(|err| Error::Rpc(format!("commitment {commitment}: {err}")))?;

        let client = RpcClient::new_with_timeouts_and_commitment(
            rpc_url.to_string(),
            fetch_timeout,
            CommitmentConfig { commitment },
            confirmation_timeout,
        );

        Ok(Self {
            client,
            confirmation_timeout,
            poll_interval,
            logger,
        })
    }

    pub fn from_config(config: &Config, logger: Logger) -> Result<Self, Error> {
        Self::new(
            &config.chain.rpc_url,
            &config.chain.commitment,
            config.fetch_timeout(),
            config.confirmation_timeout(),
            config.confirmation_poll_interval(),
            logger,
        )
    }

    /// Polls the status of the transaction until it reaches the configured commitment.
    async fn confirm(&self, signature: &solana_sdk::signature::Signature) -> Result<(), Error> {
        let poll = async {
            loop {
                let status = self
                    .client
                    .get_signature_status_with_commitment(signature, self.client.commitment())
                    .await
                    .map_err(rpc_error)?;

                match status {
                    Some(Ok(())) => return Ok(()),
                    Some(Err(err)) => {
                        return Err(Error::SubmissionFailed {
                            signature: signature.to_string(),
                            reason: err.to_string(),
                        })
                    }
                    None => tokio::time::sleep(self.poll_interval).await,
                }
            }
        };

        tokio::time::timeout(self.confirmation_timeout, poll)
            .await
            .map_err(|_elapsed| Error::ConfirmationTimeout(signature.to_string()))?
    }
}

#[async_trait]
impl ChainReader for SolanaRpc {
    async fn account_data(&self, address: &Address) -> Result<Option<Vec<u8>>, Error> {
        let account = self
            .client
            .get_account_with_commitment(&(*address).into(), self.client.commitment())
            .await
            .map_err(rpc_error)?;

        Ok(account.value.map(|account| account.data))
    }
}

#[async_trait]
impl ChainWriter for SolanaRpc {
    async fn latest_blockhash(&self) -> Result<Blockhash, Error> {
        self.client.get_latest_blockhash().await.map_err(rpc_error)
    }

    async fn send_and_confirm(&self, transaction: &Transaction) -> Result<Signature, Error> {
        let signature = transaction.signatures.first().copied().unwrap_or_default();

        let sent = self
            .client
            .send_transaction(transaction)
            .await
            .map_err(|err| match err.kind() {
                // preflight simulation or validation of the transaction failed
                ClientErrorKind::RpcError(RpcError::RpcResponseError { .. })
                | ClientErrorKind::TransactionError(_) => Error::SubmissionFailed {
                    signature: signature.to_string(),
                    reason: err.to_string(),
                },
                _ => rpc_error(err),
            })?;

        debug!(self.logger, "Sent transaction"; "signature" => %sent);

        self.confirm(&sent).await?;

        info!(
            self.logger,
            "Transaction confirmed";
            "signature" => %sent,
            "commitment" => ?self.client.commitment().commitment
        );

        Ok(sent.into())
    }
}

fn rpc_error(err: ClientError) -> Error {
    match err.kind() {
        ClientErrorKind::Reqwest(request) if request.is_timeout() => Error::Timeout,
        _ => Error::Rpc(err.to_string()),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use primitives::{
        chain::{self, pda},
        channel::{ChannelAccount, ChannelStatus},
        test_util::{ALICE, CHANNEL_ID, ORACLE, PROGRAM_ID},
        util::logging::discard_logger,
    };
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use wiremock::{
        matchers::{body_partial_json, method},
        Mock, MockServer, ResponseTemplate,
    };

    const SIGNATURE: Signature = Signature::new([5; 64]);

    async fn setup_rpc(server: &MockServer) -> SolanaRpc {
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": "getVersion" })))
            .respond_with(rpc_result(json!({ "solana-core": "1.18.0", "feature-set": 0 })))
            .mount(server)
            .await;

        SolanaRpc::new(
            &server.uri(),
            "confirmed",
            Duration::from_millis(500),
            Duration::from_millis(300),
            Duration::from_millis(20),
            discard_logger(),
        )
        .expect("Should build client")
    }

    fn rpc_result(result: Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({ "jsonrpc": "2.0", "id": 1, "result": result }))
    }

    fn signed_transaction() -> Transaction {
        chain::transaction(
            &[],
            &ALICE,
            &Blockhash::new_from_array([7; 32]),
            |_message| Ok::<_, Error>(SIGNATURE),
        )
        .expect("Should sign")
    }

    async fn mock_send(server: &MockServer) {
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": "sendTransaction" })))
            .respond_with(rpc_result(json!(SIGNATURE.to_base58())))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn reads_channel_accounts() {
        let server = MockServer::start().await;
        let rpc = setup_rpc(&server).await;

        let account = ChannelAccount {
            channel_id: CHANNEL_ID.to_string(),
            oracle_address: *ORACLE,
            current_status: ChannelStatus::Open,
            num_of_stakeholders: 1,
        };
        let mut data = account.to_account_data().expect("Should encode");
        data.resize(128, 0);

        let (channel_pda, _) = pda::channel_address(&PROGRAM_ID, &CHANNEL_ID).unwrap();

        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "method": "getAccountInfo",
                "params": [channel_pda.to_base58()],
            })))
            .respond_with(rpc_result(json!({
                "context": { "slot": 1 },
                "value": {
                    "data": [base64::encode(&data), "base64"],
                    "executable": false,
                    "lamports": 1_000_000,
                    "owner": PROGRAM_ID.to_base58(),
                    "rentEpoch": 0,
                }
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": "getAccountInfo" })))
            .respond_with(rpc_result(json!({ "context": { "slot": 1 }, "value": null })))
            .mount(&server)
            .await;

        let channel = rpc
            .channel_account(&PROGRAM_ID, &CHANNEL_ID)
            .await
            .expect("Should read the account");
        assert_eq!(Some(account), channel);

        let stakeholder = rpc
            .stakeholder_account(&PROGRAM_ID, &CHANNEL_ID, &ALICE)
            .await
            .expect("Should read the account");
        assert_eq!(None, stakeholder);
    }

    #[tokio::test]
    async fn latest_blockhash() {
        let server = MockServer::start().await;
        let rpc = setup_rpc(&server).await;

        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": "getLatestBlockhash" })))
            .respond_with(rpc_result(json!({
                "context": { "slot": 1 },
                "value": {
                    "blockhash": Address::new([3; 32]).to_base58(),
                    "lastValidBlockHeight": 100,
                }
            })))
            .mount(&server)
            .await;

        assert_eq!(
            Blockhash::new_from_array([3; 32]),
            rpc.latest_blockhash().await.expect("Should get blockhash")
        );
    }

    #[tokio::test]
    async fn sends_and_polls_until_confirmed() {
        let server = MockServer::start().await;
        let rpc = setup_rpc(&server).await;
        mock_send(&server).await;

        // the transaction is not known on the first poll
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": "getSignatureStatuses" })))
            .respond_with(rpc_result(json!({ "context": { "slot": 1 }, "value": [null] })))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": "getSignatureStatuses" })))
            .respond_with(rpc_result(json!({
                "context": { "slot": 2 },
                "value": [{
                    "slot": 2,
                    "confirmations": 1,
                    "status": { "Ok": null },
                    "err": null,
                    "confirmationStatus": "confirmed"
                }]
            })))
            .mount(&server)
            .await;

        let signature = rpc
            .send_and_confirm(&signed_transaction())
            .await
            .expect("Should be confirmed");

        assert_eq!(SIGNATURE, signature);
    }

    #[tokio::test]
    async fn failed_transactions() {
        let server = MockServer::start().await;
        let rpc = setup_rpc(&server).await;
        mock_send(&server).await;

        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": "getSignatureStatuses" })))
            .respond_with(rpc_result(json!({
                "context": { "slot": 2 },
                "value": [{
                    "slot": 2,
                    "confirmations": 1,
                    "status": { "Err": { "InstructionError": [1, { "Custom": 3 }] } },
                    "err": { "InstructionError": [1, { "Custom": 3 }] },
                    "confirmationStatus": "confirmed"
                }]
            })))
            .mount(&server)
            .await;

        let result = rpc.send_and_confirm(&signed_transaction()).await;
        assert!(matches!(
            result,
            Err(Error::SubmissionFailed { signature, .. }) if signature == SIGNATURE.to_base58()
        ));
    }

    #[tokio::test]
    async fn rejected_by_preflight() {
        let server = MockServer::start().await;
        let rpc = setup_rpc(&server).await;

        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": "sendTransaction" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": { "code": -32002, "message": "Transaction simulation failed" }
            })))
            .mount(&server)
            .await;

        let result = rpc.send_and_confirm(&signed_transaction()).await;
        assert!(matches!(
            result,
            Err(Error::SubmissionFailed { reason, .. }) if reason.contains("simulation failed")
        ));
    }

    #[tokio::test]
    async fn mismatched_signature_is_an_rpc_error() {
        let server = MockServer::start().await;
        let rpc = setup_rpc(&server).await;

        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": "sendTransaction" })))
            .respond_with(rpc_result(json!(Signature::new([6; 64]).to_base58())))
            .mount(&server)
            .await;

        let result = rpc.send_and_confirm(&signed_transaction()).await;
        assert!(matches!(&result, Err(Error::Rpc(_))));
        assert!(result.unwrap_err().is_retryable());
    }

    #[tokio::test]
    async fn confirmation_times_out() {
        let server = MockServer::start().await;
        let rpc = setup_rpc(&server).await;
        mock_send(&server).await;

        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": "getSignatureStatuses" })))
            .respond_with(rpc_result(json!({ "context": { "slot": 1 }, "value": [null] })))
            .mount(&server)
            .await;

        let result = rpc.send_and_confirm(&signed_transaction()).await;
        assert!(matches!(&result, Err(Error::ConfirmationTimeout(_))));
        assert!(result.unwrap_err().is_retryable());
    }

    #[test]
    fn rejects_unknown_commitment_levels() {
        let rpc = SolanaRpc::new(
            "http://localhost:8899",
            "eventually",
            Duration::from_millis(500),
            Duration::from_millis(300),
            Duration::from_millis(20),
            discard_logger(),
        );

        assert!(matches!(rpc, Err(Error::Rpc(_))));
    }
}
