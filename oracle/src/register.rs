use adapter::{prelude::*, Adapter, UnlockedState};
use primitives::{
    chain::{self, instruction, ChainWriter},
    Address, Signature,
};
use slog::{info, Logger};

use crate::Error;

/// Registers the oracle keypair with the program, so that its cosigned
/// tokens can be anchored.
///
/// Every `ModifyOracle` instruction toggles the registration, an already
/// active oracle is left as is and `None` is returned.
pub async fn register_oracle<C, W>(
    adapter: &Adapter<C, UnlockedState<C>>,
    chain: &W,
    program_id: &Address,
    logger: &Logger,
) -> Result<Option<Signature>, Error>
where
    C: Unlocked,
    W: ChainWriter,
{
    let oracle = adapter.whoami();

    if let Some(account) = chain.oracle_account(program_id, &oracle).await? {
        if account.oracle_status {
            info!(logger, "Oracle is already registered"; "oracle" => %oracle);

            return Ok(None);
        }
    }

    let instruction =
        instruction::modify_oracle(program_id, &oracle).map_err(chain::Error::from)?;
    let blockhash = chain.latest_blockhash().await?;
    let transaction =
        chain::transaction(&[instruction], &oracle, &blockhash, |message| adapter.sign(message))?;

    let signature = chain.send_and_confirm(&transaction).await?;
    info!(logger, "Oracle registered"; "oracle" => %oracle, "transaction" => %signature);

    Ok(Some(signature))
}

#[cfg(test)]
mod test {
    use super::*;
    use adapter::{
        dummy::DummyChain,
        test_util::{keypair_adapter, ORACLE_SECRET},
    };
    use primitives::{chain::ChainReader, test_util::PROGRAM_ID, util::logging::discard_logger};

    #[tokio::test]
    async fn registers_the_oracle_once() {
        let chain = DummyChain::new(*PROGRAM_ID);
        let adapter = keypair_adapter(&ORACLE_SECRET);
        let logger = discard_logger();

        let signature = register_oracle(&adapter, &chain, &PROGRAM_ID, &logger)
            .await
            .expect("Should register");
        assert!(signature.is_some());
        assert_eq!(1, chain.transaction_count());

        let account = chain
            .oracle_account(&PROGRAM_ID, &adapter.whoami())
            .await
            .expect("Should read")
            .expect("Should exist");
        assert!(account.oracle_status);

        let again = register_oracle(&adapter, &chain, &PROGRAM_ID, &logger)
            .await
            .expect("Should succeed");
        assert_eq!(None, again);
        assert_eq!(1, chain.transaction_count());
    }

    #[tokio::test]
    async fn failed_registration_is_retryable() {
        let chain = DummyChain::new(*PROGRAM_ID);
        let adapter = keypair_adapter(&ORACLE_SECRET);
        chain.fail_next_submission();

        let err = register_oracle(&adapter, &chain, &PROGRAM_ID, &discard_logger())
            .await
            .expect_err("Should fail");

        assert!(matches!(err, Error::SubmissionFailed(_)));
        assert!(err.is_retryable());
    }
}
