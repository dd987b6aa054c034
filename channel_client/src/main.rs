#![deny(rust_2018_idioms)]
#![deny(clippy::all)]

use std::{error::Error, sync::Arc};

use clap::{crate_version, App, Arg, ArgMatches};

use adapter::{
    ed25519::{Ed25519, Options},
    Adapter, Ipfs, SolanaRpc,
};
use channel_client::{Driver, OracleApi, OracleInterface, Outcome};
use primitives::{
    config::{configuration, Environment},
    util::logging::new_logger,
    Address, ChannelId, Reconstructor,
};
use slog::{info, Logger};

fn channel_arg() -> Arg<'static> {
    Arg::new("channel")
        .help("the id of the channel")
        .required(true)
        .takes_value(true)
}

fn amount_arg() -> Arg<'static> {
    Arg::new("amount")
        .help("the amount in the smallest token denomination")
        .required(true)
        .takes_value(true)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = App::new("Channel client")
        .version(crate_version!())
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .help("the config file for the channel client")
                .takes_value(true),
        )
        .arg(
            Arg::new("keystoreFile")
                .long("keystoreFile")
                .short('k')
                .help("path to the JSON keypair file of the stakeholder")
                .required(true)
                .takes_value(true),
        )
        .arg(
            Arg::new("oracleUrl")
                .long("oracleUrl")
                .short('u')
                .help("the URL of the Oracle REST API")
                .default_value("http://127.0.0.1:8005")
                .takes_value(true),
        )
        .subcommand(
            App::new("open")
                .about("opens a channel with a deposit")
                .arg(channel_arg())
                .arg(amount_arg()),
        )
        .subcommand(
            App::new("join")
                .about("joins an open channel with a deposit")
                .arg(channel_arg())
                .arg(amount_arg()),
        )
        .subcommand(
            App::new("update")
                .about("transfers an amount to another stakeholder")
                .arg(channel_arg())
                .arg(amount_arg())
                .arg(
                    Arg::new("receiver")
                        .help("the address of the receiving stakeholder")
                        .required(true)
                        .takes_value(true),
                ),
        )
        .subcommand(
            App::new("leave")
                .about("leaves the channel with the whole balance")
                .arg(channel_arg()),
        )
        .subcommand(
            App::new("invite")
                .about("invites a stakeholder to join the channel")
                .arg(channel_arg())
                .arg(
                    Arg::new("invitee")
                        .help("the address of the invited stakeholder")
                        .required(true)
                        .takes_value(true),
                ),
        )
        .subcommand(
            App::new("state")
                .about("prints the reconstructed state of the channel")
                .arg(channel_arg()),
        )
        .subcommand(
            App::new("history")
                .about("prints every token of the channel, newest first")
                .arg(channel_arg()),
        )
        .get_matches();

    let environment: Environment = match std::env::var("ENV") {
        Ok(env) => serde_json::from_value(serde_json::Value::String(env))?,
        Err(_) => Environment::default(),
    };
    let config = configuration(environment, cli.value_of("config"))?;
    let logger = new_logger("channel_client");

    let keystore_file = cli
        .value_of("keystoreFile")
        .expect("keystoreFile is required");
    let signer = Adapter::new(Ed25519::init(Options {
        keystore_file: keystore_file.to_string(),
    })?)
    .unlock()?;

    let oracle_url = cli
        .value_of("oracleUrl")
        .expect("oracleUrl has a default value");
    let oracle = OracleApi::new(oracle_url, config.fetch_timeout(), logger.clone())?;

    let ipfs = Arc::new(Ipfs::from_config(&config, logger.clone())?);
    let chain = Arc::new(SolanaRpc::from_config(&config, logger.clone())?);
    let reconstructor = Reconstructor::new(
        ipfs.clone(),
        ipfs,
        chain,
        config.program_id,
        config.max_history_depth,
        logger.clone(),
    );
    let driver = Driver::new(oracle, config.oracle_address, reconstructor, logger.clone());

    match cli.subcommand() {
        Some(("open", args)) => {
            let outcome = driver
                .open(&channel(args)?, &signer, amount(args)?)
                .await?;
            log_outcome(&logger, &outcome);
        }
        Some(("join", args)) => {
            let outcome = driver
                .join(&channel(args)?, &signer, amount(args)?)
                .await?;
            log_outcome(&logger, &outcome);
        }
        Some(("update", args)) => {
            let outcome = driver
                .update(
                    &channel(args)?,
                    &signer,
                    amount(args)?,
                    address(args, "receiver")?,
                )
                .await?;
            log_outcome(&logger, &outcome);
        }
        Some(("leave", args)) => {
            let outcome = driver.leave(&channel(args)?, &signer).await?;
            log_outcome(&logger, &outcome);
        }
        Some(("invite", args)) => {
            let transaction = driver
                .invite(&channel(args)?, &signer, address(args, "invitee")?)
                .await?;
            info!(&logger, "Invited"; "transaction" => %transaction);
        }
        Some(("state", args)) => {
            let snapshot = driver.state(&channel(args)?).await?;
            info!(&logger, "Channel state"; "cid" => &snapshot.pointer);
            println!("{}", serde_json::to_string_pretty(&snapshot.state)?);
        }
        Some(("history", args)) => {
            let history = driver.oracle().history(&channel(args)?).await?;
            println!("{}", serde_json::to_string_pretty(&history)?);
        }
        _ => return Err("Expected one of the subcommands, see --help".into()),
    }

    Ok(())
}

fn channel(args: &ArgMatches) -> Result<ChannelId, Box<dyn Error>> {
    Ok(args.value_of("channel").unwrap_or_default().parse()?)
}

fn amount(args: &ArgMatches) -> Result<u64, Box<dyn Error>> {
    Ok(args.value_of("amount").unwrap_or_default().parse()?)
}

fn address(args: &ArgMatches, name: &str) -> Result<Address, Box<dyn Error>> {
    Ok(args.value_of(name).unwrap_or_default().parse()?)
}

fn log_outcome(logger: &Logger, outcome: &Outcome) {
    let transaction = outcome
        .transaction
        .map(|signature| signature.to_string())
        .unwrap_or_else(|| "off-chain".to_string());

    info!(
        logger,
        "Action accepted";
        "action" => %outcome.token.data().action(),
        "cid" => &outcome.pointer,
        "transaction" => transaction
    );
}
