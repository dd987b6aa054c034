#![deny(clippy::all)]
#![deny(rust_2018_idioms)]

use std::sync::Arc;

use clap::{crate_version, App, Arg};

use adapter::{
    ed25519::{Ed25519, Options},
    Adapter, Ipfs, SolanaRpc,
};
use oracle::{application::Config, register_oracle, Application, Oracle};
use primitives::{config::configuration, util::logging::new_logger, Reconstructor};
use slog::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = App::new("Oracle")
        .version(crate_version!())
        .arg(
            Arg::new("config")
                .help("the config file for the oracle")
                .takes_value(true),
        )
        .arg(
            Arg::new("keystoreFile")
                .long("keystoreFile")
                .short('k')
                .help("path to the JSON keypair file of the oracle")
                .required(true)
                .takes_value(true),
        )
        .subcommand(
            App::new("register")
                .about("registers the oracle keypair with the channel program and exits"),
        )
        .get_matches();

    let env_config = Config::from_env()?;
    let config = configuration(env_config.env, cli.value_of("config"))?;
    let logger = new_logger("oracle");

    let keystore_file = cli
        .value_of("keystoreFile")
        .expect("keystoreFile is required");
    let adapter = Adapter::new(Ed25519::init(Options {
        keystore_file: keystore_file.to_string(),
    })?)
    .unlock()?;

    if adapter.whoami() != config.oracle_address {
        warn!(&logger, "The keypair is not the configured oracle"; "keypair" => %adapter.whoami(), "configured" => %config.oracle_address);
    }

    let chain = Arc::new(SolanaRpc::from_config(&config, logger.clone())?);

    if cli.subcommand_matches("register").is_some() {
        register_oracle(&adapter, chain.as_ref(), &config.program_id, &logger).await?;

        return Ok(());
    }

    let ipfs = Arc::new(Ipfs::from_config(&config, logger.clone())?);
    let reconstructor = Reconstructor::new(
        ipfs.clone(),
        ipfs,
        chain,
        config.program_id,
        config.max_history_depth,
        logger.clone(),
    );

    info!(&logger, "Running Oracle in {:?} environment", env_config.env; "program" => %config.program_id);

    Application::new(Oracle::new(adapter, reconstructor, logger.clone()), logger)
        .run(env_config.socket_addr())
        .await;

    Ok(())
}
