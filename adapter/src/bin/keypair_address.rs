//! Prints the address of a keypair file.
use adapter::{ed25519::Options, prelude::*, Ed25519};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let keystore_file = std::env::args()
        .nth(1)
        .ok_or("Usage: keypair_address <keypair file>")?;

    let client = Ed25519::init(Options { keystore_file })?;
    // unlocking checks that the keypair is consistent
    let unlocked = client.unlock()?;

    println!("{}", unlocked.whoami());

    Ok(())
}
