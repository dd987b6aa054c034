use solana_program::pubkey::{Pubkey, MAX_SEED_LEN};
use thiserror::Error;

use crate::{Address, ChannelId};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("Seed is {0} bytes long, maximum is 32")]
    MaxSeedLength(usize),
    #[error("Unable to find a viable bump seed")]
    NoViableBump,
}

/// Finds the first bump, starting from 255, for which the address is off the curve.
pub fn find_program_address(
    seeds: &[&[u8]],
    program_id: &Address,
) -> Result<(Address, u8), Error> {
    if let Some(seed) = seeds.iter().find(|seed| seed.len() > MAX_SEED_LEN) {
        return Err(Error::MaxSeedLength(seed.len()));
    }

    Pubkey::try_find_program_address(seeds, &Pubkey::from(*program_id))
        .map(|(address, bump)| (address.into(), bump))
        .ok_or(Error::NoViableBump)
}

pub fn channel_address(program_id: &Address, channel_id: &ChannelId) -> Result<(Address, u8), Error> {
    find_program_address(&[channel_id.as_bytes()], program_id)
}

pub fn stakeholder_address(
    program_id: &Address,
    channel_id: &ChannelId,
    stakeholder: &Address,
) -> Result<(Address, u8), Error> {
    find_program_address(&[channel_id.as_bytes(), stakeholder.as_bytes()], program_id)
}

pub fn oracle_address(program_id: &Address, oracle: &Address) -> Result<(Address, u8), Error> {
    find_program_address(&[oracle.as_bytes()], program_id)
}
