use std::fs;

use async_trait::async_trait;
use primitives::{Address, Signature};
use solana_sdk::signer::{
    keypair::{keypair_from_seed, Keypair},
    Signer,
};

use super::{
    error::{Error, KeystoreError},
    LockedWallet, UnlockedWallet, WalletState,
};
use crate::prelude::*;

#[derive(Debug, Clone)]
pub struct Options {
    /// Path to the JSON keypair file
    pub keystore_file: String,
}

#[derive(Debug, Clone)]
/// Ed25519 client implementation for the [`crate::Adapter`].
pub struct Ed25519<S = LockedWallet> {
    address: Address,
    pub(crate) state: S,
}

impl Ed25519<LockedWallet> {
    pub fn init(opts: Options) -> Result<Self, Error> {
        let keystore_contents =
            fs::read_to_string(&opts.keystore_file).map_err(KeystoreError::ReadingFile)?;

        Self::from_keystore_json(&keystore_contents)
    }

    /// Parses the JSON array of the keypair bytes.
    pub fn from_keystore_json(json: &str) -> Result<Self, Error> {
        let keypair: Vec<u8> =
            serde_json::from_str(json).map_err(KeystoreError::Deserialization)?;

        if keypair.len() != 64 {
            return Err(KeystoreError::KeypairLength(keypair.len()).into());
        }

        let address = Address::from_slice(&keypair[32..]).map_err(KeystoreError::AddressInvalid)?;

        Ok(Self {
            address,
            state: LockedWallet::KeyStore { keypair },
        })
    }

    /// Creates a client from the 32 bytes secret key.
    pub fn from_secret(secret: [u8; 32]) -> Result<Self, Error> {
        let address = keypair(&secret)?.pubkey().into();

        Ok(Self {
            address,
            state: LockedWallet::SecretKey(secret),
        })
    }
}

fn keypair(secret: &[u8]) -> Result<Keypair, Error> {
    keypair_from_seed(secret).map_err(|err| Error::WalletUnlock(err.to_string()))
}

impl Unlockable for Ed25519<LockedWallet> {
    type Unlocked = Ed25519<UnlockedWallet>;

    fn unlock(&self) -> Result<Ed25519<UnlockedWallet>, <Self::Unlocked as Locked>::Error> {
        let wallet = match &self.state {
            LockedWallet::KeyStore { keypair: bytes } => {
                if bytes.len() != 64 {
                    return Err(KeystoreError::KeypairLength(bytes.len()).into());
                }

                let wallet = keypair(&bytes[..32])?;
                if wallet.pubkey().as_ref() != &bytes[32..] {
                    return Err(Error::WalletUnlock(
                        "public key does not belong to the secret key".into(),
                    ));
                }

                wallet
            }
            LockedWallet::SecretKey(secret) => keypair(secret)?,
        };

        Ok(Ed25519 {
            address: self.address,
            state: UnlockedWallet { wallet },
        })
    }
}

#[async_trait]
impl<S: WalletState> Locked for Ed25519<S> {
    type Error = Error;

    fn whoami(&self) -> Address {
        self.address
    }

    fn verify(
        &self,
        signer: Address,
        payload: &[u8],
        signature: &Signature,
    ) -> Result<bool, Self::Error> {
        let signature = solana_sdk::signature::Signature::from(*signature);

        // a signer which is not a valid public key never verifies
        Ok(signature.verify(signer.as_bytes(), payload))
    }
}

#[async_trait]
impl Unlocked for Ed25519<UnlockedWallet> {
    fn sign(&self, payload: &[u8]) -> Result<Signature, Self::Error> {
        Ok(self.state.wallet.sign_message(payload).into())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_util::{ALICE_SECRET, ORACLE_SECRET};
    use primitives::test_util::{ALICE, ORACLE};

    #[test]
    fn init_from_keystore_file() {
        let client = Ed25519::init(Options {
            keystore_file: "../docs/keys/oracle.json".into(),
        })
        .expect("Should init the keystore");

        assert_eq!(*ORACLE, client.whoami());

        let unlocked = client.unlock().expect("Should unlock");
        assert_eq!(*ORACLE, unlocked.whoami());
    }

    #[test]
    fn keystore_errors() {
        assert!(matches!(
            Ed25519::from_keystore_json("[1, 2, 3]"),
            Err(Error::Keystore(KeystoreError::KeypairLength(3)))
        ));
        assert!(matches!(
            Ed25519::from_keystore_json("{}"),
            Err(Error::Keystore(KeystoreError::Deserialization(_)))
        ));

        // a secret key followed by a public key of another keypair
        let mut keypair = ORACLE_SECRET.to_vec();
        keypair.extend_from_slice(ALICE.as_bytes());
        let json = serde_json::to_string(&keypair).expect("Should serialize");

        let client = Ed25519::from_keystore_json(&json).expect("Should parse the keypair");
        assert!(matches!(client.unlock(), Err(Error::WalletUnlock(_))));
    }

    #[test]
    fn sign_and_verify() {
        let oracle = Ed25519::from_secret(*ORACLE_SECRET)
            .and_then(|client| client.unlock())
            .expect("Should unlock");
        let payload = b"channel payload";

        let signature = oracle.sign(payload).expect("Should sign");

        assert!(oracle.verify(*ORACLE, payload, &signature).unwrap());
        // another signer
        assert!(!oracle.verify(*ALICE, payload, &signature).unwrap());
        // another payload
        assert!(!oracle.verify(*ORACLE, b"channel payloaD", &signature).unwrap());

        // a single flipped bit of the signature
        let mut tampered = signature.to_bytes();
        tampered[10] ^= 1;
        assert!(!oracle
            .verify(*ORACLE, payload, &Signature::new(tampered))
            .unwrap());

        // a Locked client can still verify
        let locked = Ed25519::from_secret(*ALICE_SECRET).expect("Valid secret");
        assert!(locked.verify(*ORACLE, payload, &signature).unwrap());
    }
}
