use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// The `prev_state` value of a genesis token.
pub const GENESIS: &str = "0";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("Content pointer cannot be empty")]
    Empty,
    #[error("Content pointer contains invalid character {0:?}")]
    InvalidCharacter(char),
    #[error("`0` is reserved for the genesis prev_state")]
    Reserved,
}

/// Address of a token in the content-addressed store, e.g. an IPFS Cid.
///
/// The pointer is opaque to the protocol, we only require it to be a
/// non-empty string of url-safe characters different from the genesis sentinel.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentPointer(String);

impl ContentPointer {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl slog::Value for ContentPointer {
    fn serialize(
        &self,
        _record: &slog::Record<'_>,
        key: slog::Key,
        serializer: &mut dyn slog::Serializer,
    ) -> slog::Result {
        serializer.emit_str(key, &self.0)
    }
}

impl fmt::Debug for ContentPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentPointer({})", self.0)
    }
}

impl fmt::Display for ContentPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ContentPointer {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s.to_string())
    }
}

impl TryFrom<String> for ContentPointer {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.is_empty() {
            return Err(Error::Empty);
        }

        if value == GENESIS {
            return Err(Error::Reserved);
        }

        match value
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        {
            Some(invalid) => Err(Error::InvalidCharacter(invalid)),
            None => Ok(Self(value)),
        }
    }
}

impl From<ContentPointer> for String {
    fn from(pointer: ContentPointer) -> Self {
        pointer.0
    }
}

/// The link from a token to the token that preceded it in the channel history.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PrevState {
    /// The sentinel `"0"`
    Genesis,
    Pointer(ContentPointer),
}

impl PrevState {
    pub fn is_genesis(&self) -> bool {
        matches!(self, Self::Genesis)
    }

    pub fn pointer(&self) -> Option<&ContentPointer> {
        match self {
            Self::Genesis => None,
            Self::Pointer(pointer) => Some(pointer),
        }
    }
}

impl fmt::Display for PrevState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Genesis => f.write_str(GENESIS),
            Self::Pointer(pointer) => pointer.fmt(f),
        }
    }
}

impl From<ContentPointer> for PrevState {
    fn from(pointer: ContentPointer) -> Self {
        Self::Pointer(pointer)
    }
}

impl FromStr for PrevState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            GENESIS => Ok(Self::Genesis),
            pointer => pointer.parse().map(Self::Pointer),
        }
    }
}

impl TryFrom<String> for PrevState {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            GENESIS => Ok(Self::Genesis),
            _ => ContentPointer::try_from(value).map(Self::Pointer),
        }
    }
}

impl From<PrevState> for String {
    fn from(prev_state: PrevState) -> Self {
        match prev_state {
            PrevState::Genesis => GENESIS.to_string(),
            PrevState::Pointer(pointer) => pointer.into(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn prev_state_from_str() {
        assert_eq!(Ok(PrevState::Genesis), "0".parse::<PrevState>());

        let cid = "QmcUVX7fvoLMM93uN2bD3wGTH8MXSxeL8hojYfL2Lhp7mR";
        assert_eq!(
            Ok(PrevState::Pointer(ContentPointer(cid.to_string()))),
            cid.parse::<PrevState>()
        );
        assert_eq!(cid, cid.parse::<PrevState>().unwrap().to_string());
    }

    #[test]
    fn invalid_pointers() {
        assert_eq!(Err(Error::Empty), "".parse::<ContentPointer>());
        assert_eq!(Err(Error::Reserved), "0".parse::<ContentPointer>());
        assert_eq!(
            Err(Error::InvalidCharacter('/')),
            "/ipfs/Qm".parse::<ContentPointer>()
        );
        assert_eq!(Err(Error::Empty), "".parse::<PrevState>());
    }
}
