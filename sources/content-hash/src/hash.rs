use crate::error::{self, Result};
use snafu::ensure;
use std::fmt;
use std::str::FromStr;

/// Number of hex characters in a [`Hash`]'s textual form.
pub const HASH_HEX_LEN: usize = 64;

/// A 64-hex-character content digest, as described in the manifest body grammar.
///
/// The all-zero hash is reserved and denotes "no content" (a deleted or ghosted file).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hash([u8; 32]);

impl Hash {
    /// The reserved all-zero hash, used for deleted/ghosted files.
    pub const ZERO: Hash = Hash([0u8; 32]);

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub(crate) fn from_mac(mac: [u8; 32]) -> Self {
        Hash(mac)
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self)
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for Hash {
    type Err = error::Error;

    fn from_str(s: &str) -> Result<Self> {
        ensure!(s.len() == HASH_HEX_LEN, error::InvalidHashSnafu { value: s });
        let bytes = match hex::decode(s) {
            Ok(bytes) if bytes.len() == 32 => bytes,
            _ => return error::InvalidHashSnafu { value: s }.fail(),
        };
        let mut out = [0u8; 32];
        out.copy_from_slice(&bytes);
        Ok(Hash(out))
    }
}
