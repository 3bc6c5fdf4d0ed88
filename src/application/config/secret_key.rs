use std::fmt;
use std::str::FromStr;

use zeroize::Zeroize;

/// Pre-shared key used by the gossip layer to encrypt cluster traffic.
///
/// Accepted lengths are those of AES-128, AES-192 and AES-256. The key
/// material is wiped on drop and never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey(Vec<u8>);

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SecretKeyError {
    #[error("secret key is not valid hex: {0}")]
    NotHex(#[from] hex::FromHexError),

    #[error("secret key must be 16, 24 or 32 bytes (AES-128, AES-192, AES-256), got {0} bytes")]
    InvalidLength(usize),
}

impl SecretKey {
    pub const VALID_LENGTHS: [usize; 3] = [16, 24, 32];

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, SecretKeyError> {
        if !Self::VALID_LENGTHS.contains(&bytes.len()) {
            let len = bytes.len();
            let mut bytes = bytes;
            bytes.zeroize();
            return Err(SecretKeyError::InvalidLength(len));
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromStr for SecretKey {
    type Err = SecretKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_bytes(hex::decode(s.trim())?)
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretKey(<{} bytes redacted>)", self.0.len())
    }
}

impl Drop for SecretKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}
