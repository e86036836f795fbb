//! On-chain account addresses.

use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use std::fmt;
use std::str::FromStr;

use crate::error::AddressError;

/// Domain separator appended when deriving a named object address.
const OBJECT_FROM_SEED_SCHEME: u8 = 0xFE;

/// A 32-byte account or object address.
///
/// Parses from `0x`-prefixed or bare hex, short or long form. Displays in
/// long form, except for special addresses (`0x0`..`0xf`) which use the
/// short form.
///
/// # Examples
///
/// ```
/// use decibel_core::types::AccountAddress;
///
/// let addr: AccountAddress = "0x1".parse().unwrap();
/// assert_eq!(addr.to_string(), "0x1");
/// assert_eq!(addr.to_long_string().len(), 66);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountAddress([u8; 32]);

impl AccountAddress {
    /// Length of an address in bytes.
    pub const LENGTH: usize = 32;

    /// Creates an address from raw bytes.
    #[must_use]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns the raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Derives the address of an object created by `creator` from `seed`.
    ///
    /// `sha3_256(creator || seed || 0xFE)`
    #[must_use]
    pub fn for_named_object(creator: &Self, seed: &[u8]) -> Self {
        let mut hasher = Sha3_256::new();
        hasher.update(creator.0);
        hasher.update(seed);
        hasher.update([OBJECT_FROM_SEED_SCHEME]);
        let digest = hasher.finalize();

        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }

    /// Returns true for `0x0` through `0xf`.
    #[must_use]
    pub fn is_special(&self) -> bool {
        self.0[..31].iter().all(|b| *b == 0) && self.0[31] < 0x10
    }

    /// Returns the `0x`-prefixed 64 digit form.
    #[must_use]
    pub fn to_long_string(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

/// BCS-encodes a string: ULEB128 length prefix followed by the UTF-8 bytes.
#[must_use]
pub fn bcs_encode_str(value: &str) -> Vec<u8> {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len() + 5);
    let mut len = bytes.len();
    loop {
        let mut byte = (len & 0x7f) as u8;
        len >>= 7;
        if len != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if len == 0 {
            break;
        }
    }
    out.extend_from_slice(bytes);
    out
}

impl FromStr for AccountAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        if digits.is_empty() || digits.len() > 64 {
            return Err(AddressError::InvalidLength {
                value: s.to_string(),
                length: digits.len(),
            });
        }

        let padded = format!("{digits:0>64}");
        let decoded = hex::decode(&padded).map_err(|_| AddressError::InvalidHex {
            value: s.to_string(),
        })?;

        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&decoded);
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for AccountAddress {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AccountAddress> for String {
    fn from(address: AccountAddress) -> Self {
        address.to_string()
    }
}

impl fmt::Display for AccountAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_special() {
            write!(f, "0x{:x}", self.0[31])
        } else {
            write!(f, "0x{}", hex::encode(self.0))
        }
    }
}

impl fmt::Debug for AccountAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountAddress({self})")
    }
}
