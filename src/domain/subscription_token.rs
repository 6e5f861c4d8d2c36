use rand::{rngs::OsRng, RngCore};
use std::fmt::Write;

const TOKEN_BYTES: usize = 32;

/// Opaque token embedded in the confirmation link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionToken(String);

impl SubscriptionToken {
    /// Generate a new token from 32 bytes of OS randomness, hex encoded.
    pub fn generate() -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);

        let token = bytes
            .iter()
            .fold(String::with_capacity(TOKEN_BYTES * 2), |mut s, b| {
                let _ = write!(s, "{b:02x}");
                s
            });

        Self(token)
    }

    /// Wrap a token received from a client or read back from storage.
    pub fn from_raw(token: String) -> Self {
        Self(token)
    }
}

impl AsRef<str> for SubscriptionToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
