//! Secret strings
//!
//! Passwords travel through the pipeline wrapped in [`Secret`], which never
//! prints its contents and wipes its buffer when dropped.

use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Mask printed in place of secret values
pub const MASK: &str = "****";

/// A password or passphrase
///
/// `Debug` prints a mask and there is no `Display` impl; use
/// [`Secret::expose`] where the raw value is needed.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Secret(String);

impl Secret {
    /// Wrap a secret value
    pub fn new(value: impl Into<String>) -> Self {
        Secret(value.into())
    }

    /// Borrow the raw value
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Password as UTF-16 big-endian bytes (the encoding JKS digests use)
    pub(crate) fn utf16_be(&self) -> Vec<u8> {
        self.0.encode_utf16().flat_map(|unit| unit.to_be_bytes()).collect()
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Secret::new(value)
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Secret(value)
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret({})", MASK)
    }
}
