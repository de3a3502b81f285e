//! Secure string handling with automatic memory zeroization
//!
//! Collected token values live in [`SecureString`] so they are zeroed when an
//! entry is dropped by a reset or clear, and never show up in `Debug` output.

use std::fmt;
use std::ops::Deref;
use zeroize::Zeroize;

use super::Sanitizer;

/// A string that securely clears its memory when dropped
///
/// # Example
///
/// ```
/// use tokenscope_lib::security::SecureString;
///
/// let token = SecureString::new("abc123xyz789".to_string());
/// assert_eq!(token.as_str(), "abc123xyz789");
/// assert_eq!(token.masked(), "abc1********z789");
/// ```
#[derive(Clone)]
pub struct SecureString {
    inner: String,
}

impl SecureString {
    /// Creates a new SecureString from a String
    ///
    /// The original String is consumed and its memory will be zeroed when
    /// this SecureString is dropped.
    pub fn new(s: String) -> Self {
        Self { inner: s }
    }

    /// Returns the string as a slice
    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// Returns the length of the string in bytes
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns true if the string is empty
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns the display-safe form of the value
    pub fn masked(&self) -> String {
        Sanitizer::mask_token(&self.inner)
    }

    /// Consumes the SecureString and returns the inner String
    ///
    /// # Warning
    ///
    /// The returned String is not zeroed on drop. Only the explicit copy
    /// action hands raw values out.
    pub fn into_inner(mut self) -> String {
        std::mem::take(&mut self.inner)
    }
}

impl Drop for SecureString {
    fn drop(&mut self) {
        self.inner.zeroize();
    }
}

impl Zeroize for SecureString {
    fn zeroize(&mut self) {
        self.inner.zeroize();
    }
}

impl Deref for SecureString {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl AsRef<str> for SecureString {
    fn as_ref(&self) -> &str {
        &self.inner
    }
}

impl From<String> for SecureString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecureString {
    fn from(s: &str) -> Self {
        Self::new(s.to_string())
    }
}

// No Display impl; Debug is redacted so entries can derive Debug safely
impl fmt::Debug for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureString")
            .field("len", &self.inner.len())
            .field("content", &"[REDACTED]")
            .finish()
    }
}

impl PartialEq for SecureString {
    fn eq(&self, other: &Self) -> bool {
        constant_time_eq(self.inner.as_bytes(), other.inner.as_bytes())
    }
}

impl Eq for SecureString {}

impl PartialEq<str> for SecureString {
    fn eq(&self, other: &str) -> bool {
        constant_time_eq(self.inner.as_bytes(), other.as_bytes())
    }
}

impl PartialEq<&str> for SecureString {
    fn eq(&self, other: &&str) -> bool {
        constant_time_eq(self.inner.as_bytes(), other.as_bytes())
    }
}

impl PartialEq<String> for SecureString {
    fn eq(&self, other: &String) -> bool {
        constant_time_eq(self.inner.as_bytes(), other.as_bytes())
    }
}

/// Constant-time byte comparison to prevent timing attacks
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
