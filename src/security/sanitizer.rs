//! Data sanitization for secure logging and display
//!
//! Provides utilities to mask collected tokens before they reach the display
//! surface or the logs, and to validate user supplied policy input.

use thiserror::Error;

/// Placeholder used between the revealed prefix and suffix of a token
pub const MASK_FILL: &str = "********";

/// Constant returned for tokens too short to partially reveal
pub const MASKED_PLACEHOLDER: &str = "************";

/// Number of characters revealed at each end of a masked token
const REVEALED_CHARS: usize = 4;

/// Shortest token that is partially revealed instead of fully masked
const MIN_PARTIAL_REVEAL_LEN: usize = 12;

/// Errors that can occur during input validation
#[derive(Debug, Error, PartialEq)]
pub enum SanitizerError {
    /// Input contains potentially dangerous characters
    #[error("Invalid input: contains dangerous characters")]
    InvalidInput,

    /// Input is empty when it shouldn't be
    #[error("Input cannot be empty")]
    EmptyInput,

    /// Input exceeds maximum allowed length
    #[error("Input exceeds maximum length of {0}")]
    TooLong(usize),
}

/// Sanitizer for sensitive data
///
/// Provides static methods to sanitize tokens and URLs before logging
/// or display.
pub struct Sanitizer;

impl Sanitizer {
    /// Masks a token for display
    ///
    /// Reveals the first and last 4 characters and replaces the middle with
    /// a fixed-width placeholder, so the masked form never reveals the token
    /// length. Tokens shorter than 12 characters are replaced entirely.
    ///
    /// # Examples
    ///
    /// ```
    /// use tokenscope_lib::security::Sanitizer;
    ///
    /// assert_eq!(Sanitizer::mask_token("abc123xyz789"), "abc1********z789");
    /// assert_eq!(Sanitizer::mask_token("short"), "************");
    /// ```
    pub fn mask_token(token: &str) -> String {
        let len = token.chars().count();
        if len < MIN_PARTIAL_REVEAL_LEN {
            return MASKED_PLACEHOLDER.to_string();
        }

        let head: String = token.chars().take(REVEALED_CHARS).collect();
        let tail: String = token.chars().skip(len - REVEALED_CHARS).collect();
        format!("{}{}{}", head, MASK_FILL, tail)
    }

    /// Sanitizes a URL by removing query parameters and fragments
    ///
    /// Request URLs often carry tokens in query strings, so every URL shown
    /// or logged goes through here first.
    ///
    /// # Examples
    ///
    /// ```
    /// use tokenscope_lib::security::Sanitizer;
    ///
    /// assert_eq!(
    ///     Sanitizer::sanitize_url("https://api.example.com/auth?token=secret"),
    ///     "https://api.example.com/auth"
    /// );
    /// assert_eq!(Sanitizer::sanitize_url("cookie:sid"), "cookie:sid");
    /// ```
    pub fn sanitize_url(url: &str) -> String {
        url.split('?')
            .next()
            .unwrap_or(url)
            .split('#')
            .next()
            .unwrap_or(url)
            .to_string()
    }

    /// Validates that input doesn't contain dangerous characters
    ///
    /// Checks for characters that could be used in injection attacks:
    /// - HTML/XML: < > " ' &
    /// - Null bytes: \0
    /// - Control characters (except common whitespace)
    ///
    /// # Examples
    ///
    /// ```
    /// use tokenscope_lib::security::Sanitizer;
    ///
    /// assert!(Sanitizer::validate_input("x-api-token").is_ok());
    /// assert!(Sanitizer::validate_input("<script>").is_err());
    /// assert!(Sanitizer::validate_input("hello\0world").is_err());
    /// ```
    pub fn validate_input(input: &str) -> Result<(), SanitizerError> {
        if input.is_empty() {
            return Err(SanitizerError::EmptyInput);
        }

        let dangerous_chars = ['<', '>', '"', '\'', '&', '\0'];
        if input.chars().any(|c| dangerous_chars.contains(&c)) {
            return Err(SanitizerError::InvalidInput);
        }

        if input
            .chars()
            .any(|c| c.is_control() && c != '\t' && c != '\n' && c != '\r')
        {
            return Err(SanitizerError::InvalidInput);
        }

        Ok(())
    }

    /// Validates input with a maximum length constraint
    pub fn validate_input_with_max_length(
        input: &str,
        max_length: usize,
    ) -> Result<(), SanitizerError> {
        if input.len() > max_length {
            return Err(SanitizerError::TooLong(max_length));
        }
        Self::validate_input(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_token_reveals_ends() {
        let masked = Sanitizer::mask_token("eyJhbGciOiJIUzI1NiJ9.payload.sig");
        assert!(masked.starts_with("eyJh"));
        assert!(masked.ends_with(".sig"));
        assert_eq!(masked, "eyJh********.sig");
    }

    #[test]
    fn test_mask_token_fixed_width() {
        let short = Sanitizer::mask_token("abcdefghijkl");
        let long = Sanitizer::mask_token(&"x".repeat(400));
        assert_eq!(short.len(), long.len());
    }

    #[test]
    fn test_mask_token_boundary() {
        assert_eq!(Sanitizer::mask_token("abcdefghijk"), MASKED_PLACEHOLDER);
        assert_eq!(Sanitizer::mask_token("abcdefghijkl"), "abcd********ijkl");
    }

    #[test]
    fn test_mask_token_short_leaks_nothing() {
        let token = "s3cr3t-tok";
        let masked = Sanitizer::mask_token(token);
        assert_eq!(masked, MASKED_PLACEHOLDER);
        assert!(masked.chars().all(|c| c == '*'));
        assert_eq!(Sanitizer::mask_token(""), MASKED_PLACEHOLDER);
    }

    #[test]
    fn test_mask_token_multibyte() {
        // Character based, never splits a UTF-8 sequence
        let masked = Sanitizer::mask_token("ééééxxxxxxxxäääß");
        assert_eq!(masked, "éééé********äääß");
    }

    #[test]
    fn test_sanitize_url_with_query() {
        assert_eq!(
            Sanitizer::sanitize_url("https://api.example.com/auth?token=secret&user=admin"),
            "https://api.example.com/auth"
        );
    }

    #[test]
    fn test_sanitize_url_with_fragment() {
        assert_eq!(
            Sanitizer::sanitize_url("https://example.com/page#access_token=abc"),
            "https://example.com/page"
        );
    }

    #[test]
    fn test_sanitize_url_synthetic_label() {
        assert_eq!(
            Sanitizer::sanitize_url("localStorage:auth_token"),
            "localStorage:auth_token"
        );
    }

    #[test]
    fn test_validate_input_normal() {
        assert!(Sanitizer::validate_input("X-Api-Key").is_ok());
        assert!(Sanitizer::validate_input("with\ttab").is_ok());
    }

    #[test]
    fn test_validate_input_empty() {
        assert_eq!(Sanitizer::validate_input(""), Err(SanitizerError::EmptyInput));
    }

    #[test]
    fn test_validate_input_html_chars() {
        assert_eq!(
            Sanitizer::validate_input("<script>"),
            Err(SanitizerError::InvalidInput)
        );
        assert_eq!(
            Sanitizer::validate_input("a&b"),
            Err(SanitizerError::InvalidInput)
        );
    }

    #[test]
    fn test_validate_input_control_chars() {
        assert_eq!(
            Sanitizer::validate_input("hello\x07world"),
            Err(SanitizerError::InvalidInput)
        );
    }

    #[test]
    fn test_validate_input_with_max_length() {
        assert!(Sanitizer::validate_input_with_max_length("short", 10).is_ok());
        assert_eq!(
            Sanitizer::validate_input_with_max_length("this is too long", 5),
            Err(SanitizerError::TooLong(5))
        );
    }
}
