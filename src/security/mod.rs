//! Security module - Masking, input validation, and memory handling
//!
//! This module provides security primitives for:
//! - Masking collected tokens for the display surface and logs
//! - Validating user supplied policy input
//! - Secure string handling with zeroization

mod sanitizer;
mod secure_string;

pub use sanitizer::{Sanitizer, SanitizerError, MASKED_PLACEHOLDER, MASK_FILL};
pub use secure_string::SecureString;
