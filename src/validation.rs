//! Validation for segment keys
//!
//! Keys name segments inside a container and are also used as filename
//! hints for content type detection, so they are restricted to a
//! filename-safe charset.

use crate::error::{DamdError, Result};
use regex::Regex;
use std::sync::OnceLock;

/// A validated segment key
///
/// # Rules
/// - ASCII letters, digits, underscore, hyphen and dot only
/// - Length: 1-255 bytes
///
/// # Examples
///
/// Valid keys:
/// - "notes"
/// - "image_info"
/// - "exif-data.v2"
///
/// Invalid keys:
/// - "" (empty)
/// - "has space"
/// - "path/like"
/// - "ünïcode"
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SegmentKey(String);

impl SegmentKey {
    /// Pattern for valid keys
    const PATTERN: &'static str = r"^[A-Za-z0-9_.\-]+$";

    /// Maximum key length in bytes
    pub const MAX_LENGTH: usize = 255;

    /// Create a new validated key
    ///
    /// # Errors
    ///
    /// Returns `InvalidKey` if the key doesn't meet validation rules.
    ///
    /// # Examples
    ///
    /// ```
    /// use damd::SegmentKey;
    ///
    /// let key = SegmentKey::new("image_info").unwrap();
    /// assert_eq!(key.as_str(), "image_info");
    ///
    /// assert!(SegmentKey::new("").is_err());
    /// assert!(SegmentKey::new("two words").is_err());
    /// ```
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        Self::validate_key(&key)?;
        Ok(SegmentKey(key))
    }

    fn validate_key(key: &str) -> Result<()> {
        if key.is_empty() {
            return Err(DamdError::InvalidKey("key cannot be empty".to_string()));
        }

        if key.len() > Self::MAX_LENGTH {
            return Err(DamdError::InvalidKey(format!(
                "key too long (max {} bytes)",
                Self::MAX_LENGTH
            )));
        }

        if !key_pattern().is_match(key) {
            return Err(DamdError::InvalidKey(format!(
                "key '{}' may only contain letters, digits, '_', '-' and '.'",
                key
            )));
        }

        Ok(())
    }

    /// Get the key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Convert to String
    pub fn into_string(self) -> String {
        self.0
    }
}

fn key_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(SegmentKey::PATTERN).expect("key pattern is a valid regex"))
}

/// Check whether `key` is a valid segment key
pub fn is_valid_key(key: &str) -> bool {
    SegmentKey::validate_key(key).is_ok()
}

impl AsRef<str> for SegmentKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SegmentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
