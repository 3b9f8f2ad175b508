//! Value Objects for domain models.
//!
//! Value Objects are immutable objects that represent values in the domain.
//! They are compared by their value, not by identity.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::ValueObjectError;

/// Maximum comment length accepted by the chat form.
pub const MAX_COMMENT_CHARS: usize = 512;

/// Single-use sequencing token issued by the server.
///
/// The most recently received nonce is echoed on the next command so the
/// server can correlate it with its acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Nonce(String);

impl Nonce {
    /// Create a new Nonce.
    ///
    /// # Arguments
    ///
    /// * `value` - The nonce string as sent by the server
    ///
    /// # Returns
    ///
    /// A Result containing the Nonce or an error if validation fails
    pub fn new(value: String) -> Result<Self, ValueObjectError> {
        if value.is_empty() {
            return Err(ValueObjectError::NonceEmpty);
        }
        Ok(Self(value))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Nonce {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque per-viewer token hash.
///
/// Identifies a user in the roster and the author of a chat message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TokenHash(String);

impl TokenHash {
    /// Create a new TokenHash.
    pub fn new(value: String) -> Result<Self, ValueObjectError> {
        if value.is_empty() {
            return Err(ValueObjectError::TokenHashEmpty);
        }
        Ok(Self(value))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form used in logs (first four characters).
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(4) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }
}

impl TryFrom<String> for TokenHash {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for TokenHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An sRGB colour in `#rrggbb` notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    red: u8,
    green: u8,
    blue: u8,
}

impl Color {
    /// Create a colour from its components.
    pub fn from_rgb(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// Parse `#rrggbb` (hex digits in either case).
    pub fn parse(value: &str) -> Result<Self, ValueObjectError> {
        let invalid = || ValueObjectError::ColorInvalidFormat(value.to_string());
        let hex = value.strip_prefix('#').ok_or_else(invalid)?;
        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let component = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16).map_err(|_| invalid())
        };
        Ok(Self {
            red: component(0..2)?,
            green: component(2..4)?,
            blue: component(4..6)?,
        })
    }

    /// Components as a `(red, green, blue)` tuple.
    pub fn rgb(&self) -> (u8, u8, u8) {
        (self.red, self.green, self.blue)
    }
}

impl TryFrom<String> for Color {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.red, self.green, self.blue)
    }
}

/// Signed digest identifying a captcha challenge.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CaptchaDigest(String);

impl CaptchaDigest {
    /// Create a new CaptchaDigest.
    pub fn new(value: String) -> Result<Self, ValueObjectError> {
        if value.is_empty() {
            return Err(ValueObjectError::CaptchaDigestEmpty);
        }
        Ok(Self(value))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CaptchaDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Server-assigned chat message sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Seq(u64);

impl Seq {
    /// Create a new Seq.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the inner u64 value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Seq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Chat comment typed by the viewer.
///
/// Empty comments are allowed only when they carry a captcha answer, which
/// is decided by the submit use case, so validation here is length only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment(String);

impl Comment {
    /// Create a new Comment.
    ///
    /// # Arguments
    ///
    /// * `value` - The comment text
    ///
    /// # Returns
    ///
    /// A Result containing the Comment or an error if it is too long
    pub fn new(value: String) -> Result<Self, ValueObjectError> {
        let len = value.chars().count();
        if len > MAX_COMMENT_CHARS {
            return Err(ValueObjectError::CommentTooLong {
                max: MAX_COMMENT_CHARS,
                actual: len,
            });
        }
        Ok(Self(value))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the comment is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Convert to owned String.
    pub fn into_string(self) -> String {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nonce_new_empty_fails() {
        // テスト項目: 空の nonce は作成できない
        // given (前提条件):
        let value = "".to_string();

        // when (操作):
        let result = Nonce::new(value);

        // then (期待する結果):
        assert_eq!(result.unwrap_err(), ValueObjectError::NonceEmpty);
    }

    #[test]
    fn test_token_hash_short() {
        // テスト項目: token hash の短縮表記は先頭 4 文字
        // given (前提条件):
        let hash = TokenHash::new("abcdef0123".to_string()).unwrap();
        let tiny = TokenHash::new("ab".to_string()).unwrap();

        // then (期待する結果):
        assert_eq!(hash.short(), "abcd");
        assert_eq!(tiny.short(), "ab");
    }

    #[test]
    fn test_color_parse_success() {
        // テスト項目: #rrggbb 形式の色を解析できる
        // when (操作):
        let color = Color::parse("#1aFF00").unwrap();

        // then (期待する結果):
        assert_eq!(color.rgb(), (0x1a, 0xff, 0x00));
        assert_eq!(color.to_string(), "#1aff00");
    }

    #[test]
    fn test_color_parse_invalid_fails() {
        // テスト項目: 不正な形式の色は拒否される
        for value in ["1aff00", "#1aff0", "#1aff000", "#gggggg", "", "#"] {
            assert_eq!(
                Color::parse(value),
                Err(ValueObjectError::ColorInvalidFormat(value.to_string())),
                "{value:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_comment_too_long_fails() {
        // テスト項目: 513 文字以上のコメントは作成できない
        // given (前提条件):
        let value = "あ".repeat(MAX_COMMENT_CHARS + 1);

        // when (操作):
        let result = Comment::new(value);

        // then (期待する結果):
        assert_eq!(
            result.unwrap_err(),
            ValueObjectError::CommentTooLong {
                max: MAX_COMMENT_CHARS,
                actual: MAX_COMMENT_CHARS + 1
            }
        );
    }

    #[test]
    fn test_comment_counts_characters_not_bytes() {
        // テスト項目: 文字数で上限を判定する（マルチバイト文字 512 個は許容）
        let value = "あ".repeat(MAX_COMMENT_CHARS);
        assert!(Comment::new(value).is_ok());
    }

    #[test]
    fn test_seq_ordering() {
        // テスト項目: シーケンス番号は順序付けできる
        assert!(Seq::new(1) < Seq::new(2));
    }
}
