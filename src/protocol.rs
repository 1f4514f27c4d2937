//! Message definitions
//!
//! Every channel in the channel set carries one fixed message shape:
//!
//! | Channel      | Message                       |
//! |--------------|-------------------------------|
//! | line-task    | [`LineTask`]                  |
//! | result       | [`PartialResult`]             |
//! | word-request | [`WordRequest`]               |
//! | digit-reply  | [`DigitReply`]                |
//! | mutex-token  | [`crate::sync::mutex::Token`] |
//!
//! Text fields are bounded to [`MAX_TEXT_LEN`] bytes so a message never
//! outgrows its slot.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Maximum length in bytes of any text field carried on a channel
pub const MAX_TEXT_LEN: usize = 254;

/// Errors raised while building a message
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MessageError {
    #[error("{field} is {len} bytes, limit is {max} bytes")]
    TooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },
}

/// UTF-8 string of at most [`MAX_TEXT_LEN`] bytes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BoundedText(String);

impl BoundedText {
    /// Wrap `text`, rejecting anything longer than [`MAX_TEXT_LEN`] bytes
    ///
    /// # Arguments
    ///
    /// * `field` - Name reported in the error
    /// * `text` - Candidate contents
    ///
    /// # Errors
    ///
    /// `MessageError::TooLong` when `text` exceeds the limit.
    pub fn new(field: &'static str, text: impl Into<String>) -> Result<Self, MessageError> {
        let text = text.into();
        if text.len() > MAX_TEXT_LEN {
            return Err(MessageError::TooLong {
                field,
                len: text.len(),
                max: MAX_TEXT_LEN,
            });
        }
        Ok(Self(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<String> for BoundedText {
    type Error = MessageError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new("text", value)
    }
}

impl From<BoundedText> for String {
    fn from(value: BoundedText) -> Self {
        value.0
    }
}

impl fmt::Display for BoundedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One unit of work: a chunk of input text and the prefix to look for
///
/// Immutable once built; consumed by exactly one worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineTask {
    text: BoundedText,
    pattern: BoundedText,
}

impl LineTask {
    pub fn new(text: impl Into<String>, pattern: impl Into<String>) -> Result<Self, MessageError> {
        Ok(Self {
            text: BoundedText::new("line text", text)?,
            pattern: BoundedText::new("pattern", pattern)?,
        })
    }

    pub fn text(&self) -> &str {
        self.text.as_str()
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }
}

/// Per-task counts emitted by the worker that consumed the task
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialResult {
    /// Tokens that start with the pattern
    pub word_count: u32,
    /// Decimal digits across those tokens
    pub digit_count: u32,
}

/// A matched word on its way to the counting service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordRequest(BoundedText);

impl WordRequest {
    pub fn new(word: impl Into<String>) -> Result<Self, MessageError> {
        Ok(Self(BoundedText::new("word", word)?))
    }

    pub fn word(&self) -> &str {
        self.0.as_str()
    }
}

/// Digit count for the most recent word request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigitReply(pub u32);
