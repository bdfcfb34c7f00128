//! # Identifier Scheme
//!
//! Comments are keyed by a composite ID `"<sequence>-<thread title>"`. Thread
//! titles may not contain the delimiter characters, so every ID splits back into
//! exactly one `(sequence, title)` pair and the owning thread can be recovered
//! from the key alone.
//!
//! HTML element IDs cannot carry spaces, so clients send IDs in a transport
//! encoding where spaces become underscores. [`CommentId::from_transport`] is the
//! exact inverse of [`CommentId::to_transport`] for every valid title.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{DomainError, Result};

/// Separates the sequence number from the thread title.
pub const ID_DELIMITER: char = '-';
/// Stands in for a space in the transport encoding.
pub const TRANSPORT_SPACE: char = '_';
/// Longest accepted thread title, in characters.
pub const MAX_TITLE_LENGTH: usize = 120;

/// Checks a thread title against the rules that keep comment IDs splittable.
pub fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(DomainError::validation("A thread title is required"));
    }
    if title.contains(ID_DELIMITER) || title.contains(TRANSPORT_SPACE) {
        return Err(DomainError::validation(
            "Title may not contain dashes nor underscores",
        ));
    }
    if title.contains('\'') || title.contains('"') {
        return Err(DomainError::validation("Title may not contain quotes"));
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(DomainError::validation(format!(
            "Title exceeds maximum length of {MAX_TITLE_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Composite comment key. Immutable once minted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CommentId(String);

impl CommentId {
    /// Builds the ID for the `sequence`-th post of `thread_title`.
    ///
    /// Callers pass a title that already passed [`validate_title`].
    pub fn mint(sequence: u64, thread_title: &str) -> Self {
        Self(format!("{sequence}{ID_DELIMITER}{thread_title}"))
    }

    /// Parses a canonical ID, rejecting anything that does not split cleanly.
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = || DomainError::validation(format!("Malformed comment ID '{raw}'"));
        let (sequence, title) = raw.split_once(ID_DELIMITER).ok_or_else(invalid)?;
        if sequence.is_empty() || !sequence.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if sequence.parse::<u64>().is_err() {
            return Err(invalid());
        }
        if title.is_empty() || title.contains(ID_DELIMITER) || title.contains(TRANSPORT_SPACE) {
            return Err(invalid());
        }
        Ok(Self(raw.to_string()))
    }

    /// Maps the transport encoding (underscores for spaces) back to canonical form.
    pub fn from_transport(encoded: &str) -> Result<Self> {
        Self::parse(&encoded.replace(TRANSPORT_SPACE, " "))
    }

    /// Encoding safe for use as an HTML element ID.
    pub fn to_transport(&self) -> String {
        self.0.replace(' ', &TRANSPORT_SPACE.to_string())
    }

    /// Splits the ID back into `(sequence, thread title)`.
    pub fn split(&self) -> (u64, &str) {
        let (sequence, title) = self
            .0
            .split_once(ID_DELIMITER)
            .unwrap_or(("0", self.0.as_str()));
        (sequence.parse().unwrap_or_default(), title)
    }

    pub fn sequence(&self) -> u64 {
        self.split().0
    }

    pub fn thread_title(&self) -> &str {
        self.split().1
    }

    /// True when this comment lives in the thread titled `title`.
    pub fn belongs_to(&self, title: &str) -> bool {
        self.thread_title() == title
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CommentId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CommentId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<CommentId> for String {
    fn from(id: CommentId) -> Self {
        id.0
    }
}

impl AsRef<str> for CommentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
