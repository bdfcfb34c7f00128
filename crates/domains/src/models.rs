//! # Domain Models
//!
//! These structs represent the core entities of Rusty-Forum. Threads and
//! comments are stored flat and keyed; the comment forest is an adjacency list
//! (`children` hold IDs), never an owning pointer structure.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::ids::CommentId;
use crate::ledger::LikeLedger;

/// Reserved display name for soft-deleted content. Never a valid username.
pub const DELETED_SENTINEL: &str = "[DELETED]";

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Unique, immutable primary key
    pub username: String,
    /// Opaque PHC string produced by the credential hasher
    pub password_hash: String,
    pub likes: LikeLedger,
}

impl Account {
    pub fn new(username: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password_hash: password_hash.into(),
            likes: LikeLedger::default(),
        }
    }
}

/// A root post owning a forest of comments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    /// Unique, immutable primary key
    pub title: String,
    /// Weak reference to `Account::username`
    pub author: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    /// Sort key for the `time` ordering. Equal to `created_at` unless bumping is enabled.
    pub bumped_at: DateTime<Utc>,
    pub image_path: Option<String>,
    /// Starts at 1 (the thread itself) and grows by one per comment anywhere in the tree
    pub post_count: u64,
    pub image_count: u64,
    pub like_count: i64,
    /// Roots of the comment forest, in creation order
    pub top_level_comment_ids: Vec<CommentId>,
}

impl Thread {
    pub fn new(
        title: impl Into<String>,
        author: impl Into<String>,
        body: impl Into<String>,
        image_path: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let image_count = u64::from(image_path.is_some());
        Self {
            title: title.into(),
            author: author.into(),
            body: body.into(),
            created_at: now,
            bumped_at: now,
            image_path,
            post_count: 1,
            image_count,
            like_count: 0,
            top_level_comment_ids: Vec::new(),
        }
    }
}

/// Lifecycle of a comment. Deleted comments keep their ID and children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentState {
    #[default]
    Active,
    Deleted,
}

/// A single flat comment record. `children` is an ID list, not a hydrated tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub author: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub like_count: i64,
    pub image_path: Option<String>,
    /// Direct replies, in creation order
    pub children: Vec<CommentId>,
    pub state: CommentState,
}

impl Comment {
    pub fn new(
        id: CommentId,
        author: impl Into<String>,
        body: impl Into<String>,
        image_path: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            author: author.into(),
            body: body.into(),
            created_at: now,
            like_count: 0,
            image_path,
            children: Vec::new(),
            state: CommentState::Active,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.state == CommentState::Deleted
    }

    /// Marks the comment deleted and drops its content. Structure is untouched.
    pub fn soft_delete(&mut self) {
        self.state = CommentState::Deleted;
        self.body.clear();
        self.image_path = None;
    }
}

/// A comment with its replies hydrated, as produced by the tree builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentTree {
    pub comment: Comment,
    pub replies: Vec<CommentTree>,
}

impl CommentTree {
    /// Number of nodes in this subtree, including the root.
    pub fn size(&self) -> usize {
        1 + self.replies.iter().map(CommentTree::size).sum::<usize>()
    }
}

/// Raw bytes of an uploaded file, before the media store accepts or rejects it.
#[derive(Debug, Clone)]
pub struct Upload {
    pub data: Bytes,
    pub content_type: Option<mime::Mime>,
    pub file_name: Option<String>,
}

/// Ordering key for thread listings. Always descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreadOrder {
    #[default]
    Time,
    Likes,
    Posts,
    Images,
}

impl FromStr for ThreadOrder {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "time" => Ok(Self::Time),
            "likes" => Ok(Self::Likes),
            "posts" => Ok(Self::Posts),
            "images" => Ok(Self::Images),
            other => Err(DomainError::validation(format!(
                "Invalid order '{other}': expected one of time, likes, posts, images"
            ))),
        }
    }
}

impl fmt::Display for ThreadOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Time => "time",
            Self::Likes => "likes",
            Self::Posts => "posts",
            Self::Images => "images",
        };
        f.write_str(name)
    }
}

/// Threads per virtual page. `All` disables paging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSize {
    All,
    Count(u64),
}

impl FromStr for PageSize {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        s.trim()
            .parse::<u64>()
            .map(Self::Count)
            .map_err(|_| DomainError::validation(format!("Invalid amount '{s}'")))
    }
}

/// An authenticated session, created on login and ended on logout or expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub username: String,
    pub started_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_thread_counts_itself_and_its_image() {
        let now = Utc::now();
        let plain = Thread::new("T", "alice", "body", None, now);
        assert_eq!((plain.post_count, plain.image_count, plain.like_count), (1, 0, 0));

        let pictured = Thread::new("T", "alice", "body", Some("/uploads/x.png".into()), now);
        assert_eq!(pictured.image_count, 1);
        assert_eq!(pictured.bumped_at, pictured.created_at);
    }

    #[test]
    fn soft_delete_keeps_structure() {
        let mut comment = Comment::new(CommentId::mint(1, "T"), "bob", "hi", Some("/a.png".into()), Utc::now());
        comment.children.push(CommentId::mint(2, "T"));
        comment.soft_delete();

        assert!(comment.is_deleted());
        assert_eq!(comment.children, vec![CommentId::mint(2, "T")]);
        assert_eq!(comment.author, "bob");
        assert!(comment.image_path.is_none());
    }

    #[test]
    fn order_and_page_size_parse() {
        assert_eq!("Likes".parse::<ThreadOrder>().unwrap(), ThreadOrder::Likes);
        assert!("newest".parse::<ThreadOrder>().is_err());
        assert_eq!("All".parse::<PageSize>().unwrap(), PageSize::All);
        assert_eq!("25".parse::<PageSize>().unwrap(), PageSize::Count(25));
        assert!("-1".parse::<PageSize>().is_err());
    }
}
