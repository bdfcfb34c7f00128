//! # Core Traits (Ports)
//!
//! Any adapter must implement these traits to be used by the services layer.
//!
//! Every read-modify-write on a single record (`add_child`, the counter
//! updates) is a single atomic operation of the implementing store. Services
//! never read a list, modify it and write it back, so two concurrent requests
//! on the same key cannot lose each other's update. A like toggle spans two
//! records and is one operation of [`LikeRepository`] for the same reason.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::Result;
use crate::ids::CommentId;
use crate::ledger::{LikeDelta, LikeTarget};
use crate::models::{Account, Comment, Session, Thread, Upload};

/// Persistence contract for accounts and their like ledgers.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Fails with `Conflict` if the username is taken.
    async fn create(&self, account: Account) -> Result<()>;
    async fn find(&self, username: &str) -> Result<Option<Account>>;
    /// Removes a thread and its comments from every ledger. Returns accounts touched.
    async fn forget_thread_likes(&self, title: &str) -> Result<u64>;
}

/// Like toggling across an account's ledger and the target's counter.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait LikeRepository: Send + Sync {
    /// Flips `target` in the account's ledger and moves the target's like
    /// count by the resulting delta, both or neither.
    ///
    /// `NotFound` if the account or the target is absent. A deleted comment
    /// only accepts the un-like of an existing ledger entry; a fresh like on
    /// it is `NotFound` as well.
    async fn toggle_like(&self, username: &str, target: &LikeTarget) -> Result<LikeDelta>;
}

/// Persistence contract for threads (root posts).
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ThreadRepository: Send + Sync {
    /// Fails with `Conflict` if the title is taken.
    async fn create(&self, thread: Thread) -> Result<()>;
    async fn exists(&self, title: &str) -> Result<bool>;
    async fn get(&self, title: &str) -> Result<Option<Thread>>;
    /// Returns whether a record was removed.
    async fn delete(&self, title: &str) -> Result<bool>;
    /// Atomically increments the post count and returns the new value.
    async fn increment_post_count(&self, title: &str) -> Result<u64>;
    async fn increment_image_count(&self, title: &str) -> Result<()>;
    async fn update_timestamp(&self, title: &str, at: DateTime<Utc>) -> Result<()>;
    /// Atomically appends to the thread's top-level comment list.
    async fn add_top_level_comment(&self, title: &str, id: &CommentId) -> Result<()>;
    async fn change_like_count(&self, title: &str, delta: i64) -> Result<()>;
    /// Every thread, unordered.
    async fn list(&self) -> Result<Vec<Thread>>;
    async fn total(&self) -> Result<u64>;
}

/// Persistence contract for flat comment records.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Fails with `Conflict` if the ID already exists.
    async fn create(&self, comment: Comment) -> Result<()>;
    async fn load(&self, id: &CommentId) -> Result<Option<Comment>>;
    /// Loads every ID that exists; missing IDs are silently absent from the result.
    async fn load_many(&self, ids: &[CommentId]) -> Result<Vec<Comment>>;
    /// Atomically appends `child` to `parent`'s children. `NotFound` if the parent is absent.
    async fn add_child(&self, parent: &CommentId, child: &CommentId) -> Result<()>;
    async fn change_like_count(&self, id: &CommentId, delta: i64) -> Result<()>;
    async fn soft_delete(&self, id: &CommentId) -> Result<()>;
    /// Removes every comment whose ID names `title` as its thread. Returns rows removed.
    async fn delete_all_for_thread(&self, title: &str) -> Result<u64>;
}

/// Login-state contract. Replaces any process-wide "logged in" map.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Starts (or refreshes) the user's session.
    async fn begin(&self, username: &str) -> Result<Session>;
    /// Ends the session. Returns whether one was active.
    async fn end(&self, username: &str) -> Result<bool>;
    async fn is_active(&self, username: &str) -> Result<bool>;
}

/// Password hashing contract. The primitive is the adapter's choice.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CredentialHasher: Send + Sync {
    async fn hash(&self, password: &str) -> Result<String>;
    async fn verify(&self, password: &str, hash: &str) -> Result<bool>;
}

/// Media storage contract for image attachments.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Stores the upload if it is an image and returns its public path.
    /// Returns `None` for non-image payloads.
    async fn save_image(&self, upload: Upload) -> Result<Option<String>>;
}
