//! # In-memory stores
//!
//! `DashMap`-backed implementations of the repository ports. Every
//! read-modify-write happens under the shard lock held by `get_mut`/`entry`,
//! so concurrent appends and counter updates on one key never lose writes.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use domains::{
    Account, AccountRepository, Comment, CommentId, CommentRepository, DomainError, LikeDelta,
    LikeRepository, LikeTarget, Result, Thread, ThreadRepository,
};
use regex::Regex;
use tracing::debug;

use crate::comment_key_pattern;

#[derive(Debug, Default)]
pub struct MemoryAccountRepository {
    accounts: DashMap<String, Account>,
}

impl MemoryAccountRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountRepository for MemoryAccountRepository {
    async fn create(&self, account: Account) -> Result<()> {
        match self.accounts.entry(account.username.clone()) {
            Entry::Occupied(_) => Err(DomainError::Conflict(format!(
                "Username '{}' taken",
                account.username
            ))),
            Entry::Vacant(slot) => {
                slot.insert(account);
                Ok(())
            }
        }
    }

    async fn find(&self, username: &str) -> Result<Option<Account>> {
        Ok(self.accounts.get(username).map(|a| a.value().clone()))
    }

    async fn forget_thread_likes(&self, title: &str) -> Result<u64> {
        let mut touched = 0;
        for mut account in self.accounts.iter_mut() {
            if account.likes.forget_thread(title) > 0 {
                touched += 1;
            }
        }
        Ok(touched)
    }
}

#[derive(Debug, Default)]
pub struct MemoryThreadRepository {
    threads: DashMap<String, Thread>,
}

impl MemoryThreadRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn update<T>(&self, title: &str, f: impl FnOnce(&mut Thread) -> T) -> Result<T> {
        let mut thread = self
            .threads
            .get_mut(title)
            .ok_or_else(|| DomainError::not_found("Thread", title))?;
        Ok(f(thread.value_mut()))
    }
}

#[async_trait]
impl ThreadRepository for MemoryThreadRepository {
    async fn create(&self, thread: Thread) -> Result<()> {
        match self.threads.entry(thread.title.clone()) {
            Entry::Occupied(_) => Err(DomainError::Conflict(format!("Title \"{}\" taken", thread.title))),
            Entry::Vacant(slot) => {
                slot.insert(thread);
                Ok(())
            }
        }
    }

    async fn exists(&self, title: &str) -> Result<bool> {
        Ok(self.threads.contains_key(title))
    }

    async fn get(&self, title: &str) -> Result<Option<Thread>> {
        Ok(self.threads.get(title).map(|t| t.value().clone()))
    }

    async fn delete(&self, title: &str) -> Result<bool> {
        Ok(self.threads.remove(title).is_some())
    }

    async fn increment_post_count(&self, title: &str) -> Result<u64> {
        self.update(title, |t| {
            t.post_count += 1;
            t.post_count
        })
    }

    async fn increment_image_count(&self, title: &str) -> Result<()> {
        self.update(title, |t| t.image_count += 1)
    }

    async fn update_timestamp(&self, title: &str, at: DateTime<Utc>) -> Result<()> {
        self.update(title, |t| t.bumped_at = at)
    }

    async fn add_top_level_comment(&self, title: &str, id: &CommentId) -> Result<()> {
        self.update(title, |t| t.top_level_comment_ids.push(id.clone()))
    }

    async fn change_like_count(&self, title: &str, delta: i64) -> Result<()> {
        self.update(title, |t| t.like_count += delta)
    }

    async fn list(&self) -> Result<Vec<Thread>> {
        Ok(self.threads.iter().map(|t| t.value().clone()).collect())
    }

    async fn total(&self) -> Result<u64> {
        Ok(self.threads.len() as u64)
    }
}

#[derive(Debug, Default)]
pub struct MemoryCommentRepository {
    comments: DashMap<CommentId, Comment>,
}

impl MemoryCommentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.comments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }

    fn update(&self, id: &CommentId, f: impl FnOnce(&mut Comment)) -> Result<()> {
        let mut comment = self
            .comments
            .get_mut(id)
            .ok_or_else(|| DomainError::not_found("Comment", id.as_str()))?;
        f(comment.value_mut());
        Ok(())
    }
}

#[async_trait]
impl CommentRepository for MemoryCommentRepository {
    async fn create(&self, comment: Comment) -> Result<()> {
        match self.comments.entry(comment.id.clone()) {
            Entry::Occupied(_) => Err(DomainError::Conflict(format!(
                "Comment '{}' already exists",
                comment.id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(comment);
                Ok(())
            }
        }
    }

    async fn load(&self, id: &CommentId) -> Result<Option<Comment>> {
        Ok(self.comments.get(id).map(|c| c.value().clone()))
    }

    async fn load_many(&self, ids: &[CommentId]) -> Result<Vec<Comment>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.comments.get(id).map(|c| c.value().clone()))
            .collect())
    }

    async fn add_child(&self, parent: &CommentId, child: &CommentId) -> Result<()> {
        self.update(parent, |c| c.children.push(child.clone()))
    }

    async fn change_like_count(&self, id: &CommentId, delta: i64) -> Result<()> {
        self.update(id, |c| c.like_count += delta)
    }

    async fn soft_delete(&self, id: &CommentId) -> Result<()> {
        self.update(id, Comment::soft_delete)
    }

    async fn delete_all_for_thread(&self, title: &str) -> Result<u64> {
        let pattern = Regex::new(&comment_key_pattern(title)).map_err(DomainError::internal)?;
        let mut removed = 0;
        self.comments.retain(|id, _| {
            let matched = pattern.is_match(id.as_str());
            if matched {
                removed += 1;
            }
            !matched
        });
        debug!(title, removed, "comments removed");
        Ok(removed)
    }
}

/// Like toggles over the in-memory stores.
///
/// Locks are always taken account first, then target, and both are held
/// until the ledger and the counter have moved.
#[derive(Debug, Clone)]
pub struct MemoryLikeRepository {
    accounts: Arc<MemoryAccountRepository>,
    threads: Arc<MemoryThreadRepository>,
    comments: Arc<MemoryCommentRepository>,
}

impl MemoryLikeRepository {
    pub fn new(
        accounts: Arc<MemoryAccountRepository>,
        threads: Arc<MemoryThreadRepository>,
        comments: Arc<MemoryCommentRepository>,
    ) -> Self {
        Self {
            accounts,
            threads,
            comments,
        }
    }
}

#[async_trait]
impl LikeRepository for MemoryLikeRepository {
    async fn toggle_like(&self, username: &str, target: &LikeTarget) -> Result<LikeDelta> {
        let mut account = self
            .accounts
            .accounts
            .get_mut(username)
            .ok_or_else(|| DomainError::not_found("Account", username))?;
        let delta = if account.likes.contains(target) {
            LikeDelta::Unliked
        } else {
            LikeDelta::Liked
        };

        match target {
            LikeTarget::Thread(title) => {
                let mut thread = self
                    .threads
                    .threads
                    .get_mut(title)
                    .ok_or_else(|| DomainError::not_found("Thread", title))?;
                thread.like_count += delta.amount();
            }
            LikeTarget::Comment(id) => {
                let mut comment = self
                    .comments
                    .comments
                    .get_mut(id)
                    .filter(|c| delta == LikeDelta::Unliked || !c.is_deleted())
                    .ok_or_else(|| DomainError::not_found("Comment", id.as_str()))?;
                comment.like_count += delta.amount();
            }
        }
        Ok(account.likes.toggle(target))
    }
}
