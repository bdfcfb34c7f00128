//! Presentation shapes returned by the services. Timestamps are already
//! rendered as recency strings; soft-deleted comments are masked here.

use chrono::{DateTime, Utc};
use domains::{CommentTree, Thread, DELETED_SENTINEL};
use serde::{Deserialize, Serialize};

use crate::recency::relative_recency;

/// One row of the thread listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadSummary {
    pub author: String,
    pub title: String,
    pub body: String,
    pub time: String,
    pub images: u64,
    pub posts: u64,
    pub likes: i64,
}

impl ThreadSummary {
    pub fn render(thread: &Thread, now: DateTime<Utc>) -> Self {
        Self {
            author: thread.author.clone(),
            title: thread.title.clone(),
            body: thread.body.clone(),
            time: relative_recency(thread.bumped_at, now),
            images: thread.image_count,
            posts: thread.post_count,
            likes: thread.like_count,
        }
    }
}

/// A single thread as shown above its comments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadView {
    pub title: String,
    pub author: String,
    pub post_body: String,
    #[serde(rename = "imagePath", skip_serializing_if = "Option::is_none", default)]
    pub image_path: Option<String>,
    pub likes: i64,
    pub posts: u64,
    pub images: u64,
    pub time: String,
}

impl ThreadView {
    pub fn render(thread: Thread, now: DateTime<Utc>) -> Self {
        Self {
            time: relative_recency(thread.created_at, now),
            title: thread.title,
            author: thread.author,
            post_body: thread.body,
            image_path: thread.image_path,
            likes: thread.like_count,
            posts: thread.post_count,
            images: thread.image_count,
        }
    }
}

/// A hydrated comment node with its replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentView {
    pub comment_id: String,
    /// Transport-safe form of `comment_id`, usable as an HTML element ID
    pub element_id: String,
    pub author: String,
    pub comment_body: String,
    pub time: String,
    pub likes: i64,
    #[serde(rename = "imagePath", skip_serializing_if = "Option::is_none", default)]
    pub image_path: Option<String>,
    pub deleted: bool,
    pub children: Vec<CommentView>,
}

impl CommentView {
    /// Maps a hydrated tree to its view, formatting every node's timestamp.
    pub fn render(tree: &CommentTree, now: DateTime<Utc>, deleted_image_path: &str) -> Self {
        let comment = &tree.comment;
        let deleted = comment.is_deleted();
        let (author, body, image_path) = if deleted {
            (
                DELETED_SENTINEL.to_string(),
                DELETED_SENTINEL.to_string(),
                Some(deleted_image_path.to_string()),
            )
        } else {
            (comment.author.clone(), comment.body.clone(), comment.image_path.clone())
        };
        Self {
            comment_id: comment.id.to_string(),
            element_id: comment.id.to_transport(),
            author,
            comment_body: body,
            time: relative_recency(comment.created_at, now),
            likes: comment.like_count,
            image_path,
            deleted,
            children: tree
                .replies
                .iter()
                .map(|reply| Self::render(reply, now, deleted_image_path))
                .collect(),
        }
    }
}
