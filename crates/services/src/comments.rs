use std::sync::Arc;

use chrono::Utc;
use domains::{
    Comment, CommentId, CommentRepository, DomainError, MediaStore, Result, ThreadRepository,
    Upload,
};
use tracing::{debug, info, instrument};

use crate::accounts::AccountService;
use crate::deadline::Deadline;
use crate::tree::CommentTreeBuilder;
use crate::views::CommentView;

/// Where a new comment attaches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyTo {
    /// A top-level comment of the thread itself.
    Thread,
    /// A reply to an existing comment of the same thread.
    Comment(CommentId),
}

impl ReplyTo {
    /// Interprets the `post_parent` / `parent_id` request pair.
    ///
    /// With `post_parent` set, `parent_id` must name the thread being posted to.
    /// Otherwise it is a comment ID, in canonical or transport form.
    pub fn from_request(post_parent: bool, parent_id: &str, thread_title: &str) -> Result<Self> {
        if post_parent {
            if parent_id != thread_title {
                return Err(DomainError::validation(format!(
                    "Parent '{parent_id}' is not the thread '{thread_title}'"
                )));
            }
            return Ok(Self::Thread);
        }
        CommentId::from_transport(parent_id).map(Self::Comment)
    }
}

/// Input of [`CommentService::create_comment`].
#[derive(Debug, Clone)]
pub struct NewComment {
    pub username: String,
    pub password: String,
    pub thread_title: String,
    pub reply_to: ReplyTo,
    pub text: String,
    pub image: Option<Upload>,
}

#[derive(Clone)]
pub struct CommentService {
    auth: AccountService,
    threads: Arc<dyn ThreadRepository>,
    comments: Arc<dyn CommentRepository>,
    media: Arc<dyn MediaStore>,
    tree: CommentTreeBuilder,
    deadline: Deadline,
    bump_on_comment: bool,
    deleted_image_path: String,
}

impl CommentService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        auth: AccountService,
        threads: Arc<dyn ThreadRepository>,
        comments: Arc<dyn CommentRepository>,
        media: Arc<dyn MediaStore>,
        deadline: Deadline,
        bump_on_comment: bool,
        deleted_image_path: impl Into<String>,
    ) -> Self {
        Self {
            auth,
            tree: CommentTreeBuilder::new(Arc::clone(&comments), deadline),
            threads,
            comments,
            media,
            deadline,
            bump_on_comment,
            deleted_image_path: deleted_image_path.into(),
        }
    }

    /// Creates a comment and links it under its parent. Returns the minted ID.
    ///
    /// The record is written before it is linked: a failure between the two
    /// leaves an unreachable record, never a dangling child reference.
    #[instrument(skip(self, request), fields(username = %request.username, thread = %request.thread_title))]
    pub async fn create_comment(&self, request: NewComment) -> Result<CommentId> {
        if request.text.trim().is_empty() {
            return Err(DomainError::validation("Comment cannot be empty"));
        }
        self.auth.authorize(&request.username, &request.password).await?;

        let title = request.thread_title.as_str();
        if !self.deadline.run("check thread", self.threads.exists(title)).await? {
            return Err(DomainError::not_found("Thread", title));
        }
        if let ReplyTo::Comment(parent) = &request.reply_to {
            if !parent.belongs_to(title) {
                return Err(DomainError::validation(format!(
                    "Comment '{parent}' does not belong to thread '{title}'"
                )));
            }
            let parent_exists = self
                .deadline
                .run("load parent", self.comments.load(parent))
                .await?
                .is_some();
            if !parent_exists {
                return Err(DomainError::not_found("Comment", parent.as_str()));
            }
        }

        let image_path = match request.image {
            Some(upload) => self.media.save_image(upload).await?,
            None => None,
        };
        let has_image = image_path.is_some();

        let posts = self
            .deadline
            .run("count post", self.threads.increment_post_count(title))
            .await?;
        let id = CommentId::mint(posts.saturating_sub(1), title);
        let now = Utc::now();
        let comment = Comment::new(id.clone(), &request.username, request.text, image_path, now);
        self.deadline.run("create comment", self.comments.create(comment)).await?;

        match &request.reply_to {
            ReplyTo::Thread => {
                self.deadline
                    .run("link comment", self.threads.add_top_level_comment(title, &id))
                    .await?
            }
            ReplyTo::Comment(parent) => {
                self.deadline
                    .run("link reply", self.comments.add_child(parent, &id))
                    .await?
            }
        }

        if has_image {
            self.deadline
                .run("count image", self.threads.increment_image_count(title))
                .await?;
        }
        if self.bump_on_comment {
            self.deadline
                .run("bump thread", self.threads.update_timestamp(title, now))
                .await?;
        }
        info!(comment_id = %id, "comment created");
        Ok(id)
    }

    /// The thread's hydrated comment forest, top-level comments in creation order.
    #[instrument(skip(self))]
    pub async fn get_comments(&self, thread_title: &str) -> Result<Vec<CommentView>> {
        let thread = self
            .deadline
            .run("load thread", self.threads.get(thread_title))
            .await?
            .ok_or_else(|| DomainError::not_found("Thread", thread_title))?;
        let forest = self.tree.load_forest(&thread.top_level_comment_ids).await?;
        debug!(roots = forest.len(), "comment forest loaded");
        let now = Utc::now();
        Ok(forest
            .iter()
            .map(|tree| CommentView::render(tree, now, &self.deleted_image_path))
            .collect())
    }

    /// A single comment with its replies hydrated.
    pub async fn get_comment_tree(&self, id: &CommentId) -> Result<CommentView> {
        let tree = self
            .tree
            .load_tree(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Comment", id.as_str()))?;
        Ok(CommentView::render(&tree, Utc::now(), &self.deleted_image_path))
    }

    /// Soft-deletes the requester's own comment. Replies stay in place.
    #[instrument(skip(self, password))]
    pub async fn delete_comment(&self, username: &str, password: &str, id: &CommentId) -> Result<()> {
        self.auth.authorize(username, password).await?;
        let comment = self
            .deadline
            .run("load comment", self.comments.load(id))
            .await?
            .ok_or_else(|| DomainError::not_found("Comment", id.as_str()))?;
        if comment.author != username {
            return Err(DomainError::Forbidden("Not your comment".into()));
        }
        if comment.is_deleted() {
            return Err(DomainError::Conflict(format!("Comment '{id}' is already deleted")));
        }
        self.deadline.run("delete comment", self.comments.soft_delete(id)).await?;
        info!(comment_id = %id, "comment deleted");
        Ok(())
    }
}
