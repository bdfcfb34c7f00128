//! rusty-forum/crates/services/src/lib.rs
//!
//! Business logic of the forum. Services hold `Arc<dyn Port>` handles and are
//! cheap to clone; every store call runs under a [`Deadline`].

pub mod accounts;
pub mod comments;
pub mod deadline;
pub mod likes;
pub mod listing;
pub mod recency;
pub mod threads;
pub mod tree;
pub mod views;

use std::sync::Arc;
use std::time::Duration;

use domains::{
    AccountRepository, CommentRepository, CredentialHasher, LikeRepository, MediaStore,
    SessionStore, ThreadRepository,
};

pub use accounts::AccountService;
pub use comments::{CommentService, NewComment, ReplyTo};
pub use deadline::Deadline;
pub use likes::{target_from, LikeService};
pub use threads::{NewThread, ThreadService};
pub use tree::CommentTreeBuilder;
pub use views::{CommentView, ThreadSummary, ThreadView};

/// The adapters a [`Forum`] is wired from.
#[derive(Clone)]
pub struct Ports {
    pub accounts: Arc<dyn AccountRepository>,
    pub threads: Arc<dyn ThreadRepository>,
    pub comments: Arc<dyn CommentRepository>,
    pub likes: Arc<dyn LikeRepository>,
    pub sessions: Arc<dyn SessionStore>,
    pub hasher: Arc<dyn CredentialHasher>,
    pub media: Arc<dyn MediaStore>,
}

/// Product decisions that are configuration rather than code.
#[derive(Debug, Clone)]
pub struct ForumPolicy {
    /// Move a thread to the top of the time ordering when it gets a comment
    pub bump_on_comment: bool,
    pub store_timeout: Duration,
    /// Image shown in place of a deleted comment's attachment
    pub deleted_image_path: String,
}

impl Default for ForumPolicy {
    fn default() -> Self {
        Self {
            bump_on_comment: false,
            store_timeout: Duration::from_secs(5),
            deleted_image_path: "/img/deleted.png".to_string(),
        }
    }
}

/// Every service, sharing one set of ports.
#[derive(Clone)]
pub struct Forum {
    pub accounts: AccountService,
    pub threads: ThreadService,
    pub comments: CommentService,
    pub likes: LikeService,
}

impl Forum {
    pub fn new(ports: Ports, policy: ForumPolicy) -> Self {
        let deadline = Deadline::new(policy.store_timeout);
        let accounts = AccountService::new(
            Arc::clone(&ports.accounts),
            ports.sessions,
            ports.hasher,
            deadline,
        );
        let threads = ThreadService::new(
            accounts.clone(),
            ports.accounts,
            Arc::clone(&ports.threads),
            Arc::clone(&ports.comments),
            Arc::clone(&ports.media),
            deadline,
        );
        let comments = CommentService::new(
            accounts.clone(),
            ports.threads,
            ports.comments,
            ports.media,
            deadline,
            policy.bump_on_comment,
            policy.deleted_image_path,
        );
        let likes = LikeService::new(accounts.clone(), ports.likes, deadline);
        Self {
            accounts,
            threads,
            comments,
            likes,
        }
    }
}
