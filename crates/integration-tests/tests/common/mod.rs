//! Shared fixtures: a forum wired to the in-memory adapters.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use auth_adapters::{Argon2Hasher, MemorySessionStore};
use domains::CommentId;
use services::{Forum, ForumPolicy, NewComment, NewThread, Ports, ReplyTo};
use storage_adapters::{
    LocalMediaStore, MemoryAccountRepository, MemoryCommentRepository, MemoryLikeRepository,
    MemoryThreadRepository,
};

pub const PASSWORD: &str = "hunter2";

/// A forum plus direct handles on its stores for assertions.
pub struct Harness {
    pub forum: Forum,
    pub accounts: Arc<MemoryAccountRepository>,
    pub threads: Arc<MemoryThreadRepository>,
    pub comments: Arc<MemoryCommentRepository>,
    /// Where the media store writes uploads
    pub upload_dir: PathBuf,
}

pub fn harness() -> Harness {
    harness_with(ForumPolicy::default())
}

pub fn harness_with(policy: ForumPolicy) -> Harness {
    static N: AtomicUsize = AtomicUsize::new(0);
    let upload_dir = std::env::temp_dir().join(format!(
        "forum-it-{}-{}",
        std::process::id(),
        N.fetch_add(1, Ordering::Relaxed)
    ));

    let accounts = Arc::new(MemoryAccountRepository::new());
    let threads = Arc::new(MemoryThreadRepository::new());
    let comments = Arc::new(MemoryCommentRepository::new());
    let ports = Ports {
        accounts: accounts.clone(),
        threads: threads.clone(),
        comments: comments.clone(),
        likes: Arc::new(MemoryLikeRepository::new(
            accounts.clone(),
            threads.clone(),
            comments.clone(),
        )),
        sessions: Arc::new(MemorySessionStore::default()),
        hasher: Arc::new(Argon2Hasher::from_costs(1024, 1, 1).unwrap()),
        media: Arc::new(LocalMediaStore::new(&upload_dir, "/uploads")),
    };
    Harness {
        forum: Forum::new(ports, policy),
        accounts,
        threads,
        comments,
        upload_dir,
    }
}

impl Harness {
    /// Registers and logs in `name` with [`PASSWORD`].
    pub async fn member(&self, name: &str) {
        self.forum.accounts.create_account(name, PASSWORD).await.unwrap();
        self.forum.accounts.login(name, PASSWORD).await.unwrap();
    }

    pub async fn thread(&self, author: &str, title: &str) {
        self.forum
            .threads
            .create_thread(NewThread {
                username: author.into(),
                password: PASSWORD.into(),
                title: title.into(),
                body: format!("{title} body"),
                image: None,
            })
            .await
            .unwrap();
    }

    pub async fn reply(&self, author: &str, title: &str, reply_to: ReplyTo, text: &str) -> CommentId {
        self.forum
            .comments
            .create_comment(new_comment(author, title, reply_to, text))
            .await
            .unwrap()
    }
}

pub fn new_comment(author: &str, title: &str, reply_to: ReplyTo, text: &str) -> NewComment {
    NewComment {
        username: author.into(),
        password: PASSWORD.into(),
        thread_title: title.into(),
        reply_to,
        text: text.into(),
        image: None,
    }
}
