use std::sync::Arc;

use chrono::Utc;
use domains::{
    validate_title, AccountRepository, CommentRepository, DomainError, MediaStore, PageSize,
    Result, Thread, ThreadOrder, ThreadRepository, Upload,
};
use tracing::{info, instrument};

use crate::accounts::AccountService;
use crate::deadline::Deadline;
use crate::listing::{page_window, sort_threads};
use crate::views::{ThreadSummary, ThreadView};

/// Input of [`ThreadService::create_thread`].
#[derive(Debug, Clone)]
pub struct NewThread {
    pub username: String,
    pub password: String,
    pub title: String,
    pub body: String,
    pub image: Option<Upload>,
}

#[derive(Clone)]
pub struct ThreadService {
    auth: AccountService,
    accounts: Arc<dyn AccountRepository>,
    threads: Arc<dyn ThreadRepository>,
    comments: Arc<dyn CommentRepository>,
    media: Arc<dyn MediaStore>,
    deadline: Deadline,
}

impl ThreadService {
    pub fn new(
        auth: AccountService,
        accounts: Arc<dyn AccountRepository>,
        threads: Arc<dyn ThreadRepository>,
        comments: Arc<dyn CommentRepository>,
        media: Arc<dyn MediaStore>,
        deadline: Deadline,
    ) -> Self {
        Self {
            auth,
            accounts,
            threads,
            comments,
            media,
            deadline,
        }
    }

    /// Creates a thread owned by the authenticated user. Returns the stored title.
    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn create_thread(&self, request: NewThread) -> Result<String> {
        self.auth.authorize(&request.username, &request.password).await?;

        let title = request.title.trim().to_string();
        validate_title(&title)?;
        if request.body.trim().is_empty() {
            return Err(DomainError::validation("Thread body text is required"));
        }
        if self.deadline.run("check thread", self.threads.exists(&title)).await? {
            return Err(DomainError::Conflict(format!("Title \"{title}\" taken")));
        }

        let image_path = match request.image {
            Some(upload) => self.media.save_image(upload).await?,
            None => None,
        };
        let thread = Thread::new(&title, &request.username, request.body, image_path, Utc::now());
        self.deadline.run("create thread", self.threads.create(thread)).await?;
        info!(%title, "thread created");
        Ok(title)
    }

    pub async fn get_thread(&self, title: &str) -> Result<ThreadView> {
        let thread = self.find(title).await?;
        Ok(ThreadView::render(thread, Utc::now()))
    }

    /// Lists threads sorted descending by `order`, optionally cut to one page.
    #[instrument(skip(self))]
    pub async fn dump(
        &self,
        order: ThreadOrder,
        page: Option<u64>,
        size: Option<PageSize>,
    ) -> Result<Vec<ThreadSummary>> {
        let mut threads = self.deadline.run("list threads", self.threads.list()).await?;
        sort_threads(&mut threads, order);
        let now = Utc::now();
        Ok(threads[page_window(threads.len(), page, size)]
            .iter()
            .map(|thread| ThreadSummary::render(thread, now))
            .collect())
    }

    pub async fn total(&self) -> Result<u64> {
        self.deadline.run("count threads", self.threads.total()).await
    }

    /// Removes a thread, all of its comments and every like that points at them.
    ///
    /// Comments go first so a failure part-way never leaves comments without
    /// their thread being reachable for a retry.
    #[instrument(skip(self, password))]
    pub async fn delete_thread(&self, username: &str, password: &str, title: &str) -> Result<()> {
        self.auth.authorize(username, password).await?;
        let thread = self.find(title).await?;
        if thread.author != username {
            return Err(DomainError::Forbidden(
                "You are not the creator of this thread".into(),
            ));
        }

        let removed = self
            .deadline
            .run("delete comments", self.comments.delete_all_for_thread(title))
            .await?;
        let ledgers = self
            .deadline
            .run("forget likes", self.accounts.forget_thread_likes(title))
            .await?;
        self.deadline.run("delete thread", self.threads.delete(title)).await?;
        info!(comments = removed, ledgers, "thread deleted");
        Ok(())
    }

    async fn find(&self, title: &str) -> Result<Thread> {
        self.deadline
            .run("load thread", self.threads.get(title))
            .await?
            .ok_or_else(|| DomainError::not_found("Thread", title))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::{
        Account, MockAccountRepository, MockCommentRepository, MockCredentialHasher,
        MockMediaStore, MockSessionStore, MockThreadRepository,
    };
    use mockall::predicate::eq;
    use mockall::Sequence;

    fn auth(accounts: MockAccountRepository) -> AccountService {
        let mut hasher = MockCredentialHasher::new();
        hasher.expect_verify().returning(|pw, hash| Ok(pw == hash));
        let mut sessions = MockSessionStore::new();
        sessions.expect_is_active().returning(|_| Ok(true));
        AccountService::new(Arc::new(accounts), Arc::new(sessions), Arc::new(hasher), Deadline::default())
    }

    fn logged_in_accounts() -> MockAccountRepository {
        let mut accounts = MockAccountRepository::new();
        accounts
            .expect_find()
            .returning(|user| Ok(Some(Account::new(user, "pw"))));
        accounts
    }

    fn service(
        threads: MockThreadRepository,
        comments: MockCommentRepository,
        ledger: MockAccountRepository,
        media: MockMediaStore,
    ) -> ThreadService {
        ThreadService::new(
            auth(logged_in_accounts()),
            Arc::new(ledger),
            Arc::new(threads),
            Arc::new(comments),
            Arc::new(media),
            Deadline::default(),
        )
    }

    fn request(title: &str, body: &str) -> NewThread {
        NewThread {
            username: "alice".into(),
            password: "pw".into(),
            title: title.into(),
            body: body.into(),
            image: None,
        }
    }

    #[tokio::test]
    async fn create_trims_title_and_stores_thread() {
        let mut threads = MockThreadRepository::new();
        threads.expect_exists().with(eq("Hello")).returning(|_| Ok(false));
        threads
            .expect_create()
            .withf(|t: &Thread| t.title == "Hello" && t.author == "alice" && t.post_count == 1 && t.image_count == 0)
            .times(1)
            .returning(|_| Ok(()));
        let svc = service(threads, MockCommentRepository::new(), MockAccountRepository::new(), MockMediaStore::new());

        assert_eq!(svc.create_thread(request("  Hello ", "body")).await.unwrap(), "Hello");
    }

    #[tokio::test]
    async fn create_rejects_bad_titles_and_empty_body() {
        let mut threads = MockThreadRepository::new();
        threads.expect_exists().with(eq("Taken")).returning(|_| Ok(true));
        threads.expect_create().never();
        let svc = service(threads, MockCommentRepository::new(), MockAccountRepository::new(), MockMediaStore::new());

        for title in ["a-b", "a_b", "say \"hi\"", "   "] {
            let err = svc.create_thread(request(title, "body")).await.unwrap_err();
            assert!(matches!(err, DomainError::Validation(_)), "{title}: {err}");
        }
        let err = svc.create_thread(request("Fine", " ")).await.unwrap_err();
        assert_eq!(err, DomainError::validation("Thread body text is required"));
        let err = svc.create_thread(request("Taken", "body")).await.unwrap_err();
        assert_eq!(err, DomainError::Conflict("Title \"Taken\" taken".into()));
    }

    #[tokio::test]
    async fn image_attachment_counts_as_first_image() {
        let mut threads = MockThreadRepository::new();
        threads.expect_exists().returning(|_| Ok(false));
        threads
            .expect_create()
            .withf(|t: &Thread| t.image_count == 1 && t.image_path.as_deref() == Some("/uploads/x.png"))
            .times(1)
            .returning(|_| Ok(()));
        let mut media = MockMediaStore::new();
        media
            .expect_save_image()
            .times(1)
            .returning(|_| Ok(Some("/uploads/x.png".into())));
        let svc = service(threads, MockCommentRepository::new(), MockAccountRepository::new(), media);

        let mut req = request("Pics", "body");
        req.image = Some(Upload {
            data: bytes::Bytes::from_static(b"png"),
            content_type: Some(mime::IMAGE_PNG),
            file_name: Some("x.png".into()),
        });
        svc.create_thread(req).await.unwrap();
    }

    #[tokio::test]
    async fn only_the_author_may_delete() {
        let mut threads = MockThreadRepository::new();
        threads
            .expect_get()
            .returning(|t| Ok(Some(Thread::new(t, "bob", "body", None, Utc::now()))));
        threads.expect_delete().never();
        let svc = service(threads, MockCommentRepository::new(), MockAccountRepository::new(), MockMediaStore::new());

        let err = svc.delete_thread("alice", "pw", "Bobs").await.unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
    }

    #[tokio::test]
    async fn delete_cascades_comments_then_likes_then_thread() {
        let mut seq = Sequence::new();
        let mut threads = MockThreadRepository::new();
        let mut comments = MockCommentRepository::new();
        let mut ledger = MockAccountRepository::new();
        threads
            .expect_get()
            .returning(|t| Ok(Some(Thread::new(t, "alice", "body", None, Utc::now()))));
        comments
            .expect_delete_all_for_thread()
            .with(eq("Mine"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(3));
        ledger
            .expect_forget_thread_likes()
            .with(eq("Mine"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(1));
        threads
            .expect_delete()
            .with(eq("Mine"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(true));
        let svc = service(threads, comments, ledger, MockMediaStore::new());

        svc.delete_thread("alice", "pw", "Mine").await.unwrap();
    }

    #[tokio::test]
    async fn missing_thread_is_not_found() {
        let mut threads = MockThreadRepository::new();
        threads.expect_get().returning(|_| Ok(None));
        let svc = service(threads, MockCommentRepository::new(), MockAccountRepository::new(), MockMediaStore::new());

        assert_eq!(
            svc.get_thread("Nope").await.unwrap_err(),
            DomainError::not_found("Thread", "Nope")
        );
    }
}
