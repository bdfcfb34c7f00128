//! # Postgres stores
//!
//! Maps the relational model to the domain models. Every counter and list
//! mutation is a single `UPDATE` (`col = col + 1`, `array_append`), and like
//! toggles lock the account row, so concurrent writers never lose updates.
//! A like toggle commits the ledger change and the counter change together.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domains::{
    Account, AccountRepository, Comment, CommentId, CommentRepository, CommentState, DomainError,
    LikeDelta, LikeKind, LikeLedger, LikeRepository, LikeTarget, Result, Thread, ThreadRepository,
};
use sqlx::postgres::{PgPool, PgPoolOptions, PgQueryResult};
use tracing::{debug, info, warn};

use crate::comment_key_pattern;

/// One pool serving every repository port.
#[derive(Clone)]
pub struct PgForumStore {
    pool: PgPool,
}

impl PgForumStore {
    pub async fn connect(url: &str, max_connections: u32, acquire_timeout: Duration) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await
            .map_err(db_err)?;
        info!(max_connections, "connected to postgres");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(DomainError::internal)
    }
}

fn db_err(err: sqlx::Error) -> DomainError {
    if let Some(db) = err.as_database_error() {
        if db.is_unique_violation() {
            return DomainError::Conflict(db.message().to_string());
        }
    }
    match &err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            warn!(error = %err, "postgres unavailable");
            DomainError::Unavailable(err.to_string())
        }
        _ => DomainError::internal(err),
    }
}

/// `NotFound` when an update matched no row.
fn require_row(result: PgQueryResult, entity: &str, key: &str) -> Result<()> {
    if result.rows_affected() == 0 {
        Err(DomainError::not_found(entity, key))
    } else {
        Ok(())
    }
}

fn parse_ids(raw: Vec<String>) -> Vec<CommentId> {
    raw.into_iter()
        .filter_map(|id| match CommentId::parse(&id) {
            Ok(id) => Some(id),
            Err(_) => {
                warn!(%id, "malformed comment id in store skipped");
                None
            }
        })
        .collect()
}

fn to_count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}

#[derive(sqlx::FromRow)]
struct AccountRow {
    username: String,
    password_hash: String,
    comment_likes: Vec<String>,
    thread_likes: Vec<String>,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Self {
            username: row.username,
            password_hash: row.password_hash,
            likes: LikeLedger {
                comments: parse_ids(row.comment_likes).into_iter().collect(),
                threads: row.thread_likes.into_iter().collect(),
            },
        }
    }
}

#[derive(sqlx::FromRow)]
struct ThreadRow {
    title: String,
    author: String,
    body: String,
    created_at: DateTime<Utc>,
    bumped_at: DateTime<Utc>,
    image_path: Option<String>,
    post_count: i64,
    image_count: i64,
    like_count: i64,
    top_level_comment_ids: Vec<String>,
}

impl From<ThreadRow> for Thread {
    fn from(row: ThreadRow) -> Self {
        Self {
            title: row.title,
            author: row.author,
            body: row.body,
            created_at: row.created_at,
            bumped_at: row.bumped_at,
            image_path: row.image_path,
            post_count: to_count(row.post_count),
            image_count: to_count(row.image_count),
            like_count: row.like_count,
            top_level_comment_ids: parse_ids(row.top_level_comment_ids),
        }
    }
}

#[derive(sqlx::FromRow)]
struct CommentRow {
    id: String,
    author: String,
    body: String,
    created_at: DateTime<Utc>,
    like_count: i64,
    image_path: Option<String>,
    children: Vec<String>,
    deleted: bool,
}

impl TryFrom<CommentRow> for Comment {
    type Error = DomainError;

    fn try_from(row: CommentRow) -> Result<Self> {
        Ok(Self {
            id: CommentId::parse(&row.id)?,
            author: row.author,
            body: row.body,
            created_at: row.created_at,
            like_count: row.like_count,
            image_path: row.image_path,
            children: parse_ids(row.children),
            state: if row.deleted {
                CommentState::Deleted
            } else {
                CommentState::Active
            },
        })
    }
}

const THREAD_COLUMNS: &str = "title, author, body, created_at, bumped_at, image_path, \
     post_count, image_count, like_count, top_level_comment_ids";
const COMMENT_COLUMNS: &str =
    "id, author, body, created_at, like_count, image_path, children, deleted";

#[async_trait]
impl AccountRepository for PgForumStore {
    async fn create(&self, account: Account) -> Result<()> {
        sqlx::query("INSERT INTO accounts (username, password_hash) VALUES ($1, $2)")
            .bind(&account.username)
            .bind(&account.password_hash)
            .execute(&self.pool)
            .await
            .map_err(|err| match db_err(err) {
                DomainError::Conflict(_) => {
                    DomainError::Conflict(format!("Username '{}' taken", account.username))
                }
                other => other,
            })?;
        Ok(())
    }

    async fn find(&self, username: &str) -> Result<Option<Account>> {
        let row: Option<AccountRow> = sqlx::query_as(
            "SELECT username, password_hash, comment_likes, thread_likes \
             FROM accounts WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row.map(Account::from))
    }

    async fn forget_thread_likes(&self, title: &str) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE accounts SET \
                 comment_likes = ARRAY(SELECT c FROM unnest(comment_likes) AS c WHERE c !~ $1), \
                 thread_likes = array_remove(thread_likes, $2) \
             WHERE $2 = ANY(thread_likes) \
                OR EXISTS (SELECT 1 FROM unnest(comment_likes) AS c WHERE c ~ $1)",
        )
        .bind(comment_key_pattern(title))
        .bind(title)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl LikeRepository for PgForumStore {
    /// Flips ledger membership under the account's row lock and moves the
    /// target's counter in the same transaction.
    async fn toggle_like(&self, username: &str, target: &LikeTarget) -> Result<LikeDelta> {
        let column = match target.kind() {
            LikeKind::Comment => "comment_likes",
            LikeKind::Thread => "thread_likes",
        };
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let liked: Option<bool> = sqlx::query_scalar(&format!(
            "SELECT $2 = ANY({column}) FROM accounts WHERE username = $1 FOR UPDATE"
        ))
        .bind(username)
        .bind(target.key())
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?;
        let liked = liked.ok_or_else(|| DomainError::not_found("Account", username))?;
        let delta = if liked { LikeDelta::Unliked } else { LikeDelta::Liked };

        let (counter, entity) = match (target, delta) {
            (LikeTarget::Thread(_), _) => (
                "UPDATE threads SET like_count = like_count + $2 WHERE title = $1",
                "Thread",
            ),
            (LikeTarget::Comment(_), LikeDelta::Liked) => (
                "UPDATE comments SET like_count = like_count + $2 WHERE id = $1 AND NOT deleted",
                "Comment",
            ),
            (LikeTarget::Comment(_), LikeDelta::Unliked) => (
                "UPDATE comments SET like_count = like_count + $2 WHERE id = $1",
                "Comment",
            ),
        };
        let result = sqlx::query(counter)
            .bind(target.key())
            .bind(delta.amount())
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        require_row(result, entity, target.key())?;

        let ledger = match delta {
            LikeDelta::Unliked => {
                format!("UPDATE accounts SET {column} = array_remove({column}, $2) WHERE username = $1")
            }
            LikeDelta::Liked => {
                format!("UPDATE accounts SET {column} = array_append({column}, $2) WHERE username = $1")
            }
        };
        sqlx::query(&ledger)
            .bind(username)
            .bind(target.key())
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        tx.commit().await.map_err(db_err)?;
        debug!(username, key = target.key(), ?delta, "like committed");
        Ok(delta)
    }
}

#[async_trait]
impl ThreadRepository for PgForumStore {
    async fn create(&self, thread: Thread) -> Result<()> {
        let ids: Vec<String> = thread
            .top_level_comment_ids
            .iter()
            .map(|id| id.as_str().to_string())
            .collect();
        sqlx::query(
            "INSERT INTO threads (title, author, body, created_at, bumped_at, image_path, \
                 post_count, image_count, like_count, top_level_comment_ids) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(&thread.title)
        .bind(&thread.author)
        .bind(&thread.body)
        .bind(thread.created_at)
        .bind(thread.bumped_at)
        .bind(&thread.image_path)
        .bind(i64::try_from(thread.post_count).unwrap_or(i64::MAX))
        .bind(i64::try_from(thread.image_count).unwrap_or(i64::MAX))
        .bind(thread.like_count)
        .bind(ids)
        .execute(&self.pool)
        .await
        .map_err(|err| match db_err(err) {
            DomainError::Conflict(_) => DomainError::Conflict(format!("Title \"{}\" taken", thread.title)),
            other => other,
        })?;
        Ok(())
    }

    async fn exists(&self, title: &str) -> Result<bool> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM threads WHERE title = $1)")
            .bind(title)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)
    }

    async fn get(&self, title: &str) -> Result<Option<Thread>> {
        let row: Option<ThreadRow> =
            sqlx::query_as(&format!("SELECT {THREAD_COLUMNS} FROM threads WHERE title = $1"))
                .bind(title)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(row.map(Thread::from))
    }

    async fn delete(&self, title: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM threads WHERE title = $1")
            .bind(title)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn increment_post_count(&self, title: &str) -> Result<u64> {
        let count: Option<i64> = sqlx::query_scalar(
            "UPDATE threads SET post_count = post_count + 1 WHERE title = $1 RETURNING post_count",
        )
        .bind(title)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        count
            .map(to_count)
            .ok_or_else(|| DomainError::not_found("Thread", title))
    }

    async fn increment_image_count(&self, title: &str) -> Result<()> {
        let result = sqlx::query("UPDATE threads SET image_count = image_count + 1 WHERE title = $1")
            .bind(title)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        require_row(result, "Thread", title)
    }

    async fn update_timestamp(&self, title: &str, at: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query("UPDATE threads SET bumped_at = $2 WHERE title = $1")
            .bind(title)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        require_row(result, "Thread", title)
    }

    async fn add_top_level_comment(&self, title: &str, id: &CommentId) -> Result<()> {
        let result = sqlx::query(
            "UPDATE threads SET top_level_comment_ids = array_append(top_level_comment_ids, $2) \
             WHERE title = $1",
        )
        .bind(title)
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        require_row(result, "Thread", title)
    }

    async fn change_like_count(&self, title: &str, delta: i64) -> Result<()> {
        let result = sqlx::query("UPDATE threads SET like_count = like_count + $2 WHERE title = $1")
            .bind(title)
            .bind(delta)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        require_row(result, "Thread", title)
    }

    async fn list(&self) -> Result<Vec<Thread>> {
        let rows: Vec<ThreadRow> = sqlx::query_as(&format!("SELECT {THREAD_COLUMNS} FROM threads"))
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(rows.into_iter().map(Thread::from).collect())
    }

    async fn total(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM threads")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(to_count(count))
    }
}

#[async_trait]
impl CommentRepository for PgForumStore {
    async fn create(&self, comment: Comment) -> Result<()> {
        let children: Vec<String> = comment.children.iter().map(|c| c.as_str().to_string()).collect();
        sqlx::query(
            "INSERT INTO comments (id, author, body, created_at, like_count, image_path, children, deleted) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(comment.id.as_str())
        .bind(&comment.author)
        .bind(&comment.body)
        .bind(comment.created_at)
        .bind(comment.like_count)
        .bind(&comment.image_path)
        .bind(children)
        .bind(comment.is_deleted())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn load(&self, id: &CommentId) -> Result<Option<Comment>> {
        let row: Option<CommentRow> =
            sqlx::query_as(&format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = $1"))
                .bind(id.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        row.map(Comment::try_from).transpose()
    }

    async fn load_many(&self, ids: &[CommentId]) -> Result<Vec<Comment>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let keys: Vec<String> = ids.iter().map(|id| id.as_str().to_string()).collect();
        let rows: Vec<CommentRow> =
            sqlx::query_as(&format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = ANY($1)"))
                .bind(keys)
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;
        let mut by_id = HashMap::with_capacity(rows.len());
        for row in rows {
            let comment = Comment::try_from(row)?;
            by_id.insert(comment.id.clone(), comment);
        }
        debug!(requested = ids.len(), found = by_id.len(), "comments loaded");
        // Preserve request order.
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    async fn add_child(&self, parent: &CommentId, child: &CommentId) -> Result<()> {
        let result = sqlx::query("UPDATE comments SET children = array_append(children, $2) WHERE id = $1")
            .bind(parent.as_str())
            .bind(child.as_str())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        require_row(result, "Comment", parent.as_str())
    }

    async fn change_like_count(&self, id: &CommentId, delta: i64) -> Result<()> {
        let result = sqlx::query("UPDATE comments SET like_count = like_count + $2 WHERE id = $1")
            .bind(id.as_str())
            .bind(delta)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        require_row(result, "Comment", id.as_str())
    }

    async fn soft_delete(&self, id: &CommentId) -> Result<()> {
        let result = sqlx::query(
            "UPDATE comments SET deleted = TRUE, body = '', image_path = NULL WHERE id = $1",
        )
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        require_row(result, "Comment", id.as_str())
    }

    async fn delete_all_for_thread(&self, title: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM comments WHERE id ~ $1")
            .bind(comment_key_pattern(title))
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        debug!(title, removed = result.rows_affected(), "comments removed");
        Ok(result.rows_affected())
    }
}
