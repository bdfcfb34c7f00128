//! Populates a Postgres forum with demo accounts, threads and a comment tree.
//!
//! Everything goes through the service layer, so the seeded data obeys the
//! same rules as data created over HTTP. Re-running skips what already exists.

use std::sync::Arc;

use anyhow::{bail, Context};
use auth_adapters::{Argon2Hasher, MemorySessionStore};
use configs::Settings;
use domains::{DomainError, LikeTarget};
use secrecy::ExposeSecret;
use services::{Forum, ForumPolicy, NewComment, NewThread, Ports, ReplyTo};
use storage_adapters::{LocalMediaStore, PgForumStore};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const PASSWORD: &str = "password";
const USERS: [&str; 3] = ["alice", "bob", "carol"];
const THREADS: [(&str, &str, &str); 3] = [
    ("alice", "Welcome to the forum", "Introduce yourself below."),
    ("bob", "Favourite Rust crates", "Which crates do you reach for first?"),
    ("carol", "Weekend projects", "Share what you are building."),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "seed=info".into()))
        .init();

    let settings = Settings::load().context("loading settings")?;
    let Some(url) = settings.storage.database_url.as_ref() else {
        bail!("FORUM__STORAGE__DATABASE_URL must point at the database to seed");
    };
    let store = Arc::new(
        PgForumStore::connect(url.expose_secret(), 2, settings.storage.store_timeout())
            .await
            .context("connecting to postgres")?,
    );
    store.migrate().await.context("running migrations")?;

    let auth = &settings.auth;
    let forum = Forum::new(
        Ports {
            accounts: store.clone(),
            threads: store.clone(),
            comments: store.clone(),
            likes: store,
            sessions: Arc::new(MemorySessionStore::default()),
            hasher: Arc::new(Argon2Hasher::from_costs(
                auth.argon2_memory_kib,
                auth.argon2_iterations,
                auth.argon2_parallelism,
            )?),
            media: Arc::new(LocalMediaStore::new(
                &settings.media.upload_dir,
                settings.media.url_prefix.clone(),
            )),
        },
        ForumPolicy::default(),
    );

    for user in USERS {
        skip_existing(forum.accounts.create_account(user, PASSWORD).await, "account", user)?;
        forum.accounts.login(user, PASSWORD).await?;
    }

    for (author, title, body) in THREADS {
        let created = forum
            .threads
            .create_thread(NewThread {
                username: author.into(),
                password: PASSWORD.into(),
                title: title.into(),
                body: body.into(),
                image: None,
            })
            .await;
        if skip_existing(created, "thread", title)?.is_none() {
            continue;
        }
        seed_conversation(&forum, title).await?;
    }

    info!(threads = forum.threads.total().await?, "seed complete");
    Ok(())
}

/// Treats a conflict as "already seeded".
fn skip_existing<T>(result: Result<T, DomainError>, kind: &str, key: &str) -> anyhow::Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(DomainError::Conflict(_)) => {
            warn!(kind, key, "already present, skipping");
            Ok(None)
        }
        Err(err) => Err(err.into()),
    }
}

async fn seed_conversation(forum: &Forum, title: &str) -> anyhow::Result<()> {
    let comment = |username: &str, reply_to: ReplyTo, text: &str| NewComment {
        username: username.into(),
        password: PASSWORD.into(),
        thread_title: title.into(),
        reply_to,
        text: text.into(),
        image: None,
    };

    let first = forum
        .comments
        .create_comment(comment("bob", ReplyTo::Thread, "Glad to be here."))
        .await?;
    let reply = forum
        .comments
        .create_comment(comment("carol", ReplyTo::Comment(first.clone()), "Same!"))
        .await?;
    forum
        .comments
        .create_comment(comment("alice", ReplyTo::Comment(reply), "Welcome both."))
        .await?;
    forum
        .comments
        .create_comment(comment("carol", ReplyTo::Thread, "First time posting."))
        .await?;

    forum
        .likes
        .update_like_count("alice", PASSWORD, &LikeTarget::Comment(first))
        .await?;
    forum
        .likes
        .update_like_count("bob", PASSWORD, &LikeTarget::Thread(title.into()))
        .await?;
    info!(title, "seeded conversation");
    Ok(())
}
