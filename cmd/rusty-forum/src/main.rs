//! # rusty-forum
//!
//! Wires the configured adapters into the forum services and serves the HTTP API.

#[cfg(not(feature = "web-axum"))]
compile_error!("rusty-forum needs the `web-axum` feature to serve requests");

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use api_adapters::{build_router, AppState, RouterConfig};
use auth_adapters::{Argon2Hasher, MemorySessionStore};
use configs::{LogSettings, Settings, StorageBackend};
use services::{Forum, ForumPolicy, Ports};
use storage_adapters::{
    LocalMediaStore, MemoryAccountRepository, MemoryCommentRepository, MemoryLikeRepository,
    MemoryThreadRepository,
};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("loading settings")?;
    init_tracing(&settings.log);

    let ports = build_ports(&settings).await?;
    let policy = ForumPolicy {
        bump_on_comment: settings.forum.bump_on_comment,
        store_timeout: settings.storage.store_timeout(),
        deleted_image_path: settings.forum.deleted_image_path.clone(),
    };
    let forum = Forum::new(ports, policy);

    let router_config = RouterConfig {
        upload_dir: PathBuf::from(&settings.media.upload_dir),
        url_prefix: settings.media.url_prefix.clone(),
        max_body_bytes: settings.server.max_body_bytes,
    };
    let app = build_router(AppState::new(forum), &router_config);

    let address = settings.server.bind_addr();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding {address}"))?;
    info!(%address, backend = ?settings.storage.backend, "rusty-forum listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving http")?;

    info!("rusty-forum stopped");
    Ok(())
}

fn init_tracing(log: &LogSettings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.filter));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if log.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn build_ports(settings: &Settings) -> anyhow::Result<Ports> {
    let auth = &settings.auth;
    let hasher = Argon2Hasher::from_costs(
        auth.argon2_memory_kib,
        auth.argon2_iterations,
        auth.argon2_parallelism,
    )?;
    let sessions = MemorySessionStore::new(chrono::Duration::seconds(auth.session_ttl_secs));
    let media = LocalMediaStore::new(&settings.media.upload_dir, settings.media.url_prefix.clone());

    let ports = match settings.storage.backend {
        StorageBackend::Memory => {
            info!("using in-memory storage; data is lost on restart");
            let accounts = Arc::new(MemoryAccountRepository::new());
            let threads = Arc::new(MemoryThreadRepository::new());
            let comments = Arc::new(MemoryCommentRepository::new());
            Ports {
                likes: Arc::new(MemoryLikeRepository::new(
                    accounts.clone(),
                    threads.clone(),
                    comments.clone(),
                )),
                accounts,
                threads,
                comments,
                sessions: Arc::new(sessions),
                hasher: Arc::new(hasher),
                media: Arc::new(media),
            }
        }
        #[cfg(feature = "db-postgres")]
        StorageBackend::Postgres => {
            let store = connect_postgres(settings).await?;
            Ports {
                accounts: store.clone(),
                threads: store.clone(),
                comments: store.clone(),
                likes: store,
                sessions: Arc::new(sessions),
                hasher: Arc::new(hasher),
                media: Arc::new(media),
            }
        }
        #[cfg(not(feature = "db-postgres"))]
        StorageBackend::Postgres => {
            bail!("postgres backend requested but rusty-forum was built without `db-postgres`")
        }
    };
    Ok(ports)
}

#[cfg(feature = "db-postgres")]
async fn connect_postgres(settings: &Settings) -> anyhow::Result<Arc<storage_adapters::PgForumStore>> {
    use secrecy::ExposeSecret;

    let storage = &settings.storage;
    let Some(url) = storage.database_url.as_ref() else {
        bail!("storage.database_url is required for the postgres backend");
    };
    let store = storage_adapters::PgForumStore::connect(
        url.expose_secret(),
        storage.max_connections,
        storage.store_timeout(),
    )
    .await
    .context("connecting to postgres")?;
    store.migrate().await.context("running migrations")?;
    Ok(Arc::new(store))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl-c, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
