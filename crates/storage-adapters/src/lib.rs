//! rusty-forum/crates/storage-adapters/src/lib.rs
//!
//! Implementations of the storage ports. The in-memory stores are always
//! compiled (tests, local runs); Postgres sits behind `db-postgres`.

pub mod media;
pub mod memory;
#[cfg(feature = "db-postgres")]
pub mod postgres;

pub use media::LocalMediaStore;
pub use memory::{
    MemoryAccountRepository, MemoryCommentRepository, MemoryLikeRepository, MemoryThreadRepository,
};
#[cfg(feature = "db-postgres")]
pub use postgres::PgForumStore;

/// Anchored pattern matching every comment key of thread `title`: `<digits>-<title>`.
///
/// Both the in-memory regex and Postgres' `~` operator accept this syntax.
pub fn comment_key_pattern(title: &str) -> String {
    format!("^[0-9]+-{}$", regex::escape(title))
}
