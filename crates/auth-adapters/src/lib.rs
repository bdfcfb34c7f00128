//! rusty-forum/crates/auth-adapters/src/lib.rs
//!
//! Credential hashing and login-state adapters.

pub mod argon;
pub mod sessions;

pub use argon::Argon2Hasher;
pub use sessions::MemorySessionStore;
