//! rusty-forum/crates/domains/src/lib.rs
//!
//! The central domain types and interface definitions for Rusty-Forum.
//! Nothing in this crate performs I/O: stores, hashers and media backends are
//! reached only through the traits in [`ports`].

pub mod errors;
pub mod ids;
pub mod ledger;
pub mod models;
pub mod ports;

// Re-exporting for easier access in other crates
pub use errors::*;
pub use ids::*;
pub use ledger::*;
pub use models::*;
pub use ports::*;
