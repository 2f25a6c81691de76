//! Concurrent TCP ingest server for BER-framed records.
//!
//! Each worker owns a single-threaded tokio runtime, an independent
//! `SO_REUSEPORT` listener set, a bounded connection pool, and a rotating
//! output file. Workers share no state: every connection a worker accepts
//! is framed and written entirely on that worker's own thread.

pub mod config;
pub mod connection;
pub mod file;
pub mod listener;
pub mod pool;
pub mod receiver;
pub mod server;
pub mod worker;

pub use config::{BindSpec, ServerConfig};
pub use server::BerServer;
