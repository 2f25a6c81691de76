//! Stream accessor abstractions for the BER ingest server
//!
//! This crate provides the async stream traits the server's connection
//! handling is built on, plus a concrete TCP implementation.

pub mod stream;
pub mod tcp;

pub use ber_core::{BerError, BerResult};
pub use stream::{StreamAccessor, TransportLayer};
pub use tcp::{TcpTransport, TcpSettings};
