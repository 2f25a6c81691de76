//! Shared error type for the BER toolkit
//!
//! This crate provides the `BerError`/`BerResult` pair used by every other
//! crate in the workspace: the codec, the transport abstractions, the
//! ingest server and the CLI adapters.

pub mod error;

pub use error::{BerError, BerResult};
