//! Core types and trait definitions for the Tirek safety-event notifier.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! The store, engine and transport crates all depend on it.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod delivery;
pub mod directory;
pub mod error;
pub mod event;
pub mod interaction;
pub mod store;
pub mod subscription;

pub use error::{Error, Result};
