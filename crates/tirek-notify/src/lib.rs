//! Event-change detection and subscription fan-out for Tirek.
//!
//! - [`poller`] notices new events in the externally written event log.
//! - [`dispatch`] fans a new event out to its subscribers.
//! - [`onboarding`] walks a recipient through organization → student
//!   selection and commits subscriptions.
//! - [`conversation`] routes recipient interactions to the right flow.
//! - [`drift`] watches the storage schema for new tables.
//! - [`service`] drives all of the above from tickers and channels.
//!
//! Everything here is generic over the `tirek-core` traits; no database or
//! transport is named.

pub mod conversation;
pub mod dispatch;
pub mod drift;
pub mod error;
pub mod onboarding;
pub mod poller;
pub mod service;
pub mod token;

pub use error::{Error, Result};

#[cfg(test)]
mod testing;
