//! # bcb-core
//!
//! Transport-agnostic core of the book-club bot: domain ids, the inbound
//! event model, the continuation (dialog) registry, command dispatch with
//! permission gating, the persistence and book-metadata ports, and the
//! book-club command/wizard handlers themselves.
//!
//! The Telegram adapter lives in `bcb-telegram`; everything here is written
//! against the `MessagingPort`/`AdminDirectory`/`Store` ports so the whole
//! conversational engine is testable without a network.

pub mod club;
pub mod config;
pub mod dialog;
pub mod dispatch;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod messaging;
pub mod metadata;
pub mod permissions;
pub mod store;

#[cfg(test)]
pub(crate) mod testutil;

pub use errors::{Error, Result};
