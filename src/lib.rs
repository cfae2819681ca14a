//! Gift-Box Channel Bot
//!
//! A Rust-based watcher for a Telegram reward channel. It polls the channel
//! on a timer, classifies each message as a gift-box code or a trade
//! directive, redeems codes exactly once against a durable processed log,
//! and mirrors directives as futures orders.
//!
//! ## Architecture
//!
//! ```text
//! Telegram (getUpdates) → Poller → Parser → Dispatcher → Redeemer / Executor
//!                            ↑         ↓
//!                  Control Server   Dedup Store (append-only log)
//! ```

pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod parser;
pub mod poller;
pub mod server;
pub mod store;
pub mod types;
