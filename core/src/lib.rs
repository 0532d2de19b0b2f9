//! Live-update engine for a disposable-mailbox console.
//!
//! - [`monitor`]: one push connection to the server's monitor endpoint.
//! - [`bridge`]: start/stop commands in, host signals out.
//! - [`cache`] and [`search`]: the displayed message list and its filter.
//! - [`client`]: the mail store's REST interface.
//! - [`debounce`]: coalescing of bursty UI triggers.
//! - [`preview`]: HTML bodies written out for a browser.

pub mod bridge;
pub mod cache;
pub mod client;
pub mod config;
pub mod debounce;
pub mod error;
pub mod models;
pub mod monitor;
pub mod preview;
pub mod search;

pub use error::{Error, Result};
