//! # newsroom-tracking-core
//!
//! Consent-aware tracking façade for newsroom front-ends.
//!
//! This library provides:
//! - [`Tracker`], the façade exposing `identify`, `alias`, `page`, `track`
//!   and `user` on top of an analytics client that may not be loaded yet
//! - The [`AnalyticsClient`] port the façade delegates to
//! - Deferred identity storage, in memory or in SQLite
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Example
//!
//! ```rust,no_run
//! use newsroom_tracking_core::{Config, Properties, Tracker};
//!
//! let config = Config::load().expect("failed to load config");
//! let store = config.open_store().expect("failed to open store");
//! let context = config.tracking.context(false).expect("invalid tracking config");
//!
//! let tracker = Tracker::new(context, store);
//! tracker.track("Story Viewed", Properties::new(), None);
//! // Later, once the analytics client has loaded:
//! // tracker.set_client(Some(client));
//! ```

// Re-export commonly used items at the crate root
pub use client::{AnalyticsClient, AnalyticsUser, AnonymousUser, Capability, ClientRef};
pub use config::Config;
pub use error::{Error, Result};
pub use queue::DrainMode;
pub use store::{DeferredIdentityStore, MemoryStore, SqliteStore};
pub use tracker::{Tracker, TrackerContext};
pub use types::*;

// Public modules
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod queue;
pub mod store;
pub mod tracker;
pub mod types;
