//! Deferred identity persistence
//!
//! Holds at most one [`DeferredIdentity`] under a fixed key:
//! - [`MemoryStore`] lives as long as the process
//! - [`SqliteStore`] survives restarts, using SQLite with embedded migrations

pub mod memory;
pub mod schema;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::DeferredIdentity;

/// Storage key of the deferred identity slot
pub const DEFERRED_IDENTITY_KEY: &str = "prezly_analytics_deferred_identity";

/// Single-slot store for the identity waiting on consent
pub trait DeferredIdentityStore {
    /// The stored identity, if any
    fn get(&self) -> Result<Option<DeferredIdentity>>;

    /// Store `identity`, replacing whatever was there
    fn set(&self, identity: &DeferredIdentity) -> Result<()>;

    /// Empty the slot
    fn remove(&self) -> Result<()>;

    /// When the slot was last written, if the backend records it
    fn last_written(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(None)
    }
}

impl<S: DeferredIdentityStore + ?Sized> DeferredIdentityStore for Box<S> {
    fn get(&self) -> Result<Option<DeferredIdentity>> {
        (**self).get()
    }

    fn set(&self, identity: &DeferredIdentity) -> Result<()> {
        (**self).set(identity)
    }

    fn remove(&self) -> Result<()> {
        (**self).remove()
    }

    fn last_written(&self) -> Result<Option<DateTime<Utc>>> {
        (**self).last_written()
    }
}

impl<S: DeferredIdentityStore + ?Sized> DeferredIdentityStore for std::rc::Rc<S> {
    fn get(&self) -> Result<Option<DeferredIdentity>> {
        (**self).get()
    }

    fn set(&self, identity: &DeferredIdentity) -> Result<()> {
        (**self).set(identity)
    }

    fn remove(&self) -> Result<()> {
        (**self).remove()
    }

    fn last_written(&self) -> Result<Option<DateTime<Utc>>> {
        (**self).last_written()
    }
}
