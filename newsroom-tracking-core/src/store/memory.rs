//! In-process deferred identity slot

use std::cell::RefCell;

use crate::error::Result;
use crate::types::DeferredIdentity;

use super::DeferredIdentityStore;

/// Keeps the deferred identity for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slot: RefCell<Option<DeferredIdentity>>,
    writes: RefCell<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `set` and `remove` calls seen so far
    pub fn write_count(&self) -> usize {
        *self.writes.borrow()
    }
}

impl DeferredIdentityStore for MemoryStore {
    fn get(&self) -> Result<Option<DeferredIdentity>> {
        Ok(self.slot.borrow().clone())
    }

    fn set(&self, identity: &DeferredIdentity) -> Result<()> {
        *self.slot.borrow_mut() = Some(identity.clone());
        *self.writes.borrow_mut() += 1;
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        *self.slot.borrow_mut() = None;
        *self.writes.borrow_mut() += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_overwrites() {
        let store = MemoryStore::new();
        assert!(store.get().unwrap().is_none());

        store.set(&DeferredIdentity::anonymous_traits("u1")).unwrap();
        store.set(&DeferredIdentity::anonymous_traits("u2")).unwrap();
        assert_eq!(store.get().unwrap().unwrap().user_id, "u2");

        store.remove().unwrap();
        assert!(store.get().unwrap().is_none());
        assert_eq!(store.write_count(), 3);
    }
}
