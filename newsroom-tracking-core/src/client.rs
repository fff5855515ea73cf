//! Analytics client port
//!
//! The façade never talks to a concrete analytics SDK. It consumes the
//! capability set below, and every capability may be missing: the client
//! may not be loaded yet, or it may not implement a given method.
//!
//! [`ClientRef`] is the single slot holding the most recently known client.
//! Queued calls keep a handle to the slot rather than to the client, so a
//! client that becomes ready after a call was queued still receives it.

use std::cell::RefCell;
use std::rc::Rc;

use crate::types::{Callback, Properties, TrackingOptions, Traits};

/// A method of the analytics client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Identify,
    Alias,
    Page,
    Track,
    User,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Identify => "identify",
            Self::Alias => "alias",
            Self::Page => "page",
            Self::Track => "track",
            Self::User => "user",
        })
    }
}

/// The user record kept by the analytics client
pub trait AnalyticsUser {
    /// Current user id, if the client knows one
    fn id(&self) -> Option<String>;

    /// Replace (or with `None`, erase) the client's user id
    fn set_id(&self, id: Option<String>);
}

/// Port for a third-party analytics client.
///
/// Implementations report which methods they provide through
/// [`AnalyticsClient::supports`]; the façade never calls an unsupported
/// method. Methods without an implementation default to no-ops.
pub trait AnalyticsClient {
    /// Whether this client provides `capability`
    fn supports(&self, capability: Capability) -> bool {
        let _ = capability;
        true
    }

    fn identify(
        &self,
        user_id: &str,
        traits: &Traits,
        options: &TrackingOptions,
        callback: Option<Callback>,
    ) {
        let _ = (user_id, traits, options, callback);
    }

    fn alias(&self, user_id: &str, previous_id: &str, options: &TrackingOptions) {
        let _ = (user_id, previous_id, options);
    }

    fn page(
        &self,
        category: Option<&str>,
        name: Option<&str>,
        properties: &Properties,
        options: &TrackingOptions,
        callback: Option<Callback>,
    ) {
        let _ = (category, name, properties, options, callback);
    }

    fn track(
        &self,
        event: &str,
        properties: &Properties,
        options: &TrackingOptions,
        callback: Option<Callback>,
    ) {
        let _ = (event, properties, options, callback);
    }

    fn user(&self) -> Option<Rc<dyn AnalyticsUser>> {
        None
    }
}

/// Stand-in user returned when no client (or no user capability) exists.
///
/// `id()` is always `None` and `set_id` does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnonymousUser;

impl AnalyticsUser for AnonymousUser {
    fn id(&self) -> Option<String> {
        None
    }

    fn set_id(&self, _id: Option<String>) {}
}

/// Shared slot pointing at the most recently known analytics client.
#[derive(Clone, Default)]
pub struct ClientRef {
    slot: Rc<RefCell<Option<Rc<dyn AnalyticsClient>>>>,
}

impl ClientRef {
    pub fn new(client: Option<Rc<dyn AnalyticsClient>>) -> Self {
        Self {
            slot: Rc::new(RefCell::new(client)),
        }
    }

    /// Point the slot at a new client (or at none)
    pub fn replace(&self, client: Option<Rc<dyn AnalyticsClient>>) {
        *self.slot.borrow_mut() = client;
    }

    /// The client known right now
    pub fn current(&self) -> Option<Rc<dyn AnalyticsClient>> {
        self.slot.borrow().clone()
    }

    pub fn is_present(&self) -> bool {
        self.slot.borrow().is_some()
    }

    /// The current client, if it provides `capability`
    pub fn with_capability(&self, capability: Capability) -> Option<Rc<dyn AnalyticsClient>> {
        self.current().filter(|client| client.supports(capability))
    }
}

impl std::fmt::Debug for ClientRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientRef")
            .field("present", &self.is_present())
            .finish()
    }
}
