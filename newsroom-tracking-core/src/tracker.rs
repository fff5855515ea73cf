//! Tracking façade
//!
//! [`Tracker`] is what UI code talks to. It sits in front of an analytics
//! client that loads asynchronously and may never load at all:
//!
//! - every call is enriched with [`PrezlyMeta`] and queued; queued calls run
//!   in FIFO order once a client is known
//! - under [`TrackingPolicy::ConsentToIdentify`], `identify` without consent
//!   is stored as a [`DeferredIdentity`] instead of being sent, and replayed
//!   when consent arrives
//! - withdrawing consent moves the client's known user id back into the
//!   deferred slot and erases it from the client
//!
//! Nothing here returns an error to the caller. A missing client or a
//! missing capability is a silent no-op; storage failures are logged.
//!
//! ## Notifications
//!
//! The queue is drained by notifications: setting the client, enqueueing a
//! call, or an explicit [`Tracker::tick`] from the host's event loop. Under
//! [`DrainMode::OnePerTick`] each notification runs at most one call, so a
//! backlog built up before the client loaded needs one tick per call.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use uuid::Uuid;

use crate::client::{AnalyticsClient, AnalyticsUser, AnonymousUser, Capability, ClientRef};
use crate::queue::{run_call, CallQueue, DrainMode, DrainOutcome, PendingCall};
use crate::store::DeferredIdentityStore;
use crate::types::{
    Callback, DeferredIdentity, LibraryStamp, PrezlyMeta, Properties, RequestContext,
    TrackingOptions, TrackingPolicy, Traits,
};

/// Ambient values the façade is built from
#[derive(Debug, Clone)]
pub struct TrackerContext {
    /// Metadata injected into every payload
    pub meta: PrezlyMeta,
    /// Newsroom tracking policy
    pub policy: TrackingPolicy,
    /// Consent known at startup
    pub consent: bool,
    /// Master switch
    pub enabled: bool,
    /// User agent, only sent with consent
    pub user_agent: Option<String>,
    pub drain_mode: DrainMode,
}

impl TrackerContext {
    /// Enabled context for `newsroom` with the default policy and no consent
    pub fn new(newsroom: Uuid) -> Self {
        Self {
            meta: PrezlyMeta::new(newsroom),
            policy: TrackingPolicy::Default,
            consent: false,
            enabled: true,
            user_agent: None,
            drain_mode: DrainMode::OnePerTick,
        }
    }

    pub fn with_story(mut self, story: Uuid) -> Self {
        self.meta.story = Some(story);
        self
    }

    /// Set the policy, also recording it in the injected metadata
    pub fn with_policy(mut self, policy: TrackingPolicy) -> Self {
        self.policy = policy;
        self.meta.tracking_policy = Some(policy);
        self
    }

    pub fn with_consent(mut self, consent: bool) -> Self {
        self.consent = consent;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_drain_mode(mut self, drain_mode: DrainMode) -> Self {
        self.drain_mode = drain_mode;
        self
    }
}

/// Consent-aware façade over an analytics client
pub struct Tracker {
    client: ClientRef,
    queue: RefCell<CallQueue>,
    store: Box<dyn DeferredIdentityStore>,
    consent: Cell<bool>,
    enabled: Cell<bool>,
    meta: PrezlyMeta,
    policy: TrackingPolicy,
    user_agent: Option<String>,
    drain_mode: DrainMode,
}

impl Tracker {
    /// Create the façade with no client loaded yet.
    ///
    /// Runs one consent reconciliation straight away, so an identity
    /// deferred by a previous run is replayed if consent is already given.
    pub fn new(context: TrackerContext, store: impl DeferredIdentityStore + 'static) -> Self {
        let tracker = Self {
            client: ClientRef::default(),
            queue: RefCell::new(CallQueue::new()),
            store: Box::new(store),
            consent: Cell::new(context.consent),
            enabled: Cell::new(context.enabled),
            meta: context.meta,
            policy: context.policy,
            user_agent: context.user_agent,
            drain_mode: context.drain_mode,
        };
        tracker.reconcile_consent();
        tracker
    }

    // ============================================
    // Tracking operations
    // ============================================

    /// Identify the visitor.
    ///
    /// Under [`TrackingPolicy::ConsentToIdentify`] without consent the call
    /// is stored as the deferred identity (replacing any earlier one), the
    /// callback runs immediately, and nothing is queued.
    pub fn identify(&self, user_id: &str, traits: Traits, callback: Option<Callback>) {
        if !self.is_enabled() {
            return;
        }

        let traits = self.meta.inject(traits);

        if self.policy.requires_consent_to_identify() && !self.consent() {
            if cfg!(debug_assertions) {
                tracing::debug!(user_id, "Deferring identify until consent is given");
            }
            self.persist_deferred(&DeferredIdentity::new(user_id, traits));
            if let Some(callback) = callback {
                callback();
            }
            self.reconcile_consent();
            return;
        }

        let client = self.client.clone();
        let options = self.build_options();
        let user_id = user_id.to_string();
        self.enqueue(PendingCall::new(Capability::Identify, move || {
            if let Some(client) = client.with_capability(Capability::Identify) {
                client.identify(&user_id, &traits, &options, callback);
            }
        }));
    }

    /// Link `previous_id` to `user_id`. Not subject to consent gating.
    pub fn alias(&self, user_id: &str, previous_id: &str) {
        if !self.is_enabled() {
            return;
        }

        let client = self.client.clone();
        let options = self.build_options();
        let user_id = user_id.to_string();
        let previous_id = previous_id.to_string();
        self.enqueue(PendingCall::new(Capability::Alias, move || {
            if let Some(client) = client.with_capability(Capability::Alias) {
                client.alias(&user_id, &previous_id, &options);
            }
        }));
    }

    /// Record a page view
    pub fn page(
        &self,
        category: Option<&str>,
        name: Option<&str>,
        properties: Properties,
        callback: Option<Callback>,
    ) {
        if !self.is_enabled() {
            return;
        }

        let client = self.client.clone();
        let options = self.build_options();
        let properties = self.meta.inject(properties);
        let category = category.map(str::to_string);
        let name = name.map(str::to_string);
        self.enqueue(PendingCall::new(Capability::Page, move || {
            if let Some(client) = client.with_capability(Capability::Page) {
                client.page(
                    category.as_deref(),
                    name.as_deref(),
                    &properties,
                    &options,
                    callback,
                );
            }
        }));
    }

    /// Record an event
    pub fn track(&self, event: &str, properties: Properties, callback: Option<Callback>) {
        if !self.is_enabled() {
            return;
        }

        let client = self.client.clone();
        let options = self.build_options();
        let properties = self.meta.inject(properties);
        let event = event.to_string();
        self.enqueue(PendingCall::new(Capability::Track, move || {
            if let Some(client) = client.with_capability(Capability::Track) {
                client.track(&event, &properties, &options, callback);
            }
        }));
    }

    /// The client's user record, or a stand-in whose id is always `None`.
    ///
    /// Works even when the façade is disabled.
    pub fn user(&self) -> Rc<dyn AnalyticsUser> {
        self.client
            .with_capability(Capability::User)
            .and_then(|client| client.user())
            .unwrap_or_else(|| Rc::new(AnonymousUser))
    }

    /// Options attached to every call.
    ///
    /// The user agent is only included once the visitor consented,
    /// independently of the tracking policy.
    pub fn build_options(&self) -> TrackingOptions {
        let user_agent = if self.consent() {
            self.user_agent.clone()
        } else {
            None
        };

        TrackingOptions {
            context: RequestContext {
                library: LibraryStamp::default(),
                user_agent,
            },
        }
    }

    // ============================================
    // Client readiness and queue draining
    // ============================================

    /// Point the façade at a newly loaded client (or drop it), then notify.
    pub fn set_client(&self, client: Option<Rc<dyn AnalyticsClient>>) {
        let present = client.is_some();
        self.client.replace(client);
        if cfg!(debug_assertions) {
            tracing::debug!(present, pending = self.pending(), "Analytics client changed");
        }
        self.notify();
    }

    /// Whether a client is currently known
    pub fn has_client(&self) -> bool {
        self.client.is_present()
    }

    /// Handle one "client ready or queue changed" notification.
    ///
    /// Returns whether any queued call ran.
    pub fn tick(&self) -> bool {
        self.notify()
    }

    /// Number of queued calls
    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    fn enqueue(&self, call: PendingCall) {
        if cfg!(debug_assertions) {
            tracing::debug!(
                operation = %call.operation(),
                client_ready = self.has_client(),
                "Queueing analytics call"
            );
        }
        self.queue.borrow_mut().push(call);
        self.notify();
    }

    fn notify(&self) -> bool {
        match self.drain_mode {
            DrainMode::OnePerTick => self.drain_one().consumed(),
            DrainMode::Eager => {
                let mut drained = false;
                while self.drain_one().consumed() {
                    drained = true;
                }
                drained
            }
        }
    }

    fn drain_one(&self) -> DrainOutcome {
        // The queue borrow ends before the call runs; a client callback may
        // enqueue more work.
        let next = self.queue.borrow_mut().take_ready(&self.client);
        match next {
            Ok(call) => run_call(call),
            Err(outcome) => outcome,
        }
    }

    // ============================================
    // Consent and deferred identity
    // ============================================

    pub fn consent(&self) -> bool {
        self.consent.get()
    }

    /// Record a new consent value and react to the change
    pub fn set_consent(&self, consent: bool) {
        let previous = self.consent.replace(consent);
        if previous != consent {
            if cfg!(debug_assertions) {
                tracing::debug!(consent, "Tracking consent changed");
            }
            self.reconcile_consent();
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.get()
    }

    /// Flip the master switch. Queued calls are kept.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.set(enabled);
    }

    /// The identity currently waiting for consent
    pub fn deferred_identity(&self) -> Option<DeferredIdentity> {
        self.load_deferred()
    }

    /// Bring the deferred slot and the client in line with consent.
    ///
    /// - With consent, a deferred identity is replayed through
    ///   [`Tracker::identify`] and the slot is cleared.
    /// - Without consent, a user id known to the client replaces whatever
    ///   the slot holds and is erased from the client.
    pub fn reconcile_consent(&self) {
        if !self.is_enabled() {
            return;
        }

        if self.consent() {
            if let Some(identity) = self.load_deferred() {
                tracing::info!(user_id = %identity.user_id, "Replaying deferred identity");
                self.identify(&identity.user_id, identity.traits, None);
                self.clear_deferred();
            }
            return;
        }

        let user = self.user();
        if let Some(user_id) = user.id() {
            self.persist_deferred(&DeferredIdentity::anonymous_traits(user_id));
            user.set_id(None);
            if cfg!(debug_assertions) {
                tracing::debug!("Cleared client user id pending consent");
            }
        }
    }

    fn load_deferred(&self) -> Option<DeferredIdentity> {
        match self.store.get() {
            Ok(identity) => identity,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read deferred identity");
                None
            }
        }
    }

    fn persist_deferred(&self, identity: &DeferredIdentity) {
        if let Err(e) = self.store.set(identity) {
            tracing::warn!(error = %e, "Failed to store deferred identity");
        }
    }

    fn clear_deferred(&self) {
        if let Err(e) = self.store.remove() {
            tracing::warn!(error = %e, "Failed to clear deferred identity");
        }
    }
}

impl std::fmt::Debug for Tracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracker")
            .field("client", &self.client)
            .field("pending", &self.pending())
            .field("consent", &self.consent())
            .field("enabled", &self.is_enabled())
            .field("policy", &self.policy)
            .field("meta", &self.meta)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    #[derive(Default)]
    struct FakeUser {
        id: RefCell<Option<String>>,
    }

    impl AnalyticsUser for FakeUser {
        fn id(&self) -> Option<String> {
            self.id.borrow().clone()
        }

        fn set_id(&self, id: Option<String>) {
            *self.id.borrow_mut() = id;
        }
    }

    #[derive(Default)]
    struct FakeClient {
        calls: RefCell<Vec<(String, serde_json::Value)>>,
        options: RefCell<Vec<TrackingOptions>>,
        user: Rc<FakeUser>,
    }

    impl AnalyticsClient for FakeClient {
        fn identify(
            &self,
            user_id: &str,
            traits: &Traits,
            options: &TrackingOptions,
            callback: Option<Callback>,
        ) {
            self.calls.borrow_mut().push((
                "identify".into(),
                json!({ "userId": user_id, "traits": traits }),
            ));
            self.options.borrow_mut().push(options.clone());
            if let Some(callback) = callback {
                callback();
            }
        }

        fn track(
            &self,
            event: &str,
            properties: &Properties,
            _options: &TrackingOptions,
            _callback: Option<Callback>,
        ) {
            self.calls.borrow_mut().push((
                "track".into(),
                json!({ "event": event, "properties": properties }),
            ));
        }

        fn user(&self) -> Option<Rc<dyn AnalyticsUser>> {
            Some(self.user.clone())
        }
    }

    fn newsroom() -> Uuid {
        Uuid::parse_str("6f1c2f0e-2b8e-4a53-9a3a-0d5d8f0c1b2a").unwrap()
    }

    fn traits(value: serde_json::Value) -> Traits {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_identify_default_policy_reaches_client() {
        let tracker = Tracker::new(TrackerContext::new(newsroom()), MemoryStore::new());
        let client = Rc::new(FakeClient::default());
        tracker.set_client(Some(client.clone()));

        tracker.identify("u1", traits(json!({ "plan": "pro" })), None);

        let calls = client.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "identify");
        assert_eq!(
            calls[0].1,
            json!({
                "userId": "u1",
                "traits": {
                    "plan": "pro",
                    "prezly": { "newsroom": "6f1c2f0e-2b8e-4a53-9a3a-0d5d8f0c1b2a" }
                }
            })
        );
    }

    #[test]
    fn test_calls_wait_for_client() {
        let tracker = Tracker::new(TrackerContext::new(newsroom()), MemoryStore::new());
        tracker.track("first", Properties::new(), None);
        tracker.track("second", Properties::new(), None);
        assert_eq!(tracker.pending(), 2);
        assert!(!tracker.tick());

        let client = Rc::new(FakeClient::default());
        tracker.set_client(Some(client.clone()));
        assert_eq!(client.calls.borrow().len(), 1);
        assert_eq!(tracker.pending(), 1);

        assert!(tracker.tick());
        let events: Vec<_> = client
            .calls
            .borrow()
            .iter()
            .map(|(_, v)| v["event"].clone())
            .collect();
        assert_eq!(events, vec![json!("first"), json!("second")]);
        assert!(!tracker.tick());
    }

    #[test]
    fn test_eager_mode_flushes_backlog() {
        let context = TrackerContext::new(newsroom()).with_drain_mode(DrainMode::Eager);
        let tracker = Tracker::new(context, MemoryStore::new());
        for n in 0..4 {
            tracker.track(&format!("event-{n}"), Properties::new(), None);
        }

        let client = Rc::new(FakeClient::default());
        tracker.set_client(Some(client.clone()));
        assert_eq!(client.calls.borrow().len(), 4);
        assert_eq!(tracker.pending(), 0);
    }

    #[test]
    fn test_options_carry_user_agent_only_with_consent() {
        let context = TrackerContext::new(newsroom()).with_user_agent("Mozilla/5.0");
        let tracker = Tracker::new(context, MemoryStore::new());
        assert!(!tracker.build_options().has_user_agent());

        tracker.set_consent(true);
        let options = tracker.build_options();
        assert_eq!(options.context.user_agent.as_deref(), Some("Mozilla/5.0"));
        assert_eq!(options.context.library.name, "newsroom-tracking");
    }

    #[test]
    fn test_user_without_client_is_anonymous() {
        let tracker = Tracker::new(TrackerContext::new(newsroom()), MemoryStore::new());
        assert_eq!(tracker.user().id(), None);
    }

    #[test]
    fn test_deferred_identify_runs_callback() {
        let context = TrackerContext::new(newsroom()).with_policy(TrackingPolicy::ConsentToIdentify);
        let tracker = Tracker::new(context, MemoryStore::new());
        let called = Rc::new(Cell::new(false));
        let flag = called.clone();

        tracker.identify("u1", Traits::new(), Some(Box::new(move || flag.set(true))));

        assert!(called.get());
        assert_eq!(tracker.pending(), 0);
        assert_eq!(tracker.deferred_identity().unwrap().user_id, "u1");
    }

    #[test]
    fn test_disabled_tracker_is_inert() {
        let store = Rc::new(MemoryStore::new());
        let context = TrackerContext::new(newsroom())
            .with_policy(TrackingPolicy::ConsentToIdentify)
            .with_enabled(false);
        let tracker = Tracker::new(context, store.clone());

        tracker.track("event", Properties::new(), None);
        tracker.page(None, Some("Home"), Properties::new(), None);
        tracker.alias("u1", "anon");
        tracker.identify("u1", Traits::new(), None);

        assert_eq!(tracker.pending(), 0);
        assert_eq!(store.write_count(), 0);
    }
}
