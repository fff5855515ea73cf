//! Analytics client that prints every delivered call as a JSON line

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use newsroom_tracking_core::{
    AnalyticsClient, AnalyticsUser, Callback, Properties, TrackingOptions, Traits,
};
use serde_json::{json, Value};

/// User record kept by [`PrintClient`]
#[derive(Debug, Default)]
pub struct PrintUser {
    id: RefCell<Option<String>>,
}

impl AnalyticsUser for PrintUser {
    fn id(&self) -> Option<String> {
        self.id.borrow().clone()
    }

    fn set_id(&self, id: Option<String>) {
        *self.id.borrow_mut() = id;
    }
}

/// Writes `{"method": ..., ...}` lines to stdout.
///
/// Like a browser analytics client, `identify` remembers the user id.
#[derive(Debug, Default)]
pub struct PrintClient {
    user: Rc<PrintUser>,
}

impl PrintClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn emit(&self, line: Value) {
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = writeln!(stdout, "{}", line) {
            tracing::warn!(error = %e, "Failed to write delivered call");
        }
    }
}

impl AnalyticsClient for PrintClient {
    fn identify(
        &self,
        user_id: &str,
        traits: &Traits,
        options: &TrackingOptions,
        callback: Option<Callback>,
    ) {
        self.user.set_id(Some(user_id.to_string()));
        self.emit(json!({
            "method": "identify",
            "userId": user_id,
            "traits": traits,
            "options": options,
        }));
        if let Some(callback) = callback {
            callback();
        }
    }

    fn alias(&self, user_id: &str, previous_id: &str, options: &TrackingOptions) {
        self.emit(json!({
            "method": "alias",
            "userId": user_id,
            "previousId": previous_id,
            "options": options,
        }));
    }

    fn page(
        &self,
        category: Option<&str>,
        name: Option<&str>,
        properties: &Properties,
        options: &TrackingOptions,
        callback: Option<Callback>,
    ) {
        self.emit(json!({
            "method": "page",
            "category": category,
            "name": name,
            "properties": properties,
            "options": options,
        }));
        if let Some(callback) = callback {
            callback();
        }
    }

    fn track(
        &self,
        event: &str,
        properties: &Properties,
        options: &TrackingOptions,
        callback: Option<Callback>,
    ) {
        self.emit(json!({
            "method": "track",
            "event": event,
            "properties": properties,
            "options": options,
        }));
        if let Some(callback) = callback {
            callback();
        }
    }

    fn user(&self) -> Option<Rc<dyn AnalyticsUser>> {
        Some(self.user.clone())
    }
}
