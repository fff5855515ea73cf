//! Core domain types for newsroom-tracking
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Tracking policy** | Newsroom setting deciding whether identification needs explicit consent |
//! | **Consent** | Whether the visitor allowed tracking and identifying data collection |
//! | **Deferred identity** | An `identify` call withheld until consent arrives, persisted until replay |
//! | **Prezly meta** | First-party metadata (newsroom, story, policy) injected into every payload |
//! | **Options** | Per-call request context sent alongside the payload (library stamp, user agent) |

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Key/value payload attached to identify calls.
pub type Traits = serde_json::Map<String, serde_json::Value>;

/// Key/value payload attached to page and track calls.
pub type Properties = serde_json::Map<String, serde_json::Value>;

/// Completion callback handed to the analytics client.
///
/// Also invoked synchronously by the façade when an identify call is
/// accepted but deferred.
pub type Callback = Box<dyn FnOnce()>;

/// Name reported in the library stamp of every call.
pub const LIBRARY_NAME: &str = "newsroom-tracking";

/// Key under which [`PrezlyMeta`] is injected into payloads.
pub const META_KEY: &str = "prezly";

// ============================================
// Tracking policy
// ============================================

/// Newsroom tracking policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackingPolicy {
    /// Identify without asking
    #[default]
    Default,
    /// Identification is withheld until the visitor consents
    ConsentToIdentify,
    /// Strict newsroom policy
    Strict,
    /// Lenient newsroom policy
    Lenient,
}

impl TrackingPolicy {
    /// Whether `identify` must wait for consent under this policy
    pub fn requires_consent_to_identify(&self) -> bool {
        matches!(self, TrackingPolicy::ConsentToIdentify)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrackingPolicy::Default => "DEFAULT",
            TrackingPolicy::ConsentToIdentify => "CONSENT_TO_IDENTIFY",
            TrackingPolicy::Strict => "STRICT",
            TrackingPolicy::Lenient => "LENIENT",
        }
    }
}

impl std::fmt::Display for TrackingPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TrackingPolicy {
    type Err = crate::error::Error;

    /// Accepts the wire value in any case, with `-` or `_` separators
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "DEFAULT" => Ok(TrackingPolicy::Default),
            "CONSENT_TO_IDENTIFY" => Ok(TrackingPolicy::ConsentToIdentify),
            "STRICT" => Ok(TrackingPolicy::Strict),
            "LENIENT" => Ok(TrackingPolicy::Lenient),
            _ => Err(crate::error::Error::Config(format!(
                "unknown tracking policy: {}",
                s
            ))),
        }
    }
}

// ============================================
// Deferred identity
// ============================================

/// An identification request withheld pending consent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeferredIdentity {
    pub user_id: String,
    #[serde(default)]
    pub traits: Traits,
}

impl DeferredIdentity {
    pub fn new(user_id: impl Into<String>, traits: Traits) -> Self {
        Self {
            user_id: user_id.into(),
            traits,
        }
    }

    /// Identity carrying only a user id, as captured from the client when
    /// consent is withdrawn.
    pub fn anonymous_traits(user_id: impl Into<String>) -> Self {
        Self::new(user_id, Traits::new())
    }
}

// ============================================
// First-party metadata
// ============================================

/// Metadata describing where an event happened.
///
/// Derived from the page context, never from user input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrezlyMeta {
    pub newsroom: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub story: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_policy: Option<TrackingPolicy>,
}

impl PrezlyMeta {
    pub fn new(newsroom: Uuid) -> Self {
        Self {
            newsroom,
            story: None,
            tracking_policy: None,
        }
    }

    pub fn with_story(mut self, story: Option<Uuid>) -> Self {
        self.story = story;
        self
    }

    pub fn with_tracking_policy(mut self, policy: Option<TrackingPolicy>) -> Self {
        self.tracking_policy = policy;
        self
    }

    /// Returns `payload` with the `prezly` key set to this metadata.
    ///
    /// A `prezly` key supplied by the caller is replaced.
    pub fn inject(&self, mut payload: serde_json::Map<String, serde_json::Value>) -> Traits {
        // PrezlyMeta only holds uuids and a unit enum, so this cannot fail.
        let meta = serde_json::to_value(self).unwrap_or_default();
        payload.insert(META_KEY.to_string(), meta);
        payload
    }
}

// ============================================
// Options
// ============================================

/// Library name and version stamp
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryStamp {
    pub name: String,
    pub version: String,
}

impl Default for LibraryStamp {
    fn default() -> Self {
        Self {
            name: LIBRARY_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Request context sent with every call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    pub library: LibraryStamp,
    /// Only present when the visitor consented
    #[serde(
        rename = "userAgent",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub user_agent: Option<String>,
}

/// Options passed to every analytics client call.
///
/// Serializes as `{"context": {"library": {...}, "userAgent": "..."}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingOptions {
    pub context: RequestContext,
}

impl TrackingOptions {
    pub fn has_user_agent(&self) -> bool {
        self.context.user_agent.is_some()
    }
}
