//! Enrichment of telemetry items with scope data.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use telemetry_common::{SpanId, TraceId};

use crate::{AttributeValue, Attributes, TelemetryItem};

/// The name of the SDK reported in `sentry.sdk.name` by default.
pub const DEFAULT_SDK_NAME: &str = "sentry.rust.telemetry";

/// Context key of the operating system context.
pub const OS_CONTEXT_KEY: &str = "os";

/// Context key of the device context.
pub const DEVICE_CONTEXT_KEY: &str = "device";

/// The trace and span identifiers of the active span.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SpanContext {
    /// The trace the span belongs to.
    pub trace_id: TraceId,
    /// The identifier of the span.
    pub span_id: SpanId,
}

/// The user set on the scope.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier of the user.
    pub id: Option<String>,
    /// Display name of the user.
    pub name: Option<String>,
    /// Email address of the user.
    pub email: Option<String>,
}

/// Ambient state merged into every telemetry item before buffering.
pub trait TelemetryScope {
    /// The identifier of the replay recorded in this session, if any.
    fn replay_id(&self) -> Option<&str>;

    /// The trace identifier of the propagation context, used when no span is active.
    fn propagation_trace_id(&self) -> TraceId;

    /// The active span, if any.
    fn span(&self) -> Option<SpanContext>;

    /// The user, if set.
    fn user(&self) -> Option<&User>;

    /// Returns the context stored under `key`, such as [`OS_CONTEXT_KEY`].
    fn context(&self, key: &str) -> Option<&Map<String, Value>>;

    /// Custom attributes set on the scope.
    fn attributes(&self) -> &Attributes;
}

/// SDK-level values used during enrichment.
#[derive(Clone, Debug, PartialEq)]
pub struct TelemetryMetadata {
    /// The environment, e.g. `production`.
    pub environment: String,
    /// The release, if configured.
    pub release: Option<String>,
    /// A stable identifier of this installation, used as fallback user id.
    pub installation_id: Option<String>,
    /// Reported as `sentry.sdk.name`.
    pub sdk_name: String,
    /// Reported as `sentry.sdk.version`.
    pub sdk_version: String,
    /// Whether the scope's replay id is attached to items on this platform.
    pub attach_replay_id: bool,
}

impl Default for TelemetryMetadata {
    fn default() -> Self {
        Self {
            environment: "production".to_owned(),
            release: None,
            installation_id: None,
            sdk_name: DEFAULT_SDK_NAME.to_owned(),
            sdk_version: env!("CARGO_PKG_VERSION").to_owned(),
            attach_replay_id: false,
        }
    }
}

/// A concrete [`TelemetryScope`] holding its state in memory.
#[derive(Clone, Debug, Default)]
pub struct Scope {
    attributes: Attributes,
    user: Option<User>,
    span: Option<SpanContext>,
    propagation_trace_id: TraceId,
    replay_id: Option<String>,
    contexts: BTreeMap<String, Map<String, Value>>,
}

impl Scope {
    /// Creates an empty scope with a new random propagation trace id.
    pub fn new() -> Self {
        Self {
            propagation_trace_id: TraceId::random(),
            ..Self::default()
        }
    }

    /// Sets a custom attribute applied to all items that do not set it themselves.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<AttributeValue>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Removes a custom attribute.
    pub fn remove_attribute(&mut self, key: &str) {
        self.attributes.remove(key);
    }

    /// Sets or clears the user.
    pub fn set_user(&mut self, user: Option<User>) {
        self.user = user;
    }

    /// Sets or clears the active span.
    pub fn set_span(&mut self, span: Option<SpanContext>) {
        self.span = span;
    }

    /// Replaces the propagation trace id.
    pub fn set_propagation_trace_id(&mut self, trace_id: TraceId) {
        self.propagation_trace_id = trace_id;
    }

    /// Sets or clears the replay id.
    pub fn set_replay_id(&mut self, replay_id: Option<String>) {
        self.replay_id = replay_id;
    }

    /// Stores a context, such as the [`OS_CONTEXT_KEY`] context, under `key`.
    pub fn set_context(&mut self, key: impl Into<String>, context: Map<String, Value>) {
        self.contexts.insert(key.into(), context);
    }
}

impl TelemetryScope for Scope {
    fn replay_id(&self) -> Option<&str> {
        self.replay_id.as_deref()
    }

    fn propagation_trace_id(&self) -> TraceId {
        self.propagation_trace_id
    }

    fn span(&self) -> Option<SpanContext> {
        self.span
    }

    fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    fn context(&self, key: &str) -> Option<&Map<String, Value>> {
        self.contexts.get(key)
    }

    fn attributes(&self) -> &Attributes {
        &self.attributes
    }
}

fn set_string(attributes: &mut Attributes, key: &str, value: &str) {
    attributes.insert(key.to_owned(), AttributeValue::String(value.to_owned()));
}

fn copy_context_string(
    attributes: &mut Attributes,
    context: &Map<String, Value>,
    field: &str,
    key: &str,
) {
    if let Some(value) = context.get(field).and_then(Value::as_str) {
        set_string(attributes, key, value);
    }
}

/// Merges scope and SDK data into the item and sets its trace id.
///
/// Attributes are applied in this order, later steps replacing earlier ones:
///
///  1. SDK name and version, environment, release and the active span id.
///  2. `os.name` and `os.version` from the OS context.
///  3. `device.brand`, `device.model` and `device.family` from the device context.
///  4. `user.id`, `user.name` and `user.email`, only if `send_default_pii` is set.
///  5. `sentry.replay_id` if the metadata allows replay ids.
///  6. Custom scope attributes, only for keys that are not yet present.
///  7. The installation id as `user.id` if no user attribute is present at all.
///
/// The trace id is taken from the active span, or the propagation context otherwise.
pub fn apply_to_item<T: TelemetryItem>(
    item: &mut T,
    scope: &dyn TelemetryScope,
    metadata: &TelemetryMetadata,
    send_default_pii: bool,
) {
    let span = scope.span();
    let attributes = item.attributes_mut();

    set_string(attributes, "sentry.sdk.name", &metadata.sdk_name);
    set_string(attributes, "sentry.sdk.version", &metadata.sdk_version);
    set_string(attributes, "sentry.environment", &metadata.environment);
    if let Some(ref release) = metadata.release {
        set_string(attributes, "sentry.release", release);
    }
    if let Some(span) = span {
        set_string(attributes, "span_id", &span.span_id.to_string());
    }

    if let Some(os) = scope.context(OS_CONTEXT_KEY) {
        copy_context_string(attributes, os, "name", "os.name");
        copy_context_string(attributes, os, "version", "os.version");
    }

    if let Some(device) = scope.context(DEVICE_CONTEXT_KEY) {
        copy_context_string(attributes, device, "brand", "device.brand");
        copy_context_string(attributes, device, "model", "device.model");
        copy_context_string(attributes, device, "family", "device.family");
    }

    if send_default_pii {
        if let Some(user) = scope.user() {
            if let Some(ref id) = user.id {
                set_string(attributes, "user.id", id);
            }
            if let Some(ref name) = user.name {
                set_string(attributes, "user.name", name);
            }
            if let Some(ref email) = user.email {
                set_string(attributes, "user.email", email);
            }
        }
    }

    if metadata.attach_replay_id {
        if let Some(replay_id) = scope.replay_id() {
            set_string(attributes, "sentry.replay_id", replay_id);
        }
    }

    for (key, value) in scope.attributes() {
        if !attributes.contains_key(key) {
            attributes.insert(key.clone(), value.clone());
        }
    }

    let has_user = ["user.id", "user.name", "user.email"]
        .iter()
        .any(|key| attributes.contains_key(*key));
    if !has_user {
        if let Some(ref installation_id) = metadata.installation_id {
            set_string(attributes, "user.id", installation_id);
        }
    }

    let trace_id = match span {
        Some(span) => span.trace_id,
        None => scope.propagation_trace_id(),
    };
    item.set_trace_id(trace_id);
}
