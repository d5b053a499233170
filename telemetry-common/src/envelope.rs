//! The envelope handed to the transport.
//!
//! Only the parts of the envelope format that the buffering engines produce are modeled here:
//! an empty envelope header followed by items, each with a JSON header line and a raw payload.
//!
//! ```text
//! {}
//! {"type":"log","length":28,"content_type":"application/vnd.sentry.items.log+json","item_count":1}
//! {"items":[{"body":"hello"}]}
//! ```

use std::fmt;

use bytes::Bytes;
use serde::Serialize;

/// The type of an [`EnvelopeItem`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ItemType {
    /// A batch of structured log items.
    Log,
    /// A batch of trace-connected metric items.
    TraceMetric,
    /// Aggregated metric buckets in the statsd line protocol.
    Statsd,
}

impl ItemType {
    /// Returns the name of this item type as used in the item header.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::TraceMetric => "trace_metric",
            Self::Statsd => "statsd",
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize)]
struct ItemHeaderRepr<'a> {
    #[serde(rename = "type")]
    ty: &'a str,
    length: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    item_count: Option<usize>,
}

/// A single item of an [`Envelope`].
#[derive(Clone, Debug, PartialEq)]
pub struct EnvelopeItem {
    ty: ItemType,
    content_type: Option<&'static str>,
    item_count: Option<usize>,
    payload: Bytes,
}

impl EnvelopeItem {
    /// Creates a new empty item of the given type.
    pub fn new(ty: ItemType) -> Self {
        Self {
            ty,
            content_type: None,
            item_count: None,
            payload: Bytes::new(),
        }
    }

    /// Returns the type of this item.
    pub fn ty(&self) -> ItemType {
        self.ty
    }

    /// Returns the content type of the payload, if set.
    pub fn content_type(&self) -> Option<&'static str> {
        self.content_type
    }

    /// Returns the number of telemetry items batched into the payload, if set.
    pub fn item_count(&self) -> Option<usize> {
        self.item_count
    }

    /// Returns the raw payload.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Sets the payload and its content type.
    pub fn set_payload(&mut self, content_type: &'static str, payload: impl Into<Bytes>) {
        self.content_type = Some(content_type);
        self.payload = payload.into();
    }

    /// Sets the number of telemetry items batched into the payload.
    pub fn set_item_count(&mut self, count: usize) {
        self.item_count = Some(count);
    }

    fn write_to(&self, buf: &mut Vec<u8>) -> Result<(), serde_json::Error> {
        let header = ItemHeaderRepr {
            ty: self.ty.as_str(),
            length: self.payload.len(),
            content_type: self.content_type,
            item_count: self.item_count,
        };

        serde_json::to_writer(&mut *buf, &header)?;
        buf.push(b'\n');
        buf.extend_from_slice(&self.payload);
        buf.push(b'\n');
        Ok(())
    }
}

/// A container of items delivered to the [`Transport`] in one request.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Envelope {
    items: Vec<EnvelopeItem>,
}

impl Envelope {
    /// Creates an envelope without items.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an envelope holding a single item.
    pub fn from_item(item: EnvelopeItem) -> Self {
        Self { items: vec![item] }
    }

    /// Appends an item to the envelope.
    pub fn add_item(&mut self, item: EnvelopeItem) {
        self.items.push(item);
    }

    /// Returns the items of the envelope in insertion order.
    pub fn items(&self) -> impl ExactSizeIterator<Item = &EnvelopeItem> {
        self.items.iter()
    }

    /// Returns the number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if the envelope has no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Serializes the envelope into its newline-delimited wire format.
    pub fn to_vec(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"{}\n");
        for item in &self.items {
            item.write_to(&mut buf)?;
        }
        Ok(buf)
    }
}

/// Delivers envelopes to the telemetry backend.
///
/// Calls are fire-and-forget: the buffering engines neither await acknowledgement nor retry.
pub trait Transport: Send + Sync {
    /// Hands an envelope to the transport.
    fn send_envelope(&self, envelope: Envelope);
}
