//! Event system for opsdroid.
//!
//! An [`Event`] is an immutable, normalized unit of incoming (or outgoing)
//! activity. Connectors build events from platform data with an
//! [`EventBuilder`]; once built, an event is never mutated. Deriving a new
//! event (for example filling in a default target before sending) produces a
//! fresh value.
//!
//! ```rust,ignore
//! use opsdroid_core::Event;
//!
//! let event = Event::message("hello")
//!     .user("alice")
//!     .target("#general")
//!     .connector("slack")
//!     .raw(serde_json::json!({ "ts": "1700000000.000100" }))
//!     .build();
//!
//! assert_eq!(event.text(), Some("hello"));
//! ```

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use uuid::Uuid;

use crate::foundation::error::EventError;

// ============================================================================
// Event Kinds
// ============================================================================

/// The payload of a file-like event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContent {
    bytes: Option<Vec<u8>>,
    url: Option<String>,
    mime: Option<String>,
}

impl FileContent {
    /// Creates file content from raw bytes and/or a URL.
    ///
    /// At least one of the two must be present.
    pub fn new(bytes: Option<Vec<u8>>, url: Option<String>) -> Result<Self, EventError> {
        if bytes.is_none() && url.is_none() {
            return Err(EventError::MissingFileSource);
        }
        Ok(Self {
            bytes,
            url,
            mime: None,
        })
    }

    /// Sets the MIME type.
    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }

    /// Returns the file bytes, if they were attached.
    pub fn bytes(&self) -> Option<&[u8]> {
        self.bytes.as_deref()
    }

    /// Returns the file URL, if one was given.
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Returns the MIME type, if known.
    pub fn mime(&self) -> Option<&str> {
        self.mime.as_deref()
    }
}

/// The kind of activity an event represents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// A text message.
    Message {
        /// Message text.
        text: String,
    },
    /// A unicode reaction to another event.
    Reaction {
        /// The emoji to react with.
        emoji: String,
    },
    /// An arbitrary file.
    File(FileContent),
    /// An image file.
    Image(FileContent),
}

impl EventKind {
    /// Returns the name of this kind, used in logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Message { .. } => "message",
            Self::Reaction { .. } => "reaction",
            Self::File(_) => "file",
            Self::Image(_) => "image",
        }
    }
}

// ============================================================================
// Event
// ============================================================================

/// An immutable normalized event.
#[derive(Debug, Clone)]
pub struct Event {
    id: Uuid,
    kind: EventKind,
    user: Option<String>,
    target: Option<String>,
    connector: Option<String>,
    raw: Value,
    linked_event: Option<Uuid>,
    created: Instant,
}

/// A shared, reference-counted event.
pub type SharedEvent = Arc<Event>;

impl Event {
    /// Starts building an event of the given kind.
    pub fn builder(kind: EventKind) -> EventBuilder {
        EventBuilder::new(kind)
    }

    /// Starts building a text message.
    pub fn message(text: impl Into<String>) -> EventBuilder {
        EventBuilder::new(EventKind::Message { text: text.into() })
    }

    /// Starts building a reaction.
    pub fn reaction(emoji: impl Into<String>) -> EventBuilder {
        EventBuilder::new(EventKind::Reaction {
            emoji: emoji.into(),
        })
    }

    /// Starts building a file event.
    pub fn file(bytes: Option<Vec<u8>>, url: Option<String>) -> Result<EventBuilder, EventError> {
        FileContent::new(bytes, url).map(|content| EventBuilder::new(EventKind::File(content)))
    }

    /// Starts building an image event.
    pub fn image(bytes: Option<Vec<u8>>, url: Option<String>) -> Result<EventBuilder, EventError> {
        FileContent::new(bytes, url).map(|content| EventBuilder::new(EventKind::Image(content)))
    }

    /// Returns the unique identifier of this event.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the event kind.
    pub fn kind(&self) -> &EventKind {
        &self.kind
    }

    /// Returns the message text for message events.
    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Message { text } => Some(text),
            _ => None,
        }
    }

    /// Returns the sender identity.
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// Returns the room, channel or user this event belongs to.
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// Returns the name of the originating connector.
    pub fn connector(&self) -> Option<&str> {
        self.connector.as_deref()
    }

    /// Returns the raw platform payload.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Returns the id of the event this one refers to, if any.
    pub fn linked_event(&self) -> Option<Uuid> {
        self.linked_event
    }

    /// Returns when this event was created.
    pub fn created(&self) -> Instant {
        self.created
    }

    /// Returns a copy of this event addressed to `target`.
    ///
    /// The copy keeps the same id; it is the same logical event.
    pub fn retarget(&self, target: impl Into<String>) -> Event {
        Event {
            target: Some(target.into()),
            ..self.clone()
        }
    }

    pub(crate) fn with_origin(self, connector: &str) -> Event {
        Event {
            connector: Some(connector.to_string()),
            ..self
        }
    }

    /// Starts a reply to this event.
    ///
    /// The reply inherits user, target and connector from this event and is
    /// linked to it.
    pub fn reply(&self, kind: EventKind) -> EventBuilder {
        EventBuilder {
            kind,
            user: self.user.clone(),
            target: self.target.clone(),
            connector: self.connector.clone(),
            raw: Value::Null,
            linked_event: Some(self.id),
        }
    }
}

// ============================================================================
// Event Builder
// ============================================================================

/// Builder for [`Event`].
#[derive(Debug, Clone)]
pub struct EventBuilder {
    kind: EventKind,
    user: Option<String>,
    target: Option<String>,
    connector: Option<String>,
    raw: Value,
    linked_event: Option<Uuid>,
}

impl EventBuilder {
    fn new(kind: EventKind) -> Self {
        Self {
            kind,
            user: None,
            target: None,
            connector: None,
            raw: Value::Null,
            linked_event: None,
        }
    }

    /// Sets the sender identity.
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Sets the room, channel or user the event belongs to.
    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Sets the originating connector name.
    pub fn connector(mut self, connector: impl Into<String>) -> Self {
        self.connector = Some(connector.into());
        self
    }

    /// Attaches the raw platform payload.
    pub fn raw(mut self, raw: Value) -> Self {
        self.raw = raw;
        self
    }

    /// Links this event to another one (reactions, replies).
    pub fn linked_to(mut self, event: &Event) -> Self {
        self.linked_event = Some(event.id);
        self
    }

    /// Finishes the event.
    pub fn build(self) -> Event {
        Event {
            id: Uuid::new_v4(),
            kind: self.kind,
            user: self.user,
            target: self.target,
            connector: self.connector,
            raw: self.raw,
            linked_event: self.linked_event,
            created: Instant::now(),
        }
    }
}
