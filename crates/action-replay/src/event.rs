//! Interaction event definitions.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Value, json};

/// Capture timestamp in milliseconds.
pub type Timestamp = i64;

/// Event kinds.
///
/// Serialized as the capture layer's type strings (`mousemove`, `click`,
/// `scroll`); unknown strings are kept as [`EventKind::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Pointer moved.
    Move,
    /// Pointer clicked.
    Click,
    /// Surface scrolled.
    Scroll,
    /// Any other kind, passed through untouched.
    Other(String),
}

impl EventKind {
    /// Get the wire name of this kind.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Move => "mousemove",
            Self::Click => "click",
            Self::Scroll => "scroll",
            Self::Other(name) => name,
        }
    }

    /// Parse a wire name.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name {
            "mousemove" | "move" => Self::Move,
            "click" => Self::Click,
            "scroll" | "wheel" => Self::Scroll,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EventKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Self::from_name(&name))
    }
}

/// A point on the surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

impl Point {
    /// Create a point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A recorded interaction event.
///
/// The payload is opaque to the engine; it is never validated beyond the
/// presence of `time` and `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Capture timestamp.
    pub time: Timestamp,
    /// Event kind.
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Type-specific payload.
    #[serde(default)]
    pub data: Value,
}

impl Event {
    /// Create an event with an arbitrary payload.
    #[must_use]
    pub const fn new(time: Timestamp, kind: EventKind, data: Value) -> Self {
        Self { time, kind, data }
    }

    /// Create a pointer move event.
    #[must_use]
    pub fn pointer_move(time: Timestamp, x: f64, y: f64) -> Self {
        Self::new(time, EventKind::Move, json!({ "x": x, "y": y }))
    }

    /// Create a click event.
    #[must_use]
    pub fn click(time: Timestamp, x: f64, y: f64) -> Self {
        Self::new(time, EventKind::Click, json!({ "x": x, "y": y }))
    }

    /// Create a scroll event carrying the scroll offsets.
    #[must_use]
    pub fn scroll(time: Timestamp, x: f64, y: f64) -> Self {
        Self::new(time, EventKind::Scroll, json!({ "x": x, "y": y }))
    }

    /// Read an `{x, y}` payload, if the event carries one.
    #[must_use]
    pub fn point(&self) -> Option<Point> {
        let x = self.data.get("x")?.as_f64()?;
        let y = self.data.get("y")?.as_f64()?;
        Some(Point::new(x, y))
    }

    /// Check if this is a pointer move event.
    #[must_use]
    pub const fn is_move(&self) -> bool {
        matches!(self.kind, EventKind::Move)
    }

    /// Check if this is a click event.
    #[must_use]
    pub const fn is_click(&self) -> bool {
        matches!(self.kind, EventKind::Click)
    }
}
