use serde::Serialize;

/// An audio endpoint as reported by one enumeration call.
///
/// Snapshots are immutable and freely shared between contexts; a fresh
/// enumeration produces fresh snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Device {
    pub id: String,
    pub name: String,
    pub is_default_capture: bool,
    pub supports_capture: bool,
}

impl Device {
    pub fn capture(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_default_capture: false,
            supports_capture: true,
        }
    }

    pub fn render(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_default_capture: false,
            supports_capture: false,
        }
    }

    pub fn as_default(mut self) -> Self {
        self.is_default_capture = true;
        self
    }

    /// Matches a user-supplied override against the id (exact) or the
    /// display name (case-insensitive substring).
    pub fn matches(&self, selector: &str) -> bool {
        self.id == selector || self.name.to_lowercase().contains(&selector.to_lowercase())
    }
}
