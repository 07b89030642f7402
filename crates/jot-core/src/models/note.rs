use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named place attached to a note
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Human-readable place name
    pub name: String,

    pub latitude: f64,

    pub longitude: f64,
}

/// A single note, as held in the local store and exchanged with the remote store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Unique identifier, generated on the client so notes can be created offline
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,

    /// Human-readable title of the note
    pub title: String,

    /// Body text
    #[serde(default)]
    pub content: String,

    /// Optional category the note belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<Uuid>,

    /// Optional place the note was taken at
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,

    /// When the note was created; never changes after creation
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    /// When the note was last modified; non-decreasing per note
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,

    #[serde(default)]
    pub is_archived: bool,
}

impl Note {
    /// Create a new note from a draft with a fresh id and current timestamps
    pub fn new(draft: NoteDraft) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: draft.title,
            content: draft.content,
            category_id: draft.category_id,
            location: draft.location,
            created_at: now,
            updated_at: now,
            is_archived: false,
        }
    }

    /// Bump `updated_at` to now, clamped so it never moves backwards even if
    /// the wall clock does
    pub fn touch(&mut self) {
        let now = Utc::now();
        if now > self.updated_at {
            self.updated_at = now;
        }
    }
}

/// Fields a caller supplies when creating a note
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NoteDraft {
    pub title: String,

    #[serde(default)]
    pub content: String,

    #[serde(default)]
    pub category_id: Option<Uuid>,

    #[serde(default)]
    pub location: Option<Location>,
}

impl NoteDraft {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }
}
