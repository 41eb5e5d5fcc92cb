use std::fmt::{self, Display, Formatter};

use crate::ids::ContentId;

/// Classification of the selected content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ContentKind {
    /// Episodic content, gated once per episode/chapter
    #[default]
    Episode,
    /// Long-form content; the gate re-engages periodically during playback
    Movie,
}

impl ContentKind {
    pub fn is_long_form(&self) -> bool {
        matches!(self, ContentKind::Movie)
    }
}

impl Display for ContentKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ContentKind::Episode => write!(f, "Episode"),
            ContentKind::Movie => write!(f, "Movie"),
        }
    }
}

/// The "content changed" signal: which content is now playing and what kind
/// it is.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ContentSelection {
    pub id: ContentId,
    #[cfg_attr(feature = "serde", serde(default))]
    pub kind: ContentKind,
}

impl ContentSelection {
    pub fn new(id: impl Into<String>, kind: ContentKind) -> Self {
        Self {
            id: ContentId::new(id),
            kind,
        }
    }

    pub fn episode(id: impl Into<String>) -> Self {
        Self::new(id, ContentKind::Episode)
    }

    pub fn movie(id: impl Into<String>) -> Self {
        Self::new(id, ContentKind::Movie)
    }

    pub fn is_long_form(&self) -> bool {
        self.kind.is_long_form()
    }
}
