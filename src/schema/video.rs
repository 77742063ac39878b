use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[forge::forge_enum]
pub enum VideoStatus {
    Processing,
    Completed,
    Failed,
}

impl VideoStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Target frame geometry requested from the provider. Only the two fixed
/// orientations are supported.
#[forge::forge_enum]
pub enum Orientation {
    Portrait,
    Landscape,
}

impl Default for Orientation {
    fn default() -> Self {
        Self::Portrait
    }
}

impl Orientation {
    /// Unrecognized or missing values fall back to portrait.
    pub fn parse_lenient(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("landscape") => Self::Landscape,
            _ => Self::Portrait,
        }
    }

    pub fn dimension(self) -> Dimension {
        match self {
            Self::Portrait => Dimension {
                width: 1080,
                height: 1920,
            },
            Self::Landscape => Dimension {
                width: 1920,
                height: 1080,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[forge::model]
pub struct Video {
    pub id: Uuid,
    pub external_id: String,
    pub status: VideoStatus,
    pub result_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub error_message: Option<String>,
    pub orientation: Orientation,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewVideo {
    pub external_id: String,
    pub orientation: Orientation,
    pub title: String,
}
