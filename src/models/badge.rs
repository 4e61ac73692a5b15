//! Badge model.

use serde::{Deserialize, Serialize};

use super::{Color, ObjectKind};

/// A coloured label attachable to projects and bugs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Badge {
    pub id: i64,
    pub label: String,
    pub color: Color,
}

/// Request body for creating (or reusing) a badge and attaching it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeRequest {
    pub object_id: i64,
    #[serde(default)]
    pub object_type: ObjectKind,
    pub label: String,
    #[serde(default = "default_badge_color")]
    pub color: Color,
}

fn default_badge_color() -> Color {
    Color::Red
}
