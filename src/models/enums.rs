//! Value enumerations shared by projects, bugs, badges and documents.
//!
//! All of them are stored and audited by their string value.

use serde::{Deserialize, Serialize};

/// Open/closed state of a project or bug.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    Open,
    Closed,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Open => "Open",
            Status::Closed => "Closed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Open" => Some(Status::Open),
            "Closed" => Some(Status::Closed),
            _ => None,
        }
    }
}

/// Priority of a project or bug.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Priority {
    #[default]
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "High",
            Priority::Medium => "Medium",
            Priority::Low => "Low",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "High" => Some(Priority::High),
            "Medium" => Some(Priority::Medium),
            "Low" => Some(Priority::Low),
            _ => None,
        }
    }
}

/// Badge colour palette.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Color {
    Red,
    Pink,
    Purple,
    #[default]
    Blue,
    LightBlue,
    Cyan,
    Teal,
    Green,
    LightGreen,
    Lime,
    Yellow,
    Amber,
    Orange,
    DeepOrange,
    Brown,
    Grey,
    BlueGrey,
}

impl Color {
    pub fn as_str(&self) -> &'static str {
        match self {
            Color::Red => "red",
            Color::Pink => "pink",
            Color::Purple => "purple",
            Color::Blue => "blue",
            Color::LightBlue => "light-blue",
            Color::Cyan => "cyan",
            Color::Teal => "teal",
            Color::Green => "green",
            Color::LightGreen => "light-green",
            Color::Lime => "lime",
            Color::Yellow => "yellow",
            Color::Amber => "amber",
            Color::Orange => "orange",
            Color::DeepOrange => "deep-orange",
            Color::Brown => "brown",
            Color::Grey => "grey",
            Color::BlueGrey => "blue-grey",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "red" => Some(Color::Red),
            "pink" => Some(Color::Pink),
            "purple" => Some(Color::Purple),
            "blue" => Some(Color::Blue),
            "light-blue" => Some(Color::LightBlue),
            "cyan" => Some(Color::Cyan),
            "teal" => Some(Color::Teal),
            "green" => Some(Color::Green),
            "light-green" => Some(Color::LightGreen),
            "lime" => Some(Color::Lime),
            "yellow" => Some(Color::Yellow),
            "amber" => Some(Color::Amber),
            "orange" => Some(Color::Orange),
            "deep-orange" => Some(Color::DeepOrange),
            "brown" => Some(Color::Brown),
            "grey" => Some(Color::Grey),
            "blue-grey" => Some(Color::BlueGrey),
            _ => None,
        }
    }
}

/// Kind of entity a badge is attached to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ObjectKind {
    #[default]
    Project,
    Bug,
}

/// Kind of entity a document is attached to; also its storage sub-directory.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum DocumentCategory {
    #[default]
    Project,
    Bug,
}

impl DocumentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentCategory::Project => "Project",
            DocumentCategory::Bug => "Bug",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Project" => Some(DocumentCategory::Project),
            "Bug" => Some(DocumentCategory::Bug),
            _ => None,
        }
    }

    /// Directory name under the document root.
    pub fn dir_name(&self) -> &'static str {
        match self {
            DocumentCategory::Project => "project",
            DocumentCategory::Bug => "bug",
        }
    }
}
