//! Data models for the bug tracker.
//!
//! Row types mirror the SQLite schema; view types are what the API serializes.

mod badge;
mod bug;
mod comment;
mod document;
mod enums;
mod history;
mod organisation;
mod project;
mod user;

pub use badge::*;
pub use bug::*;
pub use comment::*;
pub use document::*;
pub use enums::*;
pub use history::*;
pub use organisation::*;
pub use project::*;
pub use user::*;

use serde::{Deserialize, Serialize};

/// Request body carrying a list of entity ids (bulk delete / bulk close).
#[derive(Debug, Clone, Deserialize)]
pub struct IdsRequest {
    pub ids: Vec<i64>,
}

/// A created or updated entity, plus any requested association ids that
/// matched no row and were left out.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Saved<T> {
    #[serde(flatten)]
    pub item: T,
    pub ignored_ids: Vec<i64>,
}
