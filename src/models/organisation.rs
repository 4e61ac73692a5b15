//! Organisation (client) model.

use serde::{Deserialize, Serialize};

/// A client organisation owning projects.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Organisation {
    pub id: i64,
    pub name: String,
    pub is_internal: bool,
}

/// Create-or-update payload. Present `id` means audited update.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganisationRequest {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub is_internal: bool,
}

/// Query parameters for the client listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientQuery {
    #[serde(default)]
    pub client_id: Option<i64>,
}
