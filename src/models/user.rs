//! User and session models.

use serde::{Deserialize, Serialize};

/// Public view of a user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub username: String,
}

/// User row including the stored password hash. Never serialized.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
}

impl From<UserCredentials> for User {
    fn from(user: UserCredentials) -> Self {
        Self {
            id: user.id,
            username: user.username,
        }
    }
}

/// User returned by login/register.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: i64,
    pub username: String,
    pub is_authenticated: bool,
}

impl From<User> for SessionUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            is_authenticated: true,
        }
    }
}

/// A persisted session token.
#[derive(Debug, Clone)]
pub struct Token {
    pub id: i64,
    pub token: String,
    pub user_id: i64,
    pub expires_at: String,
    pub force_expiration: bool,
    pub is_refresh: bool,
}

/// Request body for login. Both fields are optional so that a cookie-only
/// login can post an empty body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Request body for registration.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}
