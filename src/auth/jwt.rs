//! Session token issue and verification (HS256 JWT).

use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub exp: i64,
    /// Unique per issue so two logins never share a token
    pub jti: String,
}

/// Sign a token for `user_id` valid for `ttl`. Returns the token and its
/// expiry.
pub fn issue_token(
    user_id: i64,
    secret: &[u8],
    ttl: Duration,
) -> Result<(String, DateTime<Utc>), AppError> {
    let ttl = chrono::Duration::from_std(ttl)
        .map_err(|e| AppError::Internal(format!("Invalid token lifetime: {}", e)))?;
    let expires_at = Utc::now() + ttl;
    let claims = Claims {
        sub: user_id.to_string(),
        exp: expires_at.timestamp(),
        jti: uuid::Uuid::new_v4().to_string(),
    };

    let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(secret))
        .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))?;
    Ok((token, expires_at))
}

/// Verify signature and expiry and return the user id the token was issued
/// for.
pub fn verify_token(token: &str, secret: &[u8]) -> Result<i64, AppError> {
    let mut validation = Validation::default();
    validation.leeway = 0;
    let data = decode::<Claims>(token, &DecodingKey::from_secret(secret), &validation)?;

    data.claims
        .sub
        .parse()
        .map_err(|_| AppError::Unauthorized("Token expired.".to_string()))
}
