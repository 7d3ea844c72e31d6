use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::model::role::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub user_id: u64,
    /// Email at issue time.
    pub sub: String,
    /// Role at issue time. Informational; requests re-read the stored role.
    pub role: Role,
    pub iat: usize,
    pub exp: usize,
    pub jti: String,
}

/// `now` is seconds since the Unix epoch.
pub fn generate_token(
    user_id: u64,
    email: &str,
    role: Role,
    secret: &str,
    ttl: u64,
    now: i64,
) -> Result<String, AppError> {
    let iat = now.max(0) as usize;
    let claims = Claims {
        user_id,
        sub: email.to_string(),
        role,
        iat,
        exp: iat + ttl as usize,
        jti: Uuid::new_v4().to_string(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("token signing failed: {e}")))
}

/// Signature and expiry are checked against the system clock.
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> i64 {
        chrono::Utc::now().timestamp()
    }

    #[test]
    fn token_round_trips() {
        let token = generate_token(7, "a@x.com", Role::Manager, "s3cret", 60, now()).unwrap();
        let claims = verify_token(&token, "s3cret").unwrap();
        assert_eq!(claims.user_id, 7);
        assert_eq!(claims.sub, "a@x.com");
        assert_eq!(claims.role, Role::Manager);
        assert_eq!(claims.exp - claims.iat, 60);
    }

    #[test]
    fn wrong_secret_and_expired_tokens_fail() {
        let token = generate_token(1, "a@x.com", Role::Employee, "one", 60, now()).unwrap();
        assert!(verify_token(&token, "two").is_err());

        let stale = generate_token(1, "a@x.com", Role::Employee, "one", 60, now() - 3_600).unwrap();
        assert!(verify_token(&stale, "one").is_err());
    }
}
