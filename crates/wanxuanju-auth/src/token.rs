use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};

use wanxuanju_types::api::Claims;
use wanxuanju_types::models::{Identity, Session};

use crate::AuthError;

/// Mint a session for an identity: a signed JWT plus its expiry.
pub fn mint(secret: &str, identity: &Identity, ttl: Duration) -> Result<Session, AuthError> {
    let expires_at = Utc::now() + ttl;
    let claims = Claims {
        sub: identity.id,
        email: identity.email.clone(),
        exp: expires_at.timestamp() as usize,
    };

    let access_token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AuthError::Backend(format!("token encoding failed: {e}")))?;

    Ok(Session {
        access_token,
        expires_at,
        identity: identity.clone(),
    })
}

/// Validate a bearer token and return its claims.
pub fn decode_claims(secret: &str, token: &str) -> Result<Claims, AuthError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AuthError::InvalidCredentials)?;
    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn identity() -> Identity {
        Identity {
            id: Uuid::new_v4(),
            email: "a@b.com".into(),
            metadata: serde_json::json!({}),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn mint_and_decode() {
        let identity = identity();
        let session = mint("secret", &identity, Duration::hours(1)).unwrap();

        let claims = decode_claims("secret", &session.access_token).unwrap();
        assert_eq!(claims.sub, identity.id);
        assert_eq!(claims.email, "a@b.com");
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let session = mint("secret", &identity(), Duration::hours(1)).unwrap();
        assert!(decode_claims("other", &session.access_token).is_err());
    }
}
