//! Session token issuance and validation.

use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};

use super::claims::Claims;
use crate::storage::Role;

/// Signs and verifies HS256 session tokens.
#[derive(Clone)]
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_secs: i64,
}

impl JwtManager {
    /// Create a new `JwtManager` with the given signing secret.
    pub fn new(secret: &[u8], ttl_secs: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl_secs,
        }
    }

    /// Issue a token for `email`. Returns the token and its expiry.
    pub fn issue(&self, email: &str, role: Role) -> Result<(String, i64), jsonwebtoken::errors::Error> {
        let now = patio_core::db::unix_timestamp();
        let exp = now + self.ttl_secs;

        let claims = Claims {
            jti: uuid::Uuid::new_v4().to_string(),
            sub: email.to_string(),
            role,
            iat: now,
            exp,
        };

        let token = jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key)?;
        Ok((token, exp))
    }

    /// Validate signature and expiry and return the claims.
    pub fn validate(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let data =
            jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &Validation::default())?;
        Ok(data.claims)
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    fn test_jwt() -> JwtManager {
        JwtManager::new(b"test-secret-key-for-testing", 600)
    }

    #[test]
    fn issue_and_validate() {
        let jwt = test_jwt();
        let (token, exp) = jwt.issue("alice@example.com", Role::Guest).unwrap();

        let claims = jwt.validate(&token).unwrap();
        assert_eq!(claims.sub, "alice@example.com");
        assert_eq!(claims.role, Role::Guest);
        assert_eq!(claims.exp, exp);
        assert_eq!(claims.exp - claims.iat, 600);
    }

    #[test]
    fn every_token_gets_its_own_id() {
        let jwt = test_jwt();
        let (a, _) = jwt.issue("alice@example.com", Role::Guest).unwrap();
        let (b, _) = jwt.issue("alice@example.com", Role::Guest).unwrap();
        assert_ne!(jwt.validate(&a).unwrap().jti, jwt.validate(&b).unwrap().jti);
    }

    #[test]
    fn invalid_token_fails_validation() {
        let jwt = test_jwt();
        assert!(jwt.validate("not-a-valid-token").is_err());
    }

    #[test]
    fn wrong_secret_fails_validation() {
        let jwt1 = test_jwt();
        let jwt2 = JwtManager::new(b"different-secret", 600);

        let (token, _) = jwt1.issue("alice@example.com", Role::Guest).unwrap();
        assert!(jwt2.validate(&token).is_err());
    }

    #[test]
    fn expired_token_fails_validation() {
        // Past the default 60 s leeway.
        let jwt = JwtManager::new(b"test-secret-key-for-testing", -120);
        let (token, _) = jwt.issue("alice@example.com", Role::Guest).unwrap();
        assert!(jwt.validate(&token).is_err());
    }
}
