use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("JWT encoding error: {0}")]
    Encoding(#[from] jsonwebtoken::errors::Error),
    #[error("JWT decoding error: {0}")]
    Decoding(String),
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
    #[error("Invalid subject in claims: {0}")]
    InvalidSubject(String),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // User ID
    pub exp: usize,
    pub iat: usize,
}

#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_ref()),
            decoding_key: DecodingKey::from_secret(secret.as_ref()),
        }
    }

    pub fn generate_token(&self, user_id: i64, ttl: Duration) -> Result<String, JwtError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            exp: (now + ttl).timestamp() as usize,
            iat: now.timestamp() as usize,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(JwtError::Encoding)
    }

    /// Verifies signature and expiry, returning the user id carried in `sub`.
    pub fn verify_token(&self, token: &str) -> Result<i64, JwtError> {
        if token.is_empty() || token.split('.').count() != 3 {
            return Err(JwtError::InvalidToken);
        }

        let validation = Validation::new(Algorithm::HS256);
        let claims = match decode::<Claims>(token, &self.decoding_key, &validation) {
            Ok(token_data) => token_data.claims,
            Err(err) => {
                log::debug!("JWT token decode error: {:?}", err);
                return match err.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => Err(JwtError::TokenExpired),
                    jsonwebtoken::errors::ErrorKind::InvalidToken
                    | jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                        Err(JwtError::InvalidToken)
                    }
                    _ => Err(JwtError::Decoding(err.to_string())),
                };
            }
        };

        log::debug!("JWT token decoded successfully for user {}", claims.sub);
        claims
            .sub
            .parse::<i64>()
            .map_err(|_| JwtError::InvalidSubject(claims.sub.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_tokens_verify() {
        let jwt = JwtService::new("secret");
        let token = jwt.generate_token(42, Duration::minutes(30)).unwrap();
        assert_eq!(jwt.verify_token(&token).unwrap(), 42);
    }

    #[test]
    fn foreign_signature_is_rejected() {
        let token = JwtService::new("other")
            .generate_token(42, Duration::minutes(30))
            .unwrap();
        assert!(matches!(
            JwtService::new("secret").verify_token(&token),
            Err(JwtError::InvalidToken)
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let jwt = JwtService::new("secret");
        let token = jwt.generate_token(42, Duration::hours(-2)).unwrap();
        assert!(matches!(jwt.verify_token(&token), Err(JwtError::TokenExpired)));
    }

    #[test]
    fn malformed_token_is_rejected() {
        let jwt = JwtService::new("secret");
        assert!(matches!(jwt.verify_token(""), Err(JwtError::InvalidToken)));
        assert!(matches!(jwt.verify_token("a.b"), Err(JwtError::InvalidToken)));
    }

    #[test]
    fn non_numeric_subject_is_rejected() {
        let claims = Claims {
            sub: "alice".to_string(),
            exp: (Utc::now() + Duration::minutes(5)).timestamp() as usize,
            iat: Utc::now().timestamp() as usize,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();
        assert!(matches!(
            JwtService::new("secret").verify_token(&token),
            Err(JwtError::InvalidSubject(_))
        ));
    }
}
