use jsonwebtoken::{self, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Claims minted by the identity provider and verified here with a shared
/// HS256 secret. The server only ever reads `sub`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub jti: String,
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("invalid token: {0}")]
    Decode(String),
    #[error("encoding failed: {0}")]
    Encode(String),
}

pub fn decode_and_verify(token: &str, secret: &[u8]) -> Result<SessionClaims, JwtError> {
    let key = DecodingKey::from_secret(secret);
    let validation = Validation::new(Algorithm::HS256);
    jsonwebtoken::decode::<SessionClaims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|e| JwtError::Decode(e.to_string()))
}

pub fn encode(claims: &SessionClaims, secret: &[u8]) -> Result<String, JwtError> {
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| JwtError::Encode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(exp: i64) -> SessionClaims {
        SessionClaims {
            sub: "user_2x".into(),
            jti: "jti-1".into(),
            exp,
        }
    }

    #[test]
    fn round_trip() {
        let exp = chrono::Utc::now().timestamp() + 3600;
        let token = encode(&claims(exp), b"secret").unwrap();
        let decoded = decode_and_verify(&token, b"secret").unwrap();
        assert_eq!(decoded.sub, "user_2x");
        assert_eq!(decoded.jti, "jti-1");
        assert_eq!(decoded.exp, exp);
    }

    #[test]
    fn wrong_secret_rejected() {
        let exp = chrono::Utc::now().timestamp() + 3600;
        let token = encode(&claims(exp), b"secret").unwrap();
        assert!(decode_and_verify(&token, b"other").is_err());
    }

    #[test]
    fn expired_token_rejected() {
        let exp = chrono::Utc::now().timestamp() - 3600;
        let token = encode(&claims(exp), b"secret").unwrap();
        assert!(decode_and_verify(&token, b"secret").is_err());
    }
}
