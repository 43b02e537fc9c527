//! Bearer credential issue and verification (HS256 JWT).

use axum::http::HeaderValue;
use campus_core::principal::{Principal, Role};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
  Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

/// Claims carried by a Campus bearer token. Only `sub` is trusted downstream;
/// the role is re-read from the store on every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
  pub sub:  Uuid,
  pub role: Role,
  pub iat:  i64,
  pub exp:  i64,
}

/// A freshly minted token and its expiry.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
  pub token:      String,
  pub expires_at: DateTime<Utc>,
}

/// Signs and verifies bearer tokens with a server-held secret.
pub struct CredentialVerifier {
  encoding:   EncodingKey,
  decoding:   DecodingKey,
  validation: Validation,
  ttl:        Duration,
}

impl CredentialVerifier {
  pub fn new(secret: &[u8], ttl: Duration) -> Self {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    Self {
      encoding: EncodingKey::from_secret(secret),
      decoding: DecodingKey::from_secret(secret),
      validation,
      ttl,
    }
  }

  /// Verify an `Authorization` header value and return the principal id it
  /// names. Has no side effects.
  pub fn verify_header(&self, header: Option<&HeaderValue>) -> Result<Uuid, Error> {
    let raw = header
      .ok_or(Error::MissingCredential)?
      .to_str()
      .map_err(|_| Error::MissingCredential)?;
    self.verify(raw)
  }

  /// Verify raw `Authorization` header text (`Bearer <jwt>`).
  pub fn verify(&self, raw: &str) -> Result<Uuid, Error> {
    let token = raw
      .strip_prefix("Bearer ")
      .map(str::trim)
      .filter(|t| !t.is_empty())
      .ok_or(Error::MissingCredential)?;

    let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
      .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => Error::ExpiredCredential,
        _ => Error::InvalidCredential,
      })?;
    Ok(data.claims.sub)
  }

  /// Mint a token for `principal` valid from `now` for the configured TTL.
  pub fn issue(&self, principal: &Principal, now: DateTime<Utc>) -> Result<IssuedToken, Error> {
    let expires_at = now + self.ttl;
    let claims = Claims {
      sub:  principal.principal_id,
      role: principal.role,
      iat:  now.timestamp(),
      exp:  expires_at.timestamp(),
    };
    let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
      .map_err(|e| Error::Internal(format!("token encoding failed: {e}")))?;
    Ok(IssuedToken { token, expires_at })
  }
}
