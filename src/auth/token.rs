//! Stateless bearer tokens.
//!
//! Tokens are compact JWS strings (`header.claims.signature`, base64url without
//! padding) signed with HMAC-SHA256 over the process-wide secret. The claim set
//! carries `username`, `role`, `iat`, `nbf` and `exp` as Unix seconds.

use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::Sha256;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

use super::models::Account;

type HmacSha256 = Hmac<Sha256>;

pub const TOKEN_ALGORITHM: &str = "HS256";
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("signing secret is not configured")]
    MissingSecret,
    #[error("invalid signing key")]
    Key,
    #[error("invalid token format")]
    TokenFormat,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlg(String),
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("token not yet valid")]
    NotYetValid,
    #[error("missing or invalid claim: {0}")]
    InvalidClaim(&'static str),
}

impl TokenError {
    /// Failures caused by the server configuration rather than the presented token.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::MissingSecret | Self::Key)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct TokenHeader {
    alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    typ: Option<String>,
}

impl TokenHeader {
    fn hs256() -> Self {
        Self {
            alg: TOKEN_ALGORITHM.to_string(),
            typ: Some("JWT".to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ClaimSet<'a> {
    username: &'a str,
    role: &'a str,
    iat: i64,
    nbf: i64,
    exp: i64,
}

/// Identity recovered from a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub username: String,
    pub role: String,
}

/// Issues and verifies tokens with a secret fixed at construction.
pub struct TokenService {
    secret: SecretString,
    ttl: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("secret", &"***")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl TokenService {
    #[must_use]
    pub fn new(secret: SecretString) -> Self {
        Self {
            secret,
            ttl: DEFAULT_TOKEN_TTL,
        }
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for `account`, valid from now until now + ttl.
    ///
    /// # Errors
    /// Returns `TokenError::MissingSecret` if the signing secret is empty.
    pub fn issue(&self, account: &Account) -> Result<String, TokenError> {
        self.issue_at(account, now_unix_seconds())
    }

    /// Issue a token as if the current time were `now`.
    ///
    /// # Errors
    /// Returns `TokenError::MissingSecret` if the signing secret is empty.
    pub fn issue_at(&self, account: &Account, now: i64) -> Result<String, TokenError> {
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = ClaimSet {
            username: &account.username,
            role: account.role.as_str(),
            iat: now,
            nbf: now,
            exp: now.saturating_add(ttl),
        };
        self.sign(&TokenHeader::hs256(), &claims)
    }

    /// Verify a token against the system clock.
    ///
    /// # Errors
    /// See [`TokenService::verify_at`].
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, now_unix_seconds())
    }

    /// Verify a token and return its identity claims.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - the token is not three base64url segments of valid JSON,
    /// - the header algorithm is anything but `HS256`,
    /// - the signature does not match,
    /// - `exp` is missing or not after `now`, or `nbf` is after `now`,
    /// - `username` or `role` is missing or not a string.
    pub fn verify_at(&self, token: &str, now: i64) -> Result<Claims, TokenError> {
        let mut parts = token.split('.');
        let header_b64 = parts.next().ok_or(TokenError::TokenFormat)?;
        let claims_b64 = parts.next().ok_or(TokenError::TokenFormat)?;
        let sig_b64 = parts.next().ok_or(TokenError::TokenFormat)?;
        if parts.next().is_some() {
            return Err(TokenError::TokenFormat);
        }

        // Algorithm is pinned before any key material is touched.
        let header: TokenHeader = b64d_json(header_b64)?;
        if header.alg != TOKEN_ALGORITHM {
            return Err(TokenError::UnsupportedAlg(header.alg));
        }

        let signature = Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| TokenError::Base64)?;
        let mut mac = self.mac()?;
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(claims_b64.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::InvalidSignature)?;

        let claims: Map<String, Value> = b64d_json(claims_b64)?;

        let exp = int_claim(&claims, "exp")?.ok_or(TokenError::InvalidClaim("exp"))?;
        if exp <= now {
            return Err(TokenError::Expired);
        }
        if let Some(nbf) = int_claim(&claims, "nbf")? {
            if nbf > now {
                return Err(TokenError::NotYetValid);
            }
        }

        Ok(Claims {
            username: string_claim(&claims, "username")?,
            role: string_claim(&claims, "role")?,
        })
    }

    fn mac(&self) -> Result<HmacSha256, TokenError> {
        let secret = self.secret.expose_secret();
        if secret.is_empty() {
            return Err(TokenError::MissingSecret);
        }
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| TokenError::Key)
    }

    fn sign<H: Serialize, C: Serialize>(&self, header: &H, claims: &C) -> Result<String, TokenError> {
        let mut mac = self.mac()?;
        let signing_input = format!("{}.{}", b64e_json(header)?, b64e_json(claims)?);
        mac.update(signing_input.as_bytes());
        let signature = Base64UrlUnpadded::encode_string(&mac.finalize().into_bytes());
        Ok(format!("{signing_input}.{signature}"))
    }
}

fn now_unix_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX)
        })
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, TokenError> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, TokenError> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| TokenError::Base64)?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn int_claim(claims: &Map<String, Value>, name: &'static str) -> Result<Option<i64>, TokenError> {
    match claims.get(name) {
        None => Ok(None),
        Some(value) => value
            .as_i64()
            .map(Some)
            .ok_or(TokenError::InvalidClaim(name)),
    }
}

fn string_claim(claims: &Map<String, Value>, name: &'static str) -> Result<String, TokenError> {
    claims
        .get(name)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(TokenError::InvalidClaim(name))
}
