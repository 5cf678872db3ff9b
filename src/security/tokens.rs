//! Signed, time-bounded credentials bound to a client fingerprint.
//!
//! Tokens are compact `header.claims.signature` strings (base64url, no
//! padding) signed with HMAC-SHA256 over the first two parts.
//!
//! # Design Decisions
//! - Validation is a pure function of token, request context, secret and clock
//! - Any failure is reported as a `TokenError`, never a panic
//! - IP and user-agent must equal the values captured at issuance; clients
//!   behind rotating NAT/proxies will see false negatives

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Duration;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;

use crate::clock::Clock;

type HmacSha256 = Hmac<Sha256>;

const HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub ip: String,
    pub ua: String,
    pub kind: TokenKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("signing key rejected")]
    InvalidKey,
    #[error("malformed token")]
    Malformed,
    #[error("signature mismatch")]
    BadSignature,
    #[error("unexpected token kind")]
    WrongKind,
    #[error("token expired")]
    Expired,
    #[error("client binding mismatch")]
    BindingMismatch,
}

/// Issues and validates access/refresh tokens.
#[derive(Clone)]
pub struct TokenService {
    mac: HmacSha256,
    access_ttl: Duration,
    refresh_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(
        secret: &[u8],
        access_ttl: Duration,
        refresh_ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, TokenError> {
        let mac = HmacSha256::new_from_slice(secret).map_err(|_| TokenError::InvalidKey)?;
        Ok(Self {
            mac,
            access_ttl,
            refresh_ttl,
            clock,
        })
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    pub fn issue_access(&self, subject: &str, ip: &str, user_agent: &str) -> String {
        self.issue(subject, ip, user_agent, TokenKind::Access, self.access_ttl)
    }

    pub fn issue_refresh(&self, subject: &str, ip: &str, user_agent: &str) -> String {
        self.issue(subject, ip, user_agent, TokenKind::Refresh, self.refresh_ttl)
    }

    fn issue(&self, subject: &str, ip: &str, user_agent: &str, kind: TokenKind, ttl: Duration) -> String {
        let now = self.clock.now().timestamp();
        let claims = Claims {
            sub: subject.to_string(),
            iat: now,
            exp: now.saturating_add(ttl.num_seconds()),
            ip: ip.to_string(),
            ua: user_agent.to_string(),
            kind,
        };
        // Claims is plain strings and integers; serialization cannot fail.
        let payload = serde_json::to_vec(&claims).unwrap_or_default();

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(HEADER),
            URL_SAFE_NO_PAD.encode(payload)
        );
        let signature = self.sign(signing_input.as_bytes());
        format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(signature))
    }

    fn sign(&self, input: &[u8]) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(input);
        mac.finalize().into_bytes().to_vec()
    }

    /// Check signature, kind, expiry and client binding, in that order.
    pub fn validate(
        &self,
        token: &str,
        ip: &str,
        user_agent: &str,
        expected: TokenKind,
    ) -> Result<Claims, TokenError> {
        let (signing_input, signature) = token.rsplit_once('.').ok_or(TokenError::Malformed)?;
        let (header, payload) = signing_input.split_once('.').ok_or(TokenError::Malformed)?;

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| TokenError::Malformed)?;
        let mut mac = self.mac.clone();
        mac.update(signing_input.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::BadSignature)?;

        let header = URL_SAFE_NO_PAD.decode(header).map_err(|_| TokenError::Malformed)?;
        if header != HEADER.as_bytes() {
            return Err(TokenError::Malformed);
        }

        let payload = URL_SAFE_NO_PAD.decode(payload).map_err(|_| TokenError::Malformed)?;
        let claims: Claims = serde_json::from_slice(&payload).map_err(|_| TokenError::Malformed)?;

        if claims.kind != expected {
            return Err(TokenError::WrongKind);
        }
        if self.clock.now().timestamp() >= claims.exp {
            return Err(TokenError::Expired);
        }
        if claims.ip != ip || claims.ua != user_agent {
            return Err(TokenError::BindingMismatch);
        }
        Ok(claims)
    }

    pub fn is_valid(&self, token: &str, ip: &str, user_agent: &str, expected: TokenKind) -> bool {
        self.validate(token, ip, user_agent, expected).is_ok()
    }
}
