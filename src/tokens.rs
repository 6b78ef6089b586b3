//! Token signing and verification capability.
//!
//! Handlers receive a `TokenService` by injection rather than reaching for a
//! global. [`StubTokens`] is the only implementation shipped: it returns
//! fixed values and performs no cryptography. A real signer can replace it
//! without touching the hook pipeline or the route table.

use serde::Serialize;
use thiserror::Error;

/// Claims recovered from a verified token.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct VerifiedToken {
    pub name: String,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token rejected: {0}")]
    Rejected(String),
}

pub trait TokenService: Send + Sync + 'static {
    fn sign(&self) -> String;
    fn verify(&self, token: &str) -> Result<VerifiedToken, TokenError>;
}

/// Constant-output placeholder.
#[derive(Clone, Copy, Debug, Default)]
pub struct StubTokens;

impl StubTokens {
    pub const TOKEN: &'static str = "signed-jwt";
    pub const SUBJECT: &'static str = "Tom";
}

impl TokenService for StubTokens {
    fn sign(&self) -> String {
        Self::TOKEN.to_owned()
    }

    fn verify(&self, _token: &str) -> Result<VerifiedToken, TokenError> {
        Ok(VerifiedToken { name: Self::SUBJECT.to_owned() })
    }
}
