//! Authorization collaborator
//!
//! Concrete strategies (basic, OAuth single sign-on) live outside this
//! workspace; only the no-auth and pre-computed header cases are provided.

use crate::{AnalyserError, Result};

/// Supplies the `Authorization` header value for outgoing requests
pub trait AuthorizationProvider: Send + Sync {
    /// Whether a header must be present for every request
    fn required(&self) -> bool;

    /// Header value, or `None` when no authorization applies
    fn authorization(&self) -> Result<Option<String>>;
}

/// No authorization at all
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuthorization;

impl AuthorizationProvider for NoAuthorization {
    fn required(&self) -> bool {
        false
    }

    fn authorization(&self) -> Result<Option<String>> {
        Ok(None)
    }
}

/// A header value computed ahead of time (e.g. `Bearer <token>`)
#[derive(Clone)]
pub struct StaticAuthorization {
    value: String,
}

impl StaticAuthorization {
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AnalyserError::Authorization(
                "authorization value is empty".to_string(),
            ));
        }
        Ok(Self { value })
    }
}

impl std::fmt::Debug for StaticAuthorization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticAuthorization")
            .field("value", &"[REDACTED]")
            .finish()
    }
}

impl AuthorizationProvider for StaticAuthorization {
    fn required(&self) -> bool {
        true
    }

    fn authorization(&self) -> Result<Option<String>> {
        Ok(Some(self.value.clone()))
    }
}
