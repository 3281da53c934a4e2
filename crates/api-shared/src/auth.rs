//! API key authentication.
//!
//! The expected key is resolved once at startup (usually from `API_KEY`) and handed to the
//! server as an [`ApiKey`]; request handlers only compare against it.

/// Errors raised while authenticating a request.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("API key not configured")]
    NotConfigured,
    #[error("missing API key")]
    Missing,
    #[error("invalid API key")]
    Invalid,
}

/// The server's configured API key, if any.
#[derive(Clone, Default)]
pub struct ApiKey(Option<String>);

impl ApiKey {
    /// Blank keys are treated as not configured.
    pub fn new(key: Option<String>) -> Self {
        Self(key.filter(|k| !k.trim().is_empty()))
    }

    pub fn is_configured(&self) -> bool {
        self.0.is_some()
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shown = if self.0.is_some() { "<redacted>" } else { "<unset>" };
        f.debug_tuple("ApiKey").field(&shown).finish()
    }
}

/// Validates the provided API key against the configured one.
///
/// Returns `Ok(())` if the key matches, or an error if the server has no key configured, the
/// request carried none, or the keys differ.
pub fn validate_api_key(expected: &ApiKey, provided: Option<&str>) -> Result<(), AuthError> {
    let expected = expected.0.as_deref().ok_or(AuthError::NotConfigured)?;
    let provided = provided.ok_or(AuthError::Missing)?;

    if provided == expected {
        Ok(())
    } else {
        Err(AuthError::Invalid)
    }
}
