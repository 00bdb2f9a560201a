use thiserror::Error;

/// Errors that can occur while running a social login.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The provider is missing client credentials or other mandatory settings.
    #[error("Provider not configured: {0}")]
    NotConfigured(String),
    /// The user declined consent at the provider.
    #[error("Access denied by the user")]
    AccessDenied,
    /// The callback `state` was missing or did not match the session.
    #[error("Invalid OAuth2 state")]
    InvalidState,
    /// The authorization code could not be exchanged for an access token.
    #[error("Code exchange failed: {0}")]
    ExchangeFailed(String),
    /// The remote profile (or an extra resource) could not be loaded.
    #[error("Profile unavailable: {0}")]
    ProfileUnavailable(String),
    /// The provider could not be reached.
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// The provider rejected the grant or answered with an unusable token.
    #[error("Invalid grant: {0}")]
    InvalidGrant(String),
    /// No provider is registered under the requested identifier.
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),
    /// The session data store failed.
    #[error("Session error: {0}")]
    Session(String),
}

impl AuthError {
    /// Whether an operator has to act on this error (bad configuration, forged callbacks).
    ///
    /// A user declining consent is an expected outcome and is not operator-actionable.
    pub fn is_operator_actionable(&self) -> bool {
        !matches!(self, AuthError::AccessDenied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_denied_is_not_operator_actionable() {
        assert!(!AuthError::AccessDenied.is_operator_actionable());
        assert!(AuthError::InvalidState.is_operator_actionable());
        assert!(AuthError::NotConfigured("client id".into()).is_operator_actionable());
    }

    #[test]
    fn messages_carry_details() {
        let err = AuthError::ExchangeFailed("400 Bad Request: invalid_grant".into());
        assert_eq!(
            err.to_string(),
            "Code exchange failed: 400 Bad Request: invalid_grant"
        );
    }
}
