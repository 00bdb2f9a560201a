//! # Social Auth Core
//!
//! `social-auth-core` provides the foundational traits and types for the social-auth login framework.
//! It defines the provider adapter contract, the identities handed to user provisioning and the
//! error taxonomy shared by every other crate in the workspace.

#![warn(missing_docs)]

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Errors that can occur during a social login.
pub mod error;
pub use crate::error::AuthError;

/// Tokens, profiles and identities exchanged during a login.
pub mod state;
pub use crate::state::{AccessToken, CallbackQuery, NormalizedIdentity, RemoteProfile};

/// Provider and site configuration.
pub mod config;
pub use crate::config::{AuthorizationRequest, ProviderConfig, SiteSettings};

/// CSRF state generation and comparison.
pub mod csrf;

/// HTTP helpers shared by provider adapters.
pub mod client;

/// Controls whether a cookie is sent with cross-site requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SameSite {
    /// The cookie is sent with "safe" cross-site requests (e.g., following a link).
    Lax,
    /// The cookie is only sent for same-site requests.
    Strict,
    /// The cookie is sent with all requests, including cross-site. Requires `Secure`.
    None,
}

/// Trait for an OAuth2 provider adapter (one per identity provider).
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Get the provider identifier, e.g. `drupal`.
    fn provider_id(&self) -> &str;

    /// Human readable provider name used in user-facing messages.
    fn display_name(&self) -> &str;

    /// Scopes requested when the flow does not configure any.
    fn default_scopes(&self) -> Vec<String> {
        Vec::new()
    }

    /// Build the authorization endpoint URL for the given CSRF state.
    fn get_authorization_url(&self, state: &str, scopes: &[&str]) -> String;

    /// Build the authorization URL together with a freshly generated CSRF state.
    ///
    /// The caller is responsible for persisting the returned state.
    fn build_authorization_url(&self, scopes: &[&str]) -> (String, String) {
        let state = csrf::generate_state();
        let url = self.get_authorization_url(&state, scopes);
        (url, state)
    }

    /// Redeem an authorization code for an access token.
    async fn exchange_code_for_token(&self, code: &str) -> Result<AccessToken, AuthError>;

    /// Load the resource owner behind `token`.
    async fn fetch_profile(&self, token: &AccessToken) -> Result<RemoteProfile, AuthError>;

    /// Load one extra API resource on behalf of the user.
    async fn fetch_extra(
        &self,
        _token: &AccessToken,
        resource: &str,
    ) -> Result<serde_json::Value, AuthError> {
        Err(AuthError::ProfileUnavailable(format!(
            "{} does not expose extra resources ({resource})",
            self.provider_id()
        )))
    }
}
