use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The token returned by a provider's token endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    /// The opaque access token.
    pub access_token: String,
    /// The token type, usually `Bearer`.
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Lifetime of the token in seconds, when the provider reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    /// Refresh token, when the provider issues one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Scopes granted by the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl AccessToken {
    /// Create a bearer token without expiry information.
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: default_token_type(),
            expires_in: None,
            refresh_token: None,
            scope: None,
        }
    }
}

/// Query parameters received on the callback route.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackQuery {
    /// The authorization code.
    pub code: Option<String>,
    /// The CSRF state echoed back by the provider.
    pub state: Option<String>,
    /// OAuth2 error code, e.g. `access_denied`.
    pub error: Option<String>,
    /// Human readable error description sent along with `error`.
    pub error_description: Option<String>,
}

impl CallbackQuery {
    /// A successful callback carrying `code` and `state`.
    pub fn success(code: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            state: Some(state.into()),
            ..Default::default()
        }
    }

    /// A callback carrying only an OAuth2 error code.
    pub fn error(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// The resource owner as reported by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteProfile {
    /// The user id at the provider.
    pub provider_user_id: String,
    /// The name to show for the user.
    pub display_name: String,
    /// Email address, if the provider shares it.
    pub email: Option<String>,
    /// Avatar image URL, if any.
    pub avatar_url: Option<String>,
    /// Extra API resources, keyed by the requested resource name.
    #[serde(default)]
    pub extra: BTreeMap<String, serde_json::Value>,
    /// The untouched resource-owner response.
    #[serde(default)]
    pub raw: serde_json::Value,
}

/// Provider-agnostic identity handed to user provisioning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedIdentity {
    /// The provider identifier, e.g. `drupal`.
    pub provider_id: String,
    /// The user id at the provider.
    pub provider_user_id: String,
    /// Display name.
    pub name: String,
    /// Email address, if known.
    pub email: Option<String>,
    /// The access token obtained during the login.
    pub access_token: AccessToken,
    /// Avatar image URL, if any.
    pub avatar_url: Option<String>,
    /// Extra API data serialized as a JSON object.
    pub extra_json: String,
}

impl NormalizedIdentity {
    /// Build the identity from a fetched profile and the token used to fetch it.
    pub fn from_profile(provider_id: &str, profile: RemoteProfile, token: AccessToken) -> Self {
        let extra_json = serde_json::to_string(&profile.extra).unwrap_or_else(|_| "{}".to_string());
        Self {
            provider_id: provider_id.to_string(),
            provider_user_id: profile.provider_user_id,
            name: profile.display_name,
            email: profile.email,
            access_token: token,
            avatar_url: profile.avatar_url,
            extra_json,
        }
    }

    /// The plugin-scoped id used by provisioning, e.g. `social_auth_drupal`.
    pub fn plugin_id(&self) -> String {
        format!("social_auth_{}", self.provider_id)
    }
}

/// Read an identifier that providers send either as a string or a number.
pub fn json_id(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Read a non-empty string field from a JSON object.
pub fn json_str(value: &serde_json::Value, field: &str) -> Option<String> {
    value
        .get(field)
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}
