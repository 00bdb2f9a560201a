use crate::error::AuthError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Prefix of every environment variable read by [`ProviderConfig::from_env`] and
/// [`SiteSettings::from_env`].
pub const ENV_PREFIX: &str = "SOCIAL_AUTH";

/// Settings of one provider, as stored by the host site.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// OAuth2 client id.
    #[serde(default)]
    pub client_id: String,
    /// OAuth2 client secret.
    #[serde(default)]
    pub client_secret: String,
    /// Base URL of the provider (mandatory for Drupal, a host override for Instagram).
    #[serde(default)]
    pub base_url: Option<String>,
    /// Extra API resources fetched after the profile.
    #[serde(default)]
    pub api_calls: Vec<String>,
    /// Scopes requested on the authorization URL. Empty means provider defaults.
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl ProviderConfig {
    /// Create a config from client credentials.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            ..Default::default()
        }
    }

    /// Set the provider base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the extra API resources fetched after the profile.
    pub fn with_api_calls<I, S>(mut self, api_calls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.api_calls = api_calls.into_iter().map(Into::into).collect();
        self
    }

    /// Set the scopes requested on the authorization URL.
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Load `SOCIAL_AUTH_{PROVIDER}_*` variables from the process environment.
    pub fn from_env(provider_id: &str) -> Self {
        Self::from_lookup(provider_id, |key| std::env::var(key).ok())
    }

    /// Load the provider settings through an arbitrary key lookup.
    ///
    /// Keys are `SOCIAL_AUTH_{PROVIDER}_CLIENT_ID`, `_CLIENT_SECRET`, `_BASE_URL`,
    /// `_API_CALLS` and `_SCOPES`; list values are comma separated.
    pub fn from_lookup<F>(provider_id: &str, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let key = |name: &str| {
            format!(
                "{ENV_PREFIX}_{}_{name}",
                provider_id.to_ascii_uppercase().replace('-', "_")
            )
        };
        Self {
            client_id: lookup(&key("CLIENT_ID")).unwrap_or_default(),
            client_secret: lookup(&key("CLIENT_SECRET")).unwrap_or_default(),
            base_url: lookup(&key("BASE_URL")).filter(|v| !v.trim().is_empty()),
            api_calls: lookup(&key("API_CALLS"))
                .map(|v| parse_list(&v))
                .unwrap_or_default(),
            scopes: lookup(&key("SCOPES"))
                .map(|v| parse_list(&v))
                .unwrap_or_default(),
        }
    }
}

/// Split a comma separated setting, dropping blanks.
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Settings of the host site shared by every provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteSettings {
    /// Absolute base URL of the site, used to derive callback URLs.
    pub base_url: String,
    /// Outbound HTTP proxy for calls to providers.
    #[serde(default)]
    pub proxy: Option<String>,
    /// Timeout for every outbound call, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            proxy: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl SiteSettings {
    /// Create settings for the site served at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Route provider calls through `proxy`.
    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    /// Load `SOCIAL_AUTH_SITE_BASE_URL`, `SOCIAL_AUTH_HTTP_PROXY` and
    /// `SOCIAL_AUTH_HTTP_TIMEOUT_SECS` from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load the site settings through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            base_url: lookup(&format!("{ENV_PREFIX}_SITE_BASE_URL"))
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.base_url),
            proxy: lookup(&format!("{ENV_PREFIX}_HTTP_PROXY")).filter(|v| !v.trim().is_empty()),
            timeout_secs: lookup(&format!("{ENV_PREFIX}_HTTP_TIMEOUT_SECS"))
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.timeout_secs),
        }
    }

    /// Timeout applied to outbound provider calls.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The callback URL registered at the provider, e.g.
    /// `https://example.com/user/login/drupal/callback`.
    pub fn redirect_uri(&self, provider_id: &str) -> String {
        format!(
            "{}/user/login/{provider_id}/callback",
            self.base_url.trim_end_matches('/')
        )
    }
}

/// Everything needed to talk to one provider, resolved once from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    /// OAuth2 client id.
    pub client_id: String,
    /// OAuth2 client secret.
    pub client_secret: String,
    /// Callback URL on this site.
    pub redirect_uri: String,
    /// Provider base URL, without trailing slash.
    pub base_url: Option<String>,
    /// Scopes requested on the authorization URL.
    pub scopes: Vec<String>,
    /// Outbound proxy.
    pub proxy: Option<url::Url>,
}

impl AuthorizationRequest {
    /// Validate `config` and resolve it against the site settings.
    ///
    /// Fails with [`AuthError::NotConfigured`] when the client id or secret is
    /// blank, when `require_base_url` is set and no valid base URL is given, or
    /// when the proxy URL cannot be parsed. Nothing touches the network here.
    pub fn from_config(
        provider_id: &str,
        config: &ProviderConfig,
        site: &SiteSettings,
        require_base_url: bool,
    ) -> Result<Self, AuthError> {
        let base_url = config
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(|u| u.trim_end_matches('/').to_string());

        let missing_base_url = require_base_url && base_url.is_none();
        if config.client_id.trim().is_empty()
            || config.client_secret.trim().is_empty()
            || missing_base_url
        {
            let message = if require_base_url {
                "Define Client ID, Client Secret and Base Url on module settings."
            } else {
                "Define Client ID and Client Secret on module settings."
            };
            log::error!("[{provider_id}] {message}");
            return Err(AuthError::NotConfigured(message.to_string()));
        }

        if let Some(base_url) = &base_url {
            if let Err(e) = url::Url::parse(base_url) {
                log::error!("[{provider_id}] Invalid base URL {base_url}: {e}");
                return Err(AuthError::NotConfigured(format!(
                    "invalid base URL {base_url}: {e}"
                )));
            }
        }

        let proxy = match site.proxy.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => Some(url::Url::parse(raw).map_err(|e| {
                log::error!("[{provider_id}] Invalid proxy URL {raw}: {e}");
                AuthError::NotConfigured(format!("invalid proxy URL {raw}: {e}"))
            })?),
            _ => None,
        };

        Ok(Self {
            client_id: config.client_id.trim().to_string(),
            client_secret: config.client_secret.trim().to_string(),
            redirect_uri: site.redirect_uri(provider_id),
            base_url,
            scopes: config.scopes.clone(),
            proxy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn provider_config_reads_prefixed_keys() {
        let config = ProviderConfig::from_lookup(
            "instagram",
            lookup(&[
                ("SOCIAL_AUTH_INSTAGRAM_CLIENT_ID", "abc"),
                ("SOCIAL_AUTH_INSTAGRAM_CLIENT_SECRET", "xyz"),
                ("SOCIAL_AUTH_INSTAGRAM_API_CALLS", "media, friends,,"),
            ]),
        );
        assert_eq!(config.client_id, "abc");
        assert_eq!(config.client_secret, "xyz");
        assert_eq!(config.api_calls, vec!["media", "friends"]);
        assert!(config.base_url.is_none());
        assert!(config.scopes.is_empty());
    }

    #[test]
    fn site_settings_fall_back_to_defaults() {
        let site = SiteSettings::from_lookup(lookup(&[("SOCIAL_AUTH_HTTP_TIMEOUT_SECS", "nope")]));
        assert_eq!(site, SiteSettings::default());
    }

    #[test]
    fn redirect_uri_uses_fixed_callback_path() {
        let site = SiteSettings::new("https://example.com/");
        assert_eq!(
            site.redirect_uri("drupal"),
            "https://example.com/user/login/drupal/callback"
        );
    }

    #[test]
    fn missing_base_url_is_not_configured_when_required() {
        let config = ProviderConfig::new("abc", "xyz");
        let site = SiteSettings::default();
        assert!(matches!(
            AuthorizationRequest::from_config("drupal", &config, &site, true),
            Err(AuthError::NotConfigured(_))
        ));
        assert!(AuthorizationRequest::from_config("instagram", &config, &site, false).is_ok());
    }

    #[test]
    fn blank_credentials_are_not_configured() {
        let site = SiteSettings::default();
        for config in [
            ProviderConfig::new("", "xyz"),
            ProviderConfig::new("abc", "  "),
        ] {
            let config = config.with_base_url("https://idp.example");
            assert!(matches!(
                AuthorizationRequest::from_config("drupal", &config, &site, true),
                Err(AuthError::NotConfigured(_))
            ));
        }
    }

    #[test]
    fn configured_request_resolves_proxy_and_base_url() {
        let config = ProviderConfig::new("abc", "xyz").with_base_url("https://idp.example/");
        let site = SiteSettings::new("https://site.example").with_proxy("http://proxy.local:3128");
        let request = AuthorizationRequest::from_config("drupal", &config, &site, true).unwrap();
        assert_eq!(request.base_url.as_deref(), Some("https://idp.example"));
        assert_eq!(
            request.proxy.as_ref().map(|u| u.as_str()),
            Some("http://proxy.local:3128/")
        );
        assert_eq!(
            request.redirect_uri,
            "https://site.example/user/login/drupal/callback"
        );
    }

    #[test]
    fn bad_proxy_is_not_configured() {
        let config = ProviderConfig::new("abc", "xyz");
        let site = SiteSettings::default().with_proxy("not a url");
        assert!(matches!(
            AuthorizationRequest::from_config("instagram", &config, &site, false),
            Err(AuthError::NotConfigured(_))
        ));
    }
}
