//! Instagram provider.
//!
//! Signs every API call with the `access_token` query parameter and requests
//! the `basic` scope unless others are configured.

use async_trait::async_trait;
use serde::Deserialize;
use social_auth_core::client::{
    authorization_url, build_http_client, exchange_authorization_code, get_json,
};
use social_auth_core::{
    AccessToken, AuthError, AuthorizationRequest, OAuthProvider, ProviderConfig, RemoteProfile,
    SiteSettings,
};

/// Provider identifier used in routes, settings and session keys.
pub const PROVIDER_ID: &str = "instagram";

/// Instagram API host. A configured base URL replaces it.
pub const DEFAULT_HOST: &str = "https://api.instagram.com";

/// Scopes requested when none are configured.
pub const DEFAULT_SCOPES: [&str; 1] = ["basic"];

/// Adapter for the Instagram API.
pub struct InstagramProvider {
    request: AuthorizationRequest,
    host: String,
    http_client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct UserEnvelope {
    data: InstagramUser,
}

#[derive(Debug, Deserialize)]
struct InstagramUser {
    id: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    full_name: String,
    #[serde(default)]
    profile_picture: Option<String>,
}

impl InstagramProvider {
    /// Validate `config` and build the adapter.
    pub fn new(config: &ProviderConfig, site: &SiteSettings) -> Result<Self, AuthError> {
        let request = AuthorizationRequest::from_config(PROVIDER_ID, config, site, false)?;
        let host = request
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let http_client = build_http_client(&request, site.timeout())?;
        Ok(Self {
            request,
            host,
            http_client,
        })
    }

    /// Resolve an API resource against `{host}/v1/` and sign it with the token.
    fn resource_url(&self, resource: &str, token: &AccessToken) -> Result<url::Url, AuthError> {
        let mut url = match url::Url::parse(resource) {
            Ok(url) => url,
            Err(_) => url::Url::parse(&format!("{}/v1/", self.host))
                .and_then(|base| base.join(resource.trim_start_matches('/')))
                .map_err(|e| {
                    AuthError::ProfileUnavailable(format!("invalid resource {resource}: {e}"))
                })?,
        };
        if !url.query_pairs().any(|(key, _)| key == "access_token") {
            url.query_pairs_mut()
                .append_pair("access_token", &token.access_token);
        }
        Ok(url)
    }
}

fn profile_from_user(raw: serde_json::Value) -> Result<RemoteProfile, AuthError> {
    let envelope: UserEnvelope = serde_json::from_value(raw.clone())
        .map_err(|e| AuthError::ProfileUnavailable(format!("unexpected user payload: {e}")))?;
    let user = envelope.data;
    if user.id.is_empty() {
        return Err(AuthError::ProfileUnavailable("user payload has no id".into()));
    }
    let display_name = [user.full_name, user.username]
        .into_iter()
        .find(|name| !name.trim().is_empty())
        .unwrap_or_else(|| user.id.clone());

    Ok(RemoteProfile {
        provider_user_id: user.id,
        display_name,
        // Instagram never shares the email address.
        email: None,
        avatar_url: user.profile_picture.filter(|url| !url.is_empty()),
        extra: Default::default(),
        raw,
    })
}

#[async_trait]
impl OAuthProvider for InstagramProvider {
    fn provider_id(&self) -> &str {
        PROVIDER_ID
    }

    fn display_name(&self) -> &str {
        "Instagram"
    }

    fn default_scopes(&self) -> Vec<String> {
        DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect()
    }

    fn get_authorization_url(&self, state: &str, scopes: &[&str]) -> String {
        authorization_url(
            &format!("{}/oauth/authorize", self.host),
            &self.request,
            state,
            scopes,
            " ",
        )
    }

    async fn exchange_code_for_token(&self, code: &str) -> Result<AccessToken, AuthError> {
        exchange_authorization_code(
            &self.http_client,
            &format!("{}/oauth/access_token", self.host),
            &self.request,
            code,
        )
        .await
    }

    async fn fetch_profile(&self, token: &AccessToken) -> Result<RemoteProfile, AuthError> {
        let url = self.resource_url("users/self", token)?;
        let raw = get_json(self.http_client.get(url), "user").await?;
        profile_from_user(raw)
    }

    async fn fetch_extra(
        &self,
        token: &AccessToken,
        resource: &str,
    ) -> Result<serde_json::Value, AuthError> {
        let url = self.resource_url(resource, token)?;
        log::debug!("[{PROVIDER_ID}] fetching extra resource {}", url.path());
        get_json(self.http_client.get(url), resource).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn provider() -> InstagramProvider {
        InstagramProvider::new(
            &ProviderConfig::new("abc", "xyz"),
            &SiteSettings::new("https://site.example"),
        )
        .unwrap()
    }

    #[test]
    fn authorization_url_uses_public_host() {
        let url = provider().get_authorization_url("s", &["basic"]);
        assert!(url.starts_with("https://api.instagram.com/oauth/authorize?response_type=code"));
        assert!(url.contains("scope=basic"));
    }

    #[test]
    fn default_scope_is_basic() {
        assert_eq!(provider().default_scopes(), vec!["basic".to_string()]);
    }

    #[test]
    fn resources_are_signed_once() {
        let provider = provider();
        let token = AccessToken::bearer("t0k3n");
        assert_eq!(
            provider.resource_url("users/self/media/recent", &token).unwrap().as_str(),
            "https://api.instagram.com/v1/users/self/media/recent?access_token=t0k3n"
        );
        assert_eq!(
            provider
                .resource_url("https://api.instagram.com/v1/tags/rust?access_token=other", &token)
                .unwrap()
                .as_str(),
            "https://api.instagram.com/v1/tags/rust?access_token=other"
        );
    }

    #[test]
    fn profile_prefers_full_name() {
        let profile = profile_from_user(json!({
            "data": {
                "id": "1574083",
                "username": "snoopdogg",
                "full_name": "Snoop Dogg",
                "profile_picture": "https://cdn.example/snoop.jpg"
            }
        }))
        .unwrap();
        assert_eq!(profile.provider_user_id, "1574083");
        assert_eq!(profile.display_name, "Snoop Dogg");
        assert_eq!(profile.avatar_url.as_deref(), Some("https://cdn.example/snoop.jpg"));
        assert!(profile.email.is_none());

        let profile =
            profile_from_user(json!({ "data": { "id": "9", "username": "jd", "full_name": "" } }))
                .unwrap();
        assert_eq!(profile.display_name, "jd");
    }

    #[test]
    fn profile_without_data_is_unavailable() {
        let err = profile_from_user(json!({ "meta": { "code": 400 } })).unwrap_err();
        assert!(matches!(err, AuthError::ProfileUnavailable(_)));
    }
}
