//! Drupal OAuth2 server provider.
//!
//! Talks to a remote Drupal site running an OAuth2 server module. The remote
//! site's base URL is mandatory; every endpoint hangs off it.

use async_trait::async_trait;
use social_auth_core::client::{
    authorization_url, build_http_client, exchange_authorization_code, get_json,
};
use social_auth_core::state::{json_id, json_str};
use social_auth_core::{
    AccessToken, AuthError, AuthorizationRequest, OAuthProvider, ProviderConfig, RemoteProfile,
    SiteSettings,
};

/// Provider identifier used in routes, settings and session keys.
pub const PROVIDER_ID: &str = "drupal";

const AUTHORIZE_PATH: &str = "/oauth2/authorize";
const TOKEN_PATH: &str = "/oauth2/token";
const USER_INFO_PATH: &str = "/oauth2/UserInfo";

/// Adapter for a remote Drupal OAuth2 server.
pub struct DrupalProvider {
    request: AuthorizationRequest,
    base_url: String,
    http_client: reqwest::Client,
}

impl DrupalProvider {
    /// Validate `config` and build the adapter.
    ///
    /// Fails with [`AuthError::NotConfigured`] when the client id, client
    /// secret or base URL is missing.
    pub fn new(config: &ProviderConfig, site: &SiteSettings) -> Result<Self, AuthError> {
        let request = AuthorizationRequest::from_config(PROVIDER_ID, config, site, true)?;
        let base_url = request
            .base_url
            .clone()
            .ok_or_else(|| AuthError::NotConfigured("Drupal base URL is missing".into()))?;
        let http_client = build_http_client(&request, site.timeout())?;
        log::debug!("[{PROVIDER_ID}] adapter ready for {base_url}");
        Ok(Self {
            request,
            base_url,
            http_client,
        })
    }

    /// The remote Drupal site.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Resolve an extra API resource: absolute URLs are used as-is, anything
    /// else is taken relative to the base URL.
    fn resource_url(&self, resource: &str) -> Result<String, AuthError> {
        if let Ok(url) = url::Url::parse(resource) {
            return Ok(url.to_string());
        }
        let base = url::Url::parse(&format!("{}/", self.base_url))
            .map_err(|e| AuthError::NotConfigured(format!("invalid base URL: {e}")))?;
        base.join(resource.trim_start_matches('/'))
            .map(|url| url.to_string())
            .map_err(|e| AuthError::ProfileUnavailable(format!("invalid resource {resource}: {e}")))
    }
}

/// Map the UserInfo response of a Drupal OAuth2 server.
fn profile_from_user_info(raw: serde_json::Value) -> Result<RemoteProfile, AuthError> {
    let provider_user_id = raw
        .get("sub")
        .and_then(json_id)
        .or_else(|| raw.get("id").and_then(json_id))
        .ok_or_else(|| AuthError::ProfileUnavailable("user info has no subject".into()))?;
    let display_name = json_str(&raw, "name")
        .or_else(|| json_str(&raw, "preferred_username"))
        .unwrap_or_else(|| provider_user_id.clone());

    Ok(RemoteProfile {
        provider_user_id,
        display_name,
        email: json_str(&raw, "email"),
        avatar_url: json_str(&raw, "picture"),
        extra: Default::default(),
        raw,
    })
}

#[async_trait]
impl OAuthProvider for DrupalProvider {
    fn provider_id(&self) -> &str {
        PROVIDER_ID
    }

    fn display_name(&self) -> &str {
        "Drupal"
    }

    fn get_authorization_url(&self, state: &str, scopes: &[&str]) -> String {
        authorization_url(
            &self.endpoint(AUTHORIZE_PATH),
            &self.request,
            state,
            scopes,
            " ",
        )
    }

    async fn exchange_code_for_token(&self, code: &str) -> Result<AccessToken, AuthError> {
        exchange_authorization_code(
            &self.http_client,
            &self.endpoint(TOKEN_PATH),
            &self.request,
            code,
        )
        .await
    }

    async fn fetch_profile(&self, token: &AccessToken) -> Result<RemoteProfile, AuthError> {
        let request = self
            .http_client
            .get(self.endpoint(USER_INFO_PATH))
            .bearer_auth(&token.access_token);
        let raw = get_json(request, "user info").await?;
        profile_from_user_info(raw)
    }

    async fn fetch_extra(
        &self,
        token: &AccessToken,
        resource: &str,
    ) -> Result<serde_json::Value, AuthError> {
        let url = self.resource_url(resource)?;
        let request = self.http_client.get(url).bearer_auth(&token.access_token);
        get_json(request, resource).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn provider() -> DrupalProvider {
        let config = ProviderConfig::new("abc", "xyz").with_base_url("https://idp.example/");
        DrupalProvider::new(&config, &SiteSettings::new("https://site.example")).unwrap()
    }

    #[test]
    fn authorization_url_points_at_remote_site() {
        let url = provider().get_authorization_url("st4te", &[]);
        assert!(url.starts_with("https://idp.example/oauth2/authorize?response_type=code"));
        assert!(url.contains("client_id=abc"));
        assert!(url.contains("state=st4te"));
        assert!(!url.contains("scope="));
    }

    #[test]
    fn missing_base_url_is_not_configured() {
        let config = ProviderConfig::new("abc", "xyz");
        let result = DrupalProvider::new(&config, &SiteSettings::default());
        assert!(matches!(result, Err(AuthError::NotConfigured(_))));
    }

    #[test]
    fn user_info_maps_numeric_subject() {
        let profile =
            profile_from_user_info(json!({ "sub": 42, "name": "Jane", "email": "jane@x.com" }))
                .unwrap();
        assert_eq!(profile.provider_user_id, "42");
        assert_eq!(profile.display_name, "Jane");
        assert_eq!(profile.email.as_deref(), Some("jane@x.com"));
        assert!(profile.avatar_url.is_none());
    }

    #[test]
    fn user_info_name_falls_back() {
        let profile =
            profile_from_user_info(json!({ "id": "7", "preferred_username": "jdoe" })).unwrap();
        assert_eq!(profile.display_name, "jdoe");
        let profile = profile_from_user_info(json!({ "sub": "7" })).unwrap();
        assert_eq!(profile.display_name, "7");
        assert!(profile_from_user_info(json!({ "name": "nobody" })).is_err());
    }

    #[test]
    fn extra_resources_resolve_against_base_url() {
        let provider = provider();
        assert_eq!(
            provider.resource_url("/jsonapi/user/user").unwrap(),
            "https://idp.example/jsonapi/user/user"
        );
        assert_eq!(
            provider.resource_url("https://other.example/api").unwrap(),
            "https://other.example/api"
        );
    }
}
