use crate::config::AuthorizationRequest;
use crate::error::AuthError;
use crate::state::AccessToken;
use reqwest::header::ACCEPT;
use std::time::Duration;

/// Build the HTTP client used for every call to a provider.
///
/// Uses the configured proxy when there is one, otherwise connects directly
/// (ambient proxy environment variables are ignored).
pub fn build_http_client(
    request: &AuthorizationRequest,
    timeout: Duration,
) -> Result<reqwest::Client, AuthError> {
    let mut builder = reqwest::Client::builder().timeout(timeout);
    builder = match &request.proxy {
        Some(proxy) => builder.proxy(
            reqwest::Proxy::all(proxy.as_str())
                .map_err(|e| AuthError::NotConfigured(format!("invalid proxy: {e}")))?,
        ),
        None => builder.no_proxy(),
    };
    builder
        .build()
        .map_err(|e| AuthError::NotConfigured(format!("failed to build HTTP client: {e}")))
}

/// Append the standard authorization-code parameters to `endpoint`.
///
/// `scope` is joined with `separator` and left out when there are no scopes.
pub fn authorization_url(
    endpoint: &str,
    request: &AuthorizationRequest,
    state: &str,
    scopes: &[&str],
    separator: &str,
) -> String {
    let mut query = url::form_urlencoded::Serializer::new(String::new());
    query
        .append_pair("response_type", "code")
        .append_pair("client_id", &request.client_id)
        .append_pair("redirect_uri", &request.redirect_uri);
    if !scopes.is_empty() {
        query.append_pair("scope", &scopes.join(separator));
    }
    query.append_pair("state", state);

    let joiner = if endpoint.contains('?') { '&' } else { '?' };
    format!("{endpoint}{joiner}{}", query.finish())
}

/// Redeem an authorization code at `token_url`.
///
/// Transport failures map to [`AuthError::ProviderUnavailable`]; a non-2xx
/// status or a body without `access_token` maps to [`AuthError::InvalidGrant`].
pub async fn exchange_authorization_code(
    http_client: &reqwest::Client,
    token_url: &str,
    request: &AuthorizationRequest,
    code: &str,
) -> Result<AccessToken, AuthError> {
    let params = [
        ("grant_type", "authorization_code"),
        ("code", code),
        ("redirect_uri", request.redirect_uri.as_str()),
        ("client_id", request.client_id.as_str()),
        ("client_secret", request.client_secret.as_str()),
    ];

    let response = http_client
        .post(token_url)
        .header(ACCEPT, "application/json")
        .form(&params)
        .send()
        .await
        .map_err(|e| AuthError::ProviderUnavailable(format!("token request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AuthError::InvalidGrant(format!(
            "token endpoint returned {status}: {}",
            provider_error_message(&body)
        )));
    }

    let body: serde_json::Value = response
        .json()
        .await
        .map_err(|e| AuthError::InvalidGrant(format!("malformed token response: {e}")))?;

    serde_json::from_value::<AccessToken>(body)
        .ok()
        .filter(|token| !token.access_token.is_empty())
        .ok_or_else(|| AuthError::InvalidGrant("token response has no access_token".into()))
}

/// Send an authenticated GET and decode the JSON body.
///
/// Every failure is reported as [`AuthError::ProfileUnavailable`].
pub async fn get_json(
    request: reqwest::RequestBuilder,
    what: &str,
) -> Result<serde_json::Value, AuthError> {
    let response = request
        .header(ACCEPT, "application/json")
        .send()
        .await
        .map_err(|e| AuthError::ProfileUnavailable(format!("{what} request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AuthError::ProfileUnavailable(format!(
            "{what} returned {status}: {}",
            provider_error_message(&body)
        )));
    }

    response
        .json()
        .await
        .map_err(|e| AuthError::ProfileUnavailable(format!("malformed {what} response: {e}")))
}

/// Pull a readable message out of an OAuth2 (or Instagram `meta`) error body.
fn provider_error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return body.chars().take(200).collect();
    };
    let value = value.get("meta").unwrap_or(&value);
    let code = ["error", "error_type"]
        .iter()
        .find_map(|k| value.get(*k).and_then(|v| v.as_str()));
    let description = ["error_description", "error_message"]
        .iter()
        .find_map(|k| value.get(*k).and_then(|v| v.as_str()));
    match (code, description) {
        (Some(code), Some(description)) => format!("{code}: {description}"),
        (Some(code), None) => code.to_string(),
        (None, Some(description)) => description.to_string(),
        (None, None) => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ProviderConfig, SiteSettings};
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> AuthorizationRequest {
        let config = ProviderConfig::new("abc", "xyz");
        let site = SiteSettings::new("https://site.example");
        AuthorizationRequest::from_config("drupal", &config, &site, false).unwrap()
    }

    #[test]
    fn authorization_url_encodes_parameters() {
        let url = authorization_url(
            "https://idp.example/oauth2/authorize",
            &request(),
            "s t",
            &["basic", "public_content"],
            " ",
        );
        assert_eq!(
            url,
            "https://idp.example/oauth2/authorize?response_type=code&client_id=abc\
             &redirect_uri=https%3A%2F%2Fsite.example%2Fuser%2Flogin%2Fdrupal%2Fcallback\
             &scope=basic+public_content&state=s+t"
        );
    }

    #[test]
    fn authorization_url_omits_empty_scope() {
        let url = authorization_url("https://idp.example/auth?x=1", &request(), "s", &[], " ");
        assert!(url.starts_with("https://idp.example/auth?x=1&response_type=code"));
        assert!(!url.contains("scope="));
    }

    #[test]
    fn error_message_prefers_oauth_fields() {
        assert_eq!(
            provider_error_message(r#"{"error":"invalid_grant","error_description":"expired"}"#),
            "invalid_grant: expired"
        );
        assert_eq!(
            provider_error_message(
                r#"{"meta":{"error_type":"OAuthException","error_message":"bad code"}}"#
            ),
            "OAuthException: bad code"
        );
        assert_eq!(provider_error_message("gateway down"), "gateway down");
    }

    #[tokio::test]
    async fn exchange_posts_authorization_code_grant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=GOOD"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "t0k3n",
                "token_type": "Bearer",
                "expires_in": 300
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = build_http_client(&request(), Duration::from_secs(5)).unwrap();
        let token = exchange_authorization_code(
            &client,
            &format!("{}/oauth2/token", server.uri()),
            &request(),
            "GOOD",
        )
        .await
        .unwrap();
        assert_eq!(token.access_token, "t0k3n");
        assert_eq!(token.expires_in, Some(300));
    }

    #[tokio::test]
    async fn exchange_rejects_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant"
            })))
            .mount(&server)
            .await;

        let client = build_http_client(&request(), Duration::from_secs(5)).unwrap();
        let err = exchange_authorization_code(&client, &server.uri(), &request(), "BAD")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidGrant(msg) if msg.contains("invalid_grant")));
    }

    #[tokio::test]
    async fn exchange_rejects_body_without_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "token_type": "Bearer"
            })))
            .mount(&server)
            .await;

        let client = build_http_client(&request(), Duration::from_secs(5)).unwrap();
        let err = exchange_authorization_code(&client, &server.uri(), &request(), "GOOD")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidGrant(_)));
    }

    #[tokio::test]
    async fn unreachable_provider_is_unavailable() {
        let client = build_http_client(&request(), Duration::from_secs(1)).unwrap();
        let err = exchange_authorization_code(&client, "http://127.0.0.1:1/token", &request(), "X")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::ProviderUnavailable(_)));
    }
}
