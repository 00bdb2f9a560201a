use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use social_auth_axum::{
    take_flash, NormalizedIdentity, SocialAuth, SocialAuthAxumExt, SocialAuthState,
    UserProvisioner, LOGIN_PATH,
};
use social_auth_core::{AccessToken, AuthError, OAuthProvider, RemoteProfile};
use social_auth_flow::OAuth2Flow;
use social_auth_session::{MemoryStore, SessionDataStore};
use std::sync::Arc;
use tower::ServiceExt;
use tower_cookies::{CookieManagerLayer, Cookies};

struct FakeIdp;

#[async_trait]
impl OAuthProvider for FakeIdp {
    fn provider_id(&self) -> &str {
        "fake"
    }

    fn display_name(&self) -> &str {
        "Fake"
    }

    fn get_authorization_url(&self, state: &str, _scopes: &[&str]) -> String {
        format!("https://idp.example/authorize?client_id=abc&state={state}")
    }

    async fn exchange_code_for_token(&self, code: &str) -> Result<AccessToken, AuthError> {
        match code {
            "GOOD" => Ok(AccessToken::bearer("t0k3n")),
            _ => Err(AuthError::InvalidGrant("bad code".into())),
        }
    }

    async fn fetch_profile(&self, _token: &AccessToken) -> Result<RemoteProfile, AuthError> {
        Ok(RemoteProfile {
            provider_user_id: "42".into(),
            display_name: "Jane".into(),
            email: Some("jane@x.com".into()),
            avatar_url: None,
            extra: Default::default(),
            raw: serde_json::json!({}),
        })
    }
}

struct EchoProvisioner;

#[async_trait]
impl UserProvisioner for EchoProvisioner {
    async fn authenticate_user(&self, identity: NormalizedIdentity) -> Response {
        format!(
            "{} {} {} {}",
            identity.plugin_id(),
            identity.provider_user_id,
            identity.name,
            identity.email.unwrap_or_default()
        )
        .into_response()
    }
}

async fn login_page(cookies: Cookies) -> String {
    take_flash(&cookies).unwrap_or_default()
}

fn app() -> (Router, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::default());
    let social_auth = SocialAuth::builder()
        .provider(OAuth2Flow::new(FakeIdp))
        .unconfigured(
            "drupal",
            "Drupal",
            "Define Client ID, Client Secret and Base Url on module settings.",
        )
        .session_store(store.clone())
        .build();
    let state = SocialAuthState::new(social_auth.clone(), Arc::new(EchoProvisioner));

    let app = Router::new()
        .route(LOGIN_PATH, get(login_page))
        .merge(social_auth.axum_router())
        .layer(CookieManagerLayer::new())
        .with_state(state);
    (app, store)
}

fn get_request(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

/// `name=value` of the Set-Cookie header for `name`.
fn set_cookie(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(&format!("{name}=")))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

fn location(response: &Response) -> String {
    response.headers()[header::LOCATION]
        .to_str()
        .unwrap()
        .to_string()
}

fn flash(response: &Response) -> String {
    let cookie = set_cookie(response, "social_auth_flash").expect("flash cookie");
    let value = cookie.trim_start_matches("social_auth_flash=");
    urlencoding::decode(value).unwrap().into_owned()
}

async fn start_login(app: &Router) -> (String, String) {
    let response = app
        .clone()
        .oneshot(get_request("/user/login/fake", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let session_cookie = set_cookie(&response, "social_auth_session").expect("session cookie");
    let target = url::Url::parse(&location(&response)).unwrap();
    let state = target
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .unwrap();
    (session_cookie, state)
}

#[tokio::test]
async fn login_redirects_to_provider_and_stores_state() {
    let (app, store) = app();
    let (session_cookie, state) = start_login(&app).await;

    assert!(state.len() >= 16);
    let session_id = session_cookie.trim_start_matches("social_auth_session=");
    assert_eq!(
        store
            .get(session_id, "social_auth_fake_oauth2state")
            .await
            .unwrap(),
        Some(state)
    );
}

#[tokio::test]
async fn unconfigured_provider_redirects_to_login_with_flash() {
    let (app, _store) = app();
    let response = app
        .oneshot(get_request("/user/login/drupal", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), LOGIN_PATH);
    assert_eq!(
        flash(&response),
        "Social Auth Drupal not configured properly. Contact site administrator."
    );
}

#[tokio::test]
async fn unknown_provider_redirects_to_login() {
    let (app, _store) = app();
    let response = app
        .oneshot(get_request("/user/login/github", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), LOGIN_PATH);
}

#[tokio::test]
async fn callback_hands_identity_to_provisioning() {
    let (app, _store) = app();
    let (session_cookie, state) = start_login(&app).await;

    let response = app
        .oneshot(get_request(
            &format!("/user/login/fake/callback?code=GOOD&state={state}"),
            Some(&session_cookie),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"social_auth_fake 42 Jane jane@x.com");
}

#[tokio::test]
async fn declined_consent_keeps_state_and_flashes() {
    let (app, store) = app();
    let (session_cookie, state) = start_login(&app).await;

    let response = app
        .oneshot(get_request(
            "/user/login/fake/callback?error=access_denied",
            Some(&session_cookie),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), LOGIN_PATH);
    assert_eq!(flash(&response), "You could not be authenticated.");
    let session_id = session_cookie.trim_start_matches("social_auth_session=");
    assert_eq!(
        store
            .get(session_id, "social_auth_fake_oauth2state")
            .await
            .unwrap(),
        Some(state)
    );
}

#[tokio::test]
async fn forged_state_is_rejected() {
    let (app, _store) = app();
    let (session_cookie, _state) = start_login(&app).await;

    let response = app
        .oneshot(get_request(
            "/user/login/fake/callback?code=GOOD&state=forged",
            Some(&session_cookie),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(flash(&response), "Fake login failed. Invalid oAuth2 State.");
}

#[tokio::test]
async fn callback_from_another_browser_is_rejected() {
    let (app, _store) = app();
    let (_session_cookie, state) = start_login(&app).await;

    let response = app
        .oneshot(get_request(
            &format!("/user/login/fake/callback?code=GOOD&state={state}"),
            Some("social_auth_session=someone-else"),
        ))
        .await
        .unwrap();
    assert_eq!(flash(&response), "Fake login failed. Invalid oAuth2 State.");
}

#[tokio::test]
async fn login_page_consumes_flash() {
    let (app, _store) = app();
    let response = app
        .clone()
        .oneshot(get_request(
            "/user/login",
            Some("social_auth_flash=You%20could%20not%20be%20authenticated."),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let removal = set_cookie(&response, "social_auth_flash").expect("flash removal");
    assert_eq!(removal, "social_auth_flash=");
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"You could not be authenticated.");
}
