use crate::{BrowserSession, UserProvisioner};
use axum::{
    extract::{Path, Query, State},
    http::{header::SET_COOKIE, StatusCode},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use social_auth_core::{AuthError, CallbackQuery, SameSite};
use social_auth_flow::{SessionConfig, SessionDataHandler, SocialAuth};
use std::sync::Arc;
use tower_cookies::{Cookie, Cookies};

/// Login page every failed attempt is sent back to.
pub const LOGIN_PATH: &str = "/user/login";

/// Cookie carrying the one-shot error message shown on the login page.
pub const FLASH_COOKIE: &str = "social_auth_flash";

/// Errors raised by the login routes.
///
/// Login failures become a redirect to [`LOGIN_PATH`] with a flash message;
/// no internal detail reaches the browser.
#[derive(Debug, thiserror::Error)]
pub enum SocialAuthAxumError {
    /// A login attempt failed. `message` is safe to show to the user.
    #[error("login failed: {source}")]
    Login {
        /// User-facing flash message.
        message: String,
        /// The underlying error, kept for logging.
        #[source]
        source: AuthError,
    },
    /// Request plumbing failed (e.g. the cookie layer is missing).
    #[error("internal error: {0}")]
    Internal(String),
}

impl SocialAuthAxumError {
    /// Wrap a failed login of the provider shown as `label`.
    pub fn login(label: &str, source: AuthError) -> Self {
        Self::Login {
            message: flash_message(label, &source),
            source,
        }
    }
}

impl IntoResponse for SocialAuthAxumError {
    fn into_response(self) -> Response {
        match self {
            Self::Login { message, source } => {
                log::debug!("redirecting to {LOGIN_PATH} after: {source}");
                let cookie = flash_cookie(&message);
                (
                    AppendHeaders([(SET_COOKIE, cookie.to_string())]),
                    Redirect::to(LOGIN_PATH),
                )
                    .into_response()
            }
            Self::Internal(msg) => {
                log::error!("social auth route failed: {msg}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}

/// The user-visible message for a failed login with the provider shown as `label`.
pub fn flash_message(label: &str, err: &AuthError) -> String {
    match err {
        AuthError::NotConfigured(_) | AuthError::UnknownProvider(_) => {
            format!("Social Auth {label} not configured properly. Contact site administrator.")
        }
        AuthError::AccessDenied => "You could not be authenticated.".to_string(),
        AuthError::InvalidState => format!("{label} login failed. Invalid oAuth2 State."),
        AuthError::ExchangeFailed(_)
        | AuthError::ProviderUnavailable(_)
        | AuthError::InvalidGrant(_) => {
            format!("{label} login failed. Could not obtain an access token.")
        }
        AuthError::ProfileUnavailable(_) => format!(
            "{label} login failed, could not load {label} profile. Contact site administrator."
        ),
        AuthError::Session(_) => format!("{label} login failed. Contact site administrator."),
    }
}

fn flash_cookie(message: &str) -> Cookie<'static> {
    Cookie::build((FLASH_COOKIE, urlencoding::encode(message).into_owned()))
        .path("/")
        .http_only(true)
        .same_site(tower_cookies::cookie::SameSite::Lax)
        .build()
}

/// Queue `message` for the next page that calls [`take_flash`].
pub fn set_flash(cookies: &Cookies, message: &str) {
    cookies.add(flash_cookie(message));
}

/// Read and remove the pending flash message, if any.
pub fn take_flash(cookies: &Cookies) -> Option<String> {
    let cookie = cookies.get(FLASH_COOKIE)?;
    let message = urlencoding::decode(cookie.value())
        .map(|m| m.into_owned())
        .unwrap_or_else(|_| cookie.value().to_string());
    cookies.remove(Cookie::build(FLASH_COOKIE).path("/").build());
    Some(message).filter(|m| !m.is_empty())
}

fn cookie_same_site(same_site: SameSite) -> tower_cookies::cookie::SameSite {
    match same_site {
        SameSite::Lax => tower_cookies::cookie::SameSite::Lax,
        SameSite::Strict => tower_cookies::cookie::SameSite::Strict,
        SameSite::None => tower_cookies::cookie::SameSite::None,
    }
}

/// The browser-session id from the session cookie, issuing a new one when absent.
pub fn browser_session_id(cookies: &Cookies, config: &SessionConfig) -> String {
    if let Some(cookie) = cookies.get(&config.cookie_name) {
        if !cookie.value().is_empty() {
            return cookie.value().to_string();
        }
    }

    let session_id = uuid::Uuid::new_v4().to_string();
    let mut cookie = Cookie::build((config.cookie_name.clone(), session_id.clone()))
        .path(config.path.clone())
        .secure(config.secure)
        .http_only(config.http_only)
        .same_site(cookie_same_site(config.same_site))
        .build();
    if let Some(max_age) = config.max_age {
        cookie.set_max_age(tower_cookies::cookie::time::Duration::seconds(
            max_age.num_seconds(),
        ));
    }
    cookies.add(cookie);
    log::debug!("issued new browser session");
    session_id
}

/// Bind the registry's session store to the browser session of this request.
pub fn browser_session(social_auth: &SocialAuth, cookies: &Cookies) -> SessionDataHandler {
    let session_id = browser_session_id(cookies, &social_auth.session_config);
    social_auth.session_data(session_id)
}

/// `GET /user/login/{provider}`: store a fresh state and redirect to the provider.
pub async fn login_handler(
    State(social_auth): State<SocialAuth>,
    Path(provider): Path<String>,
    BrowserSession(session): BrowserSession,
) -> Result<Redirect, SocialAuthAxumError> {
    let label = social_auth.display_name(&provider);
    let flow = social_auth
        .flow(&provider)
        .map_err(|e| SocialAuthAxumError::login(&label, e))?;
    let target = flow
        .begin_login(&session)
        .await
        .map_err(|e| SocialAuthAxumError::login(&label, e))?;
    Ok(Redirect::to(&target.url))
}

/// `GET /user/login/{provider}/callback`: finish the login and hand the
/// identity to the provisioning service.
pub async fn callback_handler(
    State(social_auth): State<SocialAuth>,
    State(provisioner): State<Arc<dyn UserProvisioner>>,
    Path(provider): Path<String>,
    BrowserSession(session): BrowserSession,
    Query(query): Query<CallbackQuery>,
) -> Result<Response, SocialAuthAxumError> {
    let label = social_auth.display_name(&provider);
    let flow = social_auth
        .flow(&provider)
        .map_err(|e| SocialAuthAxumError::login(&label, e))?;
    let identity = flow
        .complete_login(&session, &query)
        .await
        .into_result()
        .map_err(|e| SocialAuthAxumError::login(&label, e))?;
    Ok(provisioner.authenticate_user(identity).await)
}
