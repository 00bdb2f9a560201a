//! # Social Auth Axum
//!
//! Axum routes for the social login flow:
//!
//! - `GET /user/login/{provider}` redirects to the provider.
//! - `GET /user/login/{provider}/callback` validates the callback and hands the
//!   identity to a [`UserProvisioner`].
//!
//! Failures redirect to [`LOGIN_PATH`] with a flash message. The routes need a
//! `tower_cookies::CookieManagerLayer` on the application.

use async_trait::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::response::Response;
pub use social_auth_core::NormalizedIdentity;
pub use social_auth_flow::{SessionConfig, SessionDataHandler, SocialAuth};
use std::sync::Arc;
use tower_cookies::Cookies;

pub mod helpers;

pub use helpers::*;

/// The host site's user-provisioning service.
///
/// Creates or loads the local account for `identity`, logs it in and returns
/// the response sent to the browser.
#[async_trait]
pub trait UserProvisioner: Send + Sync + 'static {
    /// Authenticate the user behind a completed social login.
    async fn authenticate_user(&self, identity: NormalizedIdentity) -> Response;
}

/// Application state holding everything the login routes need.
#[derive(Clone)]
pub struct SocialAuthState {
    pub social_auth: SocialAuth,
    pub provisioner: Arc<dyn UserProvisioner>,
}

impl SocialAuthState {
    pub fn new(social_auth: SocialAuth, provisioner: Arc<dyn UserProvisioner>) -> Self {
        Self {
            social_auth,
            provisioner,
        }
    }
}

impl FromRef<SocialAuthState> for SocialAuth {
    fn from_ref(state: &SocialAuthState) -> Self {
        state.social_auth.clone()
    }
}

impl FromRef<SocialAuthState> for Arc<dyn UserProvisioner> {
    fn from_ref(state: &SocialAuthState) -> Self {
        state.provisioner.clone()
    }
}

impl FromRef<SocialAuthState> for SessionConfig {
    fn from_ref(state: &SocialAuthState) -> Self {
        state.social_auth.session_config.clone()
    }
}

/// The extractor for the session data of the requesting browser.
///
/// Issues the browser-session cookie on first use.
pub struct BrowserSession(pub SessionDataHandler);

impl<S> FromRequestParts<S> for BrowserSession
where
    S: Send + Sync,
    SocialAuth: FromRef<S>,
{
    type Rejection = SocialAuthAxumError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        let social_auth = SocialAuth::from_ref(state);
        let cookies = Cookies::from_request_parts(parts, state)
            .await
            .map_err(|e| SocialAuthAxumError::Internal(e.1.to_string()))?;

        Ok(BrowserSession(helpers::browser_session(&social_auth, &cookies)))
    }
}

pub trait SocialAuthAxumExt {
    fn axum_router<S>(&self) -> axum::Router<S>
    where
        S: Clone + Send + Sync + 'static,
        SocialAuth: FromRef<S>,
        Arc<dyn UserProvisioner>: FromRef<S>;
}

impl SocialAuthAxumExt for SocialAuth {
    fn axum_router<S>(&self) -> axum::Router<S>
    where
        S: Clone + Send + Sync + 'static,
        SocialAuth: FromRef<S>,
        Arc<dyn UserProvisioner>: FromRef<S>,
    {
        use axum::routing::get;
        axum::Router::new()
            .route(
                &format!("{LOGIN_PATH}/{{provider}}"),
                get(helpers::login_handler),
            )
            .route(
                &format!("{LOGIN_PATH}/{{provider}}/callback"),
                get(helpers::callback_handler),
            )
    }
}
