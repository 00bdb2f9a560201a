use crate::ErasedOAuthFlow;
use async_trait::async_trait;
use serde::Serialize;
use social_auth_core::{
    csrf, AccessToken, AuthError, CallbackQuery, NormalizedIdentity, OAuthProvider,
};
use social_auth_session::{SessionDataHandler, ACCESS_TOKEN_KEY, OAUTH2_STATE_KEY};
use std::collections::BTreeMap;

/// Where to send the browser to start a login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedirectTarget {
    /// Absolute authorization URL at the provider.
    pub url: String,
    /// The CSRF state stored in the session for this attempt.
    pub state: String,
}

/// Why a login attempt ended in [`FlowPhase::Failed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureReason {
    /// The provider or adapter is not configured.
    NotConfigured,
    /// The user declined consent.
    AccessDenied,
    /// The callback state did not match the session.
    InvalidState,
    /// The code could not be exchanged for a token.
    ExchangeFailed,
    /// The profile could not be loaded.
    ProfileUnavailable,
    /// The session store failed.
    SessionUnavailable,
}

impl From<&AuthError> for FailureReason {
    fn from(err: &AuthError) -> Self {
        match err {
            AuthError::NotConfigured(_) | AuthError::UnknownProvider(_) => Self::NotConfigured,
            AuthError::AccessDenied => Self::AccessDenied,
            AuthError::InvalidState => Self::InvalidState,
            AuthError::ExchangeFailed(_)
            | AuthError::ProviderUnavailable(_)
            | AuthError::InvalidGrant(_) => Self::ExchangeFailed,
            AuthError::ProfileUnavailable(_) => Self::ProfileUnavailable,
            AuthError::Session(_) => Self::SessionUnavailable,
        }
    }
}

/// Phases of one login attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FlowPhase {
    /// Nothing started.
    Idle,
    /// Building the authorization URL and storing the state.
    Redirecting,
    /// The browser is at the provider.
    AwaitingCallback,
    /// Checking the callback against the session.
    Validating,
    /// Redeeming the authorization code.
    Exchanging,
    /// Loading the resource owner and extra data.
    FetchingProfile,
    /// The identity is ready for provisioning.
    Completed,
    /// The attempt ended with an error.
    Failed(FailureReason),
}

impl FlowPhase {
    /// Whether no further transition can happen.
    pub fn is_terminal(&self) -> bool {
        matches!(self, FlowPhase::Completed | FlowPhase::Failed(_))
    }
}

/// Result of the callback phase together with the phase it ended in.
#[derive(Debug)]
pub struct CallbackOutcome {
    /// Terminal phase: [`FlowPhase::Completed`] or [`FlowPhase::Failed`].
    pub phase: FlowPhase,
    /// The identity, or the error that ended the attempt.
    pub result: Result<NormalizedIdentity, AuthError>,
}

impl CallbackOutcome {
    /// Drop the phase and keep the result.
    pub fn into_result(self) -> Result<NormalizedIdentity, AuthError> {
        self.result
    }
}

struct PhaseTracker<'a> {
    provider_id: &'a str,
    phase: FlowPhase,
}

impl<'a> PhaseTracker<'a> {
    fn new(provider_id: &'a str, phase: FlowPhase) -> Self {
        Self { provider_id, phase }
    }

    fn advance(&mut self, next: FlowPhase) {
        log::debug!("[{}] {:?} -> {:?}", self.provider_id, self.phase, next);
        self.phase = next;
    }
}

/// Orchestrates the OAuth2 Authorization Code flow for one provider.
pub struct OAuth2Flow<P: OAuthProvider> {
    provider: P,
    scopes: Vec<String>,
    api_calls: Vec<String>,
}

impl<P: OAuthProvider> OAuth2Flow<P> {
    /// Create a new `OAuth2Flow` with the given provider.
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            scopes: Vec::new(),
            api_calls: Vec::new(),
        }
    }

    /// Set the scopes requested on the authorization URL.
    ///
    /// When empty, the provider's default scopes are used.
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
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

    /// The wrapped provider adapter.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    fn effective_scopes(&self) -> Vec<String> {
        if self.scopes.is_empty() {
            self.provider.default_scopes()
        } else {
            self.scopes.clone()
        }
    }

    /// Start a login: build the authorization URL and store its CSRF state.
    ///
    /// Calling this again for the same session replaces the pending state, so
    /// an older redirect still in flight will fail validation.
    pub async fn begin_login(
        &self,
        session: &SessionDataHandler,
    ) -> Result<RedirectTarget, AuthError> {
        let provider_id = self.provider.provider_id();
        let mut tracker = PhaseTracker::new(provider_id, FlowPhase::Idle);
        tracker.advance(FlowPhase::Redirecting);

        let session = session.for_provider(provider_id);
        let scopes = self.effective_scopes();
        let scopes: Vec<&str> = scopes.iter().map(String::as_str).collect();
        let (url, state) = self.provider.build_authorization_url(&scopes);

        session.set(OAUTH2_STATE_KEY, &state).await?;
        tracker.advance(FlowPhase::AwaitingCallback);

        Ok(RedirectTarget { url, state })
    }

    /// Complete a login from the callback query and report the terminal phase.
    ///
    /// Every failure except [`AuthError::AccessDenied`] nullifies the access
    /// token and state of this provider in the session.
    pub async fn complete_login(
        &self,
        session: &SessionDataHandler,
        query: &CallbackQuery,
    ) -> CallbackOutcome {
        let provider_id = self.provider.provider_id();
        let session = session.for_provider(provider_id);
        let mut tracker = PhaseTracker::new(provider_id, FlowPhase::AwaitingCallback);

        let result = self.run_callback(&session, query, &mut tracker).await;
        match result {
            Ok(identity) => {
                tracker.advance(FlowPhase::Completed);
                log::info!(
                    "[{provider_id}] login completed for remote user {}",
                    identity.provider_user_id
                );
                CallbackOutcome {
                    phase: tracker.phase,
                    result: Ok(identity),
                }
            }
            Err(err) => {
                self.on_failure(&session, &err).await;
                tracker.advance(FlowPhase::Failed(FailureReason::from(&err)));
                CallbackOutcome {
                    phase: tracker.phase,
                    result: Err(err),
                }
            }
        }
    }

    /// Complete a login from the callback query.
    pub async fn handle_callback(
        &self,
        session: &SessionDataHandler,
        query: &CallbackQuery,
    ) -> Result<NormalizedIdentity, AuthError> {
        self.complete_login(session, query).await.into_result()
    }

    async fn run_callback(
        &self,
        session: &SessionDataHandler,
        query: &CallbackQuery,
        tracker: &mut PhaseTracker<'_>,
    ) -> Result<NormalizedIdentity, AuthError> {
        let provider_id = self.provider.provider_id();
        tracker.advance(FlowPhase::Validating);

        if query.error.as_deref() == Some("access_denied") {
            return Err(AuthError::AccessDenied);
        }

        let expected = session.get(OAUTH2_STATE_KEY).await?;
        let received = query.state.as_deref().unwrap_or_default();
        match expected {
            Some(expected) if !received.is_empty() && csrf::states_match(&expected, received) => {}
            _ => return Err(AuthError::InvalidState),
        }
        // One state, one code redemption.
        session.clear(&[OAUTH2_STATE_KEY]).await?;

        if let Some(error) = query.error.as_deref() {
            let description = query.error_description.as_deref().unwrap_or("no description");
            return Err(AuthError::ExchangeFailed(format!(
                "provider returned {error}: {description}"
            )));
        }
        let code = query
            .code
            .as_deref()
            .filter(|code| !code.is_empty())
            .ok_or_else(|| AuthError::ExchangeFailed("missing authorization code".into()))?;

        tracker.advance(FlowPhase::Exchanging);
        let token = self
            .provider
            .exchange_code_for_token(code)
            .await
            .map_err(|e| match e {
                AuthError::ExchangeFailed(_) => e,
                other => AuthError::ExchangeFailed(other.to_string()),
            })?;

        let serialized = serde_json::to_string(&token)
            .map_err(|e| AuthError::Session(format!("failed to serialize token: {e}")))?;
        session.set(ACCESS_TOKEN_KEY, &serialized).await?;

        tracker.advance(FlowPhase::FetchingProfile);
        let mut profile = self
            .provider
            .fetch_profile(&token)
            .await
            .map_err(|e| match e {
                AuthError::ProfileUnavailable(_) => e,
                other => AuthError::ProfileUnavailable(other.to_string()),
            })?;
        profile.extra = self.fetch_extra_data(&token).await;
        log::debug!(
            "[{provider_id}] fetched profile {} with {} extra resource(s)",
            profile.provider_user_id,
            profile.extra.len()
        );

        Ok(NormalizedIdentity::from_profile(provider_id, profile, token))
    }

    /// Fetch every configured extra resource; failures are logged and left out.
    async fn fetch_extra_data(&self, token: &AccessToken) -> BTreeMap<String, serde_json::Value> {
        let mut extra = BTreeMap::new();
        for resource in self.api_calls.iter().map(|r| r.trim()).filter(|r| !r.is_empty()) {
            match self.provider.fetch_extra(token, resource).await {
                Ok(value) => {
                    extra.insert(resource.to_string(), value);
                }
                Err(e) => log::warn!(
                    "[{}] skipping extra resource {resource}: {e}",
                    self.provider.provider_id()
                ),
            }
        }
        extra
    }

    async fn on_failure(&self, session: &SessionDataHandler, err: &AuthError) {
        let provider_id = self.provider.provider_id();
        if !err.is_operator_actionable() {
            log::info!("[{provider_id}] user declined the authorization request");
            return;
        }

        log::error!("[{provider_id}] login failed: {err}");
        if let Err(e) = session.nullify_session_keys().await {
            log::warn!("[{provider_id}] could not clear session keys: {e}");
        }
    }

    /// The access token stored by the last successful exchange in this session.
    pub async fn stored_access_token(
        &self,
        session: &SessionDataHandler,
    ) -> Result<Option<AccessToken>, AuthError> {
        let session = session.for_provider(self.provider.provider_id());
        match session.get(ACCESS_TOKEN_KEY).await? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| AuthError::Session(format!("corrupt stored token: {e}"))),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl<P: OAuthProvider> ErasedOAuthFlow for OAuth2Flow<P> {
    fn provider_id(&self) -> String {
        self.provider.provider_id().to_string()
    }

    fn display_name(&self) -> String {
        self.provider.display_name().to_string()
    }

    async fn begin_login(&self, session: &SessionDataHandler) -> Result<RedirectTarget, AuthError> {
        OAuth2Flow::begin_login(self, session).await
    }

    async fn complete_login(
        &self,
        session: &SessionDataHandler,
        query: &CallbackQuery,
    ) -> CallbackOutcome {
        OAuth2Flow::complete_login(self, session, query).await
    }
}
