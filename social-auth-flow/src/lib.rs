//! # Social Auth Flow
//!
//! `social-auth-flow` orchestrates the OAuth2 Authorization Code login: the redirect
//! phase, the callback phase with its CSRF check, and the hand-off of the normalized
//! identity. It sits between the provider adapters and the framework-specific routes.
//!
//! ## Key Components
//!
//! - **[`OAuth2Flow`]**: The login state machine for one provider.
//! - **[`SocialAuth`]**: The static provider registry plus the session store.
//! - **[`SocialAuthBuilder`]**: A builder for configuring and creating a [`SocialAuth`] instance.

#![warn(missing_docs)]

use async_trait::async_trait;
use social_auth_core::{AuthError, CallbackQuery, OAuthProvider};
pub use social_auth_session::{SessionConfig, SessionDataHandler, SessionDataStore};
use std::collections::HashMap;
use std::sync::Arc;

/// OAuth2 Authorization Code flow implementation.
pub mod oauth2;

pub use oauth2::{CallbackOutcome, FailureReason, FlowPhase, OAuth2Flow, RedirectTarget};

/// Object-safe view of a login flow, used by the provider registry.
#[async_trait]
pub trait ErasedOAuthFlow: Send + Sync {
    /// Get the provider identifier.
    fn provider_id(&self) -> String;
    /// Human readable provider name.
    fn display_name(&self) -> String;
    /// Generates the redirect target and stores its CSRF state.
    async fn begin_login(&self, session: &SessionDataHandler) -> Result<RedirectTarget, AuthError>;
    /// Completes the flow from the callback query.
    async fn complete_login(
        &self,
        session: &SessionDataHandler,
        query: &CallbackQuery,
    ) -> CallbackOutcome;
}

#[async_trait]
impl<T: ErasedOAuthFlow + ?Sized> ErasedOAuthFlow for Arc<T> {
    fn provider_id(&self) -> String {
        (**self).provider_id()
    }

    fn display_name(&self) -> String {
        (**self).display_name()
    }

    async fn begin_login(&self, session: &SessionDataHandler) -> Result<RedirectTarget, AuthError> {
        (**self).begin_login(session).await
    }

    async fn complete_login(
        &self,
        session: &SessionDataHandler,
        query: &CallbackQuery,
    ) -> CallbackOutcome {
        (**self).complete_login(session, query).await
    }
}

#[async_trait]
impl<T: ErasedOAuthFlow + ?Sized> ErasedOAuthFlow for Box<T> {
    fn provider_id(&self) -> String {
        (**self).provider_id()
    }

    fn display_name(&self) -> String {
        (**self).display_name()
    }

    async fn begin_login(&self, session: &SessionDataHandler) -> Result<RedirectTarget, AuthError> {
        (**self).begin_login(session).await
    }

    async fn complete_login(
        &self,
        session: &SessionDataHandler,
        query: &CallbackQuery,
    ) -> CallbackOutcome {
        (**self).complete_login(session, query).await
    }
}

/// Marker for a missing component in the typestate pattern.
#[derive(Clone, Default)]
pub struct Missing;

/// Marker for a configured component in the typestate pattern.
#[derive(Clone)]
pub struct Configured<T>(pub T);

/// A registered provider whose settings are incomplete.
#[derive(Debug, Clone)]
struct Unconfigured {
    display_name: String,
    reason: String,
}

/// The provider registry and session storage shared by all login routes.
#[derive(Clone)]
pub struct SocialAuth {
    /// Map of ready providers.
    pub providers: HashMap<String, Arc<dyn ErasedOAuthFlow>>,
    unconfigured: HashMap<String, Unconfigured>,
    /// The session storage backend.
    pub session_store: Arc<dyn SessionDataStore>,
    /// Configuration for the browser-session cookie.
    pub session_config: SessionConfig,
}

impl SocialAuth {
    /// Create a new [`SocialAuthBuilder`] to configure the service.
    pub fn builder() -> SocialAuthBuilder<Missing> {
        SocialAuthBuilder::default()
    }

    /// Resolve the flow registered under `provider_id`.
    ///
    /// Providers registered as unconfigured yield [`AuthError::NotConfigured`]
    /// without any network call.
    pub fn flow(&self, provider_id: &str) -> Result<Arc<dyn ErasedOAuthFlow>, AuthError> {
        if let Some(flow) = self.providers.get(provider_id) {
            return Ok(flow.clone());
        }
        match self.unconfigured.get(provider_id) {
            Some(entry) => {
                log::error!("[{provider_id}] provider not configured: {}", entry.reason);
                Err(AuthError::NotConfigured(entry.reason.clone()))
            }
            None => Err(AuthError::UnknownProvider(provider_id.to_string())),
        }
    }

    /// Human readable name of `provider_id`, also for unconfigured providers.
    pub fn display_name(&self, provider_id: &str) -> String {
        if let Some(flow) = self.providers.get(provider_id) {
            return flow.display_name();
        }
        if let Some(entry) = self.unconfigured.get(provider_id) {
            return entry.display_name.clone();
        }
        let mut chars = provider_id.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }

    /// Whether `provider_id` is known to the registry, configured or not.
    pub fn is_registered(&self, provider_id: &str) -> bool {
        self.providers.contains_key(provider_id) || self.unconfigured.contains_key(provider_id)
    }

    /// The session data of one browser session.
    pub fn session_data(&self, session_id: impl Into<String>) -> SessionDataHandler {
        SessionDataHandler::new(self.session_store.clone(), session_id)
    }
}

/// A builder for configuring and creating a [`SocialAuth`] instance.
pub struct SocialAuthBuilder<S> {
    providers: HashMap<String, Arc<dyn ErasedOAuthFlow>>,
    unconfigured: HashMap<String, Unconfigured>,
    session_store: S,
    session_config: SessionConfig,
}

impl Default for SocialAuthBuilder<Missing> {
    fn default() -> Self {
        Self {
            providers: HashMap::new(),
            unconfigured: HashMap::new(),
            session_store: Missing,
            session_config: SessionConfig::default(),
        }
    }
}

impl<S> SocialAuthBuilder<S> {
    /// Register an OAuth provider flow.
    pub fn provider<P>(self, flow: OAuth2Flow<P>) -> Self
    where
        P: OAuthProvider + 'static,
    {
        self.erased_provider(Arc::new(flow))
    }

    /// Register an already type-erased flow.
    pub fn erased_provider(mut self, flow: Arc<dyn ErasedOAuthFlow>) -> Self {
        let id = flow.provider_id();
        self.unconfigured.remove(&id);
        self.providers.insert(id, flow);
        self
    }

    /// Register a provider whose settings are incomplete.
    ///
    /// Login attempts for it fail with [`AuthError::NotConfigured`].
    pub fn unconfigured(
        mut self,
        provider_id: impl Into<String>,
        display_name: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        let id = provider_id.into();
        self.providers.remove(&id);
        self.unconfigured.insert(
            id,
            Unconfigured {
                display_name: display_name.into(),
                reason: reason.into(),
            },
        );
        self
    }

    /// Set the session configuration.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Set the session store.
    pub fn session_store(
        self,
        store: Arc<dyn SessionDataStore>,
    ) -> SocialAuthBuilder<Configured<Arc<dyn SessionDataStore>>> {
        SocialAuthBuilder {
            providers: self.providers,
            unconfigured: self.unconfigured,
            session_store: Configured(store),
            session_config: self.session_config,
        }
    }
}

impl SocialAuthBuilder<Configured<Arc<dyn SessionDataStore>>> {
    /// Build the [`SocialAuth`] instance.
    pub fn build(self) -> SocialAuth {
        SocialAuth {
            providers: self.providers,
            unconfigured: self.unconfigured,
            session_store: self.session_store.0,
            session_config: self.session_config,
        }
    }
}
