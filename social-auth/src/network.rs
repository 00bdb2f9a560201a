use social_auth_core::{AuthError, ProviderConfig, SiteSettings};
use social_auth_flow::{ErasedOAuthFlow, SocialAuthBuilder};
use std::sync::Arc;

/// The social networks compiled into this build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Network {
    /// A remote Drupal site acting as OAuth2 server.
    #[cfg(feature = "drupal")]
    Drupal,
    /// Instagram.
    #[cfg(feature = "instagram")]
    Instagram,
}

impl Network {
    /// Every enabled network.
    pub const ALL: &'static [Network] = &[
        #[cfg(feature = "drupal")]
        Network::Drupal,
        #[cfg(feature = "instagram")]
        Network::Instagram,
    ];

    /// Identifier used in routes, settings and session keys.
    pub fn id(self) -> &'static str {
        match self {
            #[cfg(feature = "drupal")]
            Network::Drupal => social_auth_providers_drupal::PROVIDER_ID,
            #[cfg(feature = "instagram")]
            Network::Instagram => social_auth_providers_instagram::PROVIDER_ID,
        }
    }

    /// Name shown to users.
    pub fn label(self) -> &'static str {
        match self {
            #[cfg(feature = "drupal")]
            Network::Drupal => "Drupal",
            #[cfg(feature = "instagram")]
            Network::Instagram => "Instagram",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|n| n.id() == id)
    }

    /// Build the login flow of this network from its settings.
    pub fn build_flow(
        self,
        config: &ProviderConfig,
        site: &SiteSettings,
    ) -> Result<Arc<dyn ErasedOAuthFlow>, AuthError> {
        match self {
            #[cfg(feature = "drupal")]
            Network::Drupal => {
                let provider = social_auth_providers_drupal::DrupalProvider::new(config, site)?;
                Ok(Arc::new(
                    social_auth_flow::OAuth2Flow::new(provider)
                        .with_scopes(config.scopes.clone())
                        .with_api_calls(config.api_calls.clone()),
                ))
            }
            #[cfg(feature = "instagram")]
            Network::Instagram => {
                let provider =
                    social_auth_providers_instagram::InstagramProvider::new(config, site)?;
                Ok(Arc::new(
                    social_auth_flow::OAuth2Flow::new(provider)
                        .with_scopes(config.scopes.clone())
                        .with_api_calls(config.api_calls.clone()),
                ))
            }
        }
    }

    /// Add this network to `builder`.
    ///
    /// Incomplete settings do not abort startup: the network is registered as
    /// unconfigured and every login attempt reports it.
    pub fn register<S>(
        self,
        builder: SocialAuthBuilder<S>,
        config: &ProviderConfig,
        site: &SiteSettings,
    ) -> SocialAuthBuilder<S> {
        match self.build_flow(config, site) {
            Ok(flow) => {
                log::info!("[{}] provider registered", self.id());
                builder.erased_provider(flow)
            }
            Err(e) => {
                log::warn!("[{}] provider registered as unconfigured: {e}", self.id());
                let reason = match e {
                    AuthError::NotConfigured(reason) => reason,
                    other => other.to_string(),
                };
                builder.unconfigured(self.id(), self.label(), reason)
            }
        }
    }

    /// Register every enabled network with settings read through `lookup`.
    pub fn register_all<S, F>(
        mut builder: SocialAuthBuilder<S>,
        site: &SiteSettings,
        lookup: F,
    ) -> SocialAuthBuilder<S>
    where
        F: Fn(&str) -> Option<String>,
    {
        for network in Self::ALL {
            let config = ProviderConfig::from_lookup(network.id(), &lookup);
            builder = network.register(builder, &config, site);
        }
        builder
    }

    /// Register every enabled network with settings from the process environment.
    pub fn register_all_from_env<S>(
        builder: SocialAuthBuilder<S>,
        site: &SiteSettings,
    ) -> SocialAuthBuilder<S> {
        Self::register_all(builder, site, |key| std::env::var(key).ok())
    }
}
