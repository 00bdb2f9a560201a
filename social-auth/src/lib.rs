//! # Social Auth
//!
//! Log users in through a remote Drupal site or Instagram using the OAuth2
//! authorization code flow. This crate re-exports the workspace crates behind
//! cargo features:
//!
//! | Feature | Enables |
//! |---|---|
//! | `flow` | [`flow`]: the login state machine and the provider registry |
//! | `session` | [`session`]: session data stores |
//! | `store-redis` | the Redis session data store |
//! | `axum` | [`axum`]: the `/user/login/{provider}` routes |
//! | `drupal` | [`drupal`]: the Drupal provider adapter |
//! | `instagram` | [`instagram`]: the Instagram provider adapter |

pub use social_auth_core as core;
pub use social_auth_core::{
    AccessToken, AuthError, CallbackQuery, NormalizedIdentity, OAuthProvider, ProviderConfig,
    RemoteProfile, SiteSettings,
};

#[cfg(feature = "flow")]
pub mod flow {
    pub use social_auth_flow::*;
}

#[cfg(feature = "session")]
pub mod session {
    pub use social_auth_session::*;
}

#[cfg(feature = "axum")]
pub mod axum {
    pub use social_auth_axum::*;
}

#[cfg(feature = "drupal")]
pub mod drupal {
    pub use social_auth_providers_drupal::*;
}

#[cfg(feature = "instagram")]
pub mod instagram {
    pub use social_auth_providers_instagram::*;
}

#[cfg(feature = "flow")]
mod network;

#[cfg(feature = "flow")]
pub use network::Network;
