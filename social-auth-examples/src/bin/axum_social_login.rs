//! # Axum Social Login Example
//!
//! Serves `/user/login` with "Log in with Drupal" and "Log in with Instagram"
//! links. Providers are configured from the environment (or a `.env` file):
//!
//! ```text
//! SOCIAL_AUTH_SITE_BASE_URL=http://localhost:3000
//! SOCIAL_AUTH_DRUPAL_CLIENT_ID=...
//! SOCIAL_AUTH_DRUPAL_CLIENT_SECRET=...
//! SOCIAL_AUTH_DRUPAL_BASE_URL=https://drupal.example
//! SOCIAL_AUTH_INSTAGRAM_CLIENT_ID=...
//! SOCIAL_AUTH_INSTAGRAM_CLIENT_SECRET=...
//! SOCIAL_AUTH_INSTAGRAM_API_CALLS=users/self/media/recent
//! ```
//!
//! A provider with incomplete settings still gets its routes; using them shows
//! the "not configured properly" message. Set `REDIS_URL` to keep session data
//! in Redis instead of memory.

use async_trait::async_trait;
use axum::{
    extract::State,
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use social_auth::axum::{
    take_flash, SocialAuthAxumExt, SocialAuthState, UserProvisioner, LOGIN_PATH,
};
use social_auth::flow::{SessionConfig, SocialAuth};
use social_auth::session::{MemoryStore, RedisStore, SessionDataStore};
use social_auth::{Network, NormalizedIdentity, SiteSettings};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tower_cookies::{CookieManagerLayer, Cookies};

/// Stand-in for the site's account system: remembers every identity it saw.
#[derive(Default)]
struct DemoProvisioner {
    accounts: RwLock<HashMap<(String, String), NormalizedIdentity>>,
}

#[async_trait]
impl UserProvisioner for DemoProvisioner {
    async fn authenticate_user(&self, identity: NormalizedIdentity) -> Response {
        let key = (identity.plugin_id(), identity.provider_user_id.clone());
        let known = match self.accounts.write() {
            Ok(mut accounts) => accounts.insert(key, identity.clone()).is_some(),
            Err(_) => false,
        };
        log::info!(
            "{} user {} logged in via {}",
            if known { "returning" } else { "new" },
            identity.provider_user_id,
            identity.plugin_id()
        );

        Html(format!(
            "<h1>Welcome, {}!</h1>\
             <p>Provider: {} (id {})</p>\
             <p>Email: {}</p>\
             <p>Extra data: <code>{}</code></p>\
             <a href=\"{LOGIN_PATH}\">Back</a>",
            escape(&identity.name),
            identity.provider_id,
            escape(&identity.provider_user_id),
            escape(identity.email.as_deref().unwrap_or("not shared")),
            escape(&identity.extra_json),
        ))
        .into_response()
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let site = SiteSettings::from_env();

    let session_store: Arc<dyn SessionDataStore> = match std::env::var("REDIS_URL") {
        Ok(redis_url) => {
            log::info!("Using RedisStore at {redis_url}");
            Arc::new(RedisStore::new(&redis_url)?)
        }
        Err(_) => {
            log::info!("Using MemoryStore");
            Arc::new(MemoryStore::default())
        }
    };

    let social_auth = Network::register_all_from_env(SocialAuth::builder(), &site)
        .session_store(session_store)
        .session_config(SessionConfig {
            secure: site.base_url.starts_with("https://"),
            ..Default::default()
        })
        .build();

    let state = SocialAuthState::new(social_auth.clone(), Arc::new(DemoProvisioner::default()));

    let app = Router::new()
        .route("/", get(|| async { axum::response::Redirect::to(LOGIN_PATH) }))
        .route(LOGIN_PATH, get(login_page))
        .merge(social_auth.axum_router())
        .layer(CookieManagerLayer::new())
        .with_state(state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    log::info!("Listening on {}", site.base_url);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn login_page(State(state): State<SocialAuthState>, cookies: Cookies) -> impl IntoResponse {
    let mut html = String::from("<h1>Log in</h1>");
    if let Some(message) = take_flash(&cookies) {
        html.push_str(&format!("<p style=\"color:#a00\">{}</p>", escape(&message)));
    }

    html.push_str("<ul>");
    for network in Network::ALL {
        html.push_str(&format!(
            "<li><a href=\"{LOGIN_PATH}/{}\">Log in with {}</a></li>",
            network.id(),
            state.social_auth.display_name(network.id()),
        ));
    }
    html.push_str("</ul>");
    Html(html)
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
