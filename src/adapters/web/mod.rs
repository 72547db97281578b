//! Web server adapter.
//!
//! JSON API over axum. Sessions are kept in memory behind signed cookies
//! and every route that touches user-owned data requires a login.

mod auth;
mod error;
mod handlers;

pub use auth::{AuthSession, Backend, Credentials, SessionUser};
pub use error::WebError;

use axum::{
    Router,
    routing::{get, post},
};
use axum_login::{AuthManagerLayerBuilder, login_required};
use std::sync::Arc;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer, cookie::Key};

use crate::domain::settings::Settings;
use crate::ports::Store;

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub settings: Settings,
}

pub fn build_router(state: AppState) -> Router {
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(state.settings.secure_cookies)
        .with_expiry(Expiry::OnInactivity(time::Duration::seconds(
            state.settings.session_lifetime,
        )))
        .with_signed(session_key(state.settings.session_secret.as_deref()));
    let auth_layer =
        AuthManagerLayerBuilder::new(Backend::new(state.store.clone()), session_layer).build();

    let protected = Router::new()
        .route("/dashboard", get(handlers::account::dashboard))
        .route(
            "/profile/settings",
            get(handlers::account::profile).post(handlers::account::update_profile),
        )
        .route("/leaderboard", get(handlers::account::leaderboard))
        .route("/api/user/stats", get(handlers::account::user_stats))
        .route("/learn", get(handlers::learn::modules))
        .route("/learn/module/{id}", get(handlers::learn::module))
        .route(
            "/learn/module/{id}/complete",
            post(handlers::learn::complete_module),
        )
        .route("/learn/module/{id}/quiz", post(handlers::learn::submit_quiz))
        .route("/fraud", get(handlers::learn::scenarios))
        .route(
            "/fraud/scenario/{id}",
            get(handlers::learn::scenario).post(handlers::learn::submit_response),
        )
        .route("/portfolio", get(handlers::portfolio::portfolio))
        .route("/portfolio/stocks", get(handlers::portfolio::stocks))
        .route(
            "/portfolio/trade/{stock_id}",
            post(handlers::portfolio::trade),
        )
        .route("/api/stock/{id}/price", get(handlers::portfolio::stock_price))
        .route(
            "/api/portfolio/summary",
            get(handlers::portfolio::portfolio_summary),
        )
        .route(
            "/budget",
            get(handlers::budget::budgets).post(handlers::budget::create_budget),
        )
        .route("/budget/analysis", get(handlers::budget::analysis))
        .route(
            "/expenses",
            get(handlers::budget::expenses).post(handlers::budget::add_expense),
        )
        .route("/expenses/predictor", get(handlers::budget::predictor))
        .route(
            "/goals",
            get(handlers::goals::goals).post(handlers::goals::create_goal),
        )
        .route("/goals/{id}/contribute", post(handlers::goals::contribute))
        .route("/tokens", get(handlers::rewards::tokens))
        .route("/tokens/packages", get(handlers::rewards::packages))
        .route("/tokens/purchase", post(handlers::rewards::purchase_package))
        .route("/coupons", get(handlers::rewards::coupons))
        .route("/coupons/mine", get(handlers::rewards::my_coupons))
        .route("/coupons/purchase", post(handlers::rewards::purchase_coupon))
        .route("/coupons/{id}/redeem", post(handlers::rewards::redeem_coupon))
        .route_layer(login_required!(Backend));

    Router::new()
        .route("/", get(handlers::account::index))
        .route("/register", post(handlers::account::register))
        .route("/login", post(handlers::account::login))
        .route("/logout", post(handlers::account::logout))
        .merge(protected)
        .fallback(handlers::not_found)
        .layer(auth_layer)
        .with_state(Arc::new(state))
}

/// Signing key for session cookies. Settings validation guarantees the hex
/// length, so the random fallback only covers an absent secret.
fn session_key(secret: Option<&str>) -> Key {
    let decoded = secret.map(|s| hex::decode(s).map(|bytes| Key::try_from(bytes.as_slice())));
    match decoded {
        Some(Ok(Ok(key))) => key,
        Some(_) => {
            eprintln!("Warning: session_secret is not a usable key, using a random one");
            Key::generate()
        }
        None => {
            eprintln!("No session_secret configured, using a random signing key");
            Key::generate()
        }
    }
}
