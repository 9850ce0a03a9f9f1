use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use cookie::time::Duration;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::{config::Config, error::AppError, service::policy::Actor, state::AppState};

pub const SESSION_COOKIE: &str = "sid";

#[derive(Serialize, ToSchema)]
pub struct CurrentUser {
    pub id: i64,
    pub email: String,
    pub name: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct MeResponse {
    pub id: i64,
    pub email: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub roles: Vec<String>,
}

impl From<&Actor> for CurrentUser {
    fn from(actor: &Actor) -> Self {
        Self {
            id: actor.user.id,
            email: actor.user.email.clone(),
            name: actor.user.name.clone(),
        }
    }
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/me", get(me))
        .with_state(state)
}

fn base_cookie(config: &Config, name: &'static str, value: String, max_age: i64) -> Cookie<'static> {
    let mut cookie = Cookie::new(name, value);
    cookie.set_http_only(true);
    cookie.set_path("/");
    cookie.set_same_site(SameSite::Lax);
    cookie.set_max_age(Duration::seconds(max_age));
    if config.cookie_secure {
        cookie.set_secure(true);
    }
    if let Some(domain) = &config.cookie_domain {
        cookie.set_domain(domain.to_string());
    }
    cookie
}

pub fn session_cookie(config: &Config, session_id: String) -> Cookie<'static> {
    base_cookie(
        config,
        SESSION_COOKIE,
        session_id,
        config.session_ttl_seconds as i64,
    )
}

pub fn short_lived_cookie(config: &Config, name: &'static str, value: String) -> Cookie<'static> {
    base_cookie(config, name, value, 600)
}

pub fn expired_cookie(config: &Config, name: &'static str) -> Cookie<'static> {
    base_cookie(config, name, String::new(), 0)
}

/// Resolves the signed-in user from the `sid` cookie.
pub async fn require_actor(state: &AppState, jar: &CookieJar) -> Result<Actor, AppError> {
    let Some(cookie) = jar.get(SESSION_COOKIE) else {
        return Err(AppError::Unauthenticated);
    };
    state.auth().current_actor(cookie.value()).await
}

#[utoipa::path(
    get,
    path = "/api/v1/me",
    responses(
        (status = 200, description = "Signed-in user", body = MeResponse),
        (status = 401, description = "No valid session", body = crate::error::ErrorResponse)
    ),
    tag = "session"
)]
pub async fn me(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let actor = require_actor(&state, &jar).await?;
    Ok(Json(MeResponse {
        id: actor.user.id,
        email: actor.user.email,
        name: actor.user.name,
        avatar_url: actor.user.avatar_url,
        roles: actor.roles,
    }))
}
