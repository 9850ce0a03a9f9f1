use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

use crate::{
    config::AppEnv, error::AppError, handler::session::session_cookie, state::AppState,
};

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/dev/godmode", get(godmode))
        .with_state(state)
}

/// Development-only shortcut that signs in without credentials.
async fn godmode(State(state): State<Arc<AppState>>, jar: CookieJar) -> Result<Response, AppError> {
    if state.config().values().app_env != AppEnv::Development {
        return Err(AppError::NotFound("route"));
    }

    let output = state.auth().godmode().await?;
    tracing::warn!(user_id = output.user.id, "godmode sign-in");
    let jar = jar.add(session_cookie(state.config().values(), output.session_id));
    Ok((jar, Redirect::to("/api/v1/dashboard")).into_response())
}
