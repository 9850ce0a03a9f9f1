use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::{
    error::{AppError, ErrorResponse},
    handler::session::{expired_cookie, session_cookie, SESSION_COOKIE},
    state::AppState,
};

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    pub id: i64,
    pub email: String,
    pub name: Option<String>,
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/auth/login", post(login))
        .route("/api/v1/auth/logout", post(logout))
        .with_state(state)
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Response, AppError> {
    let output = state.auth().login(&payload.email, &payload.password).await?;

    let jar = CookieJar::new().add(session_cookie(state.config().values(), output.session_id));
    let response = LoginResponse {
        id: output.user.id,
        email: output.user.email,
        name: output.user.name,
    };
    Ok((StatusCode::OK, jar, Json(response)).into_response())
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    responses(
        (status = 204, description = "Signed out"),
        (status = 500, description = "Session delete failed", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<Response, AppError> {
    let Some(cookie) = jar.get(SESSION_COOKIE) else {
        return Ok(StatusCode::NO_CONTENT.into_response());
    };

    state.auth().logout(cookie.value()).await?;

    let jar = jar.add(expired_cookie(state.config().values(), SESSION_COOKIE));
    Ok((StatusCode::NO_CONTENT, jar).into_response())
}
