use axum::{extract::State, routing::get, Json, Router};
use axum_extra::extract::cookie::CookieJar;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::{
    error::AppError,
    handler::session::{require_actor, CurrentUser},
    service::policy::UserPolicy,
    state::AppState,
};

#[derive(Serialize, ToSchema)]
pub struct DashboardProps {
    pub current_user: CurrentUser,
    pub roles: Vec<String>,
    pub can_manage_users: bool,
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/dashboard", get(dashboard))
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/api/v1/dashboard",
    responses(
        (status = 200, description = "Dashboard props", body = DashboardProps),
        (status = 401, description = "No valid session", body = crate::error::ErrorResponse)
    ),
    tag = "dashboard"
)]
pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<Json<DashboardProps>, AppError> {
    let actor = require_actor(&state, &jar).await?;
    let can_manage_users = UserPolicy::new(&actor).index();
    Ok(Json(DashboardProps {
        current_user: CurrentUser::from(&actor),
        roles: actor.roles,
        can_manage_users,
    }))
}
