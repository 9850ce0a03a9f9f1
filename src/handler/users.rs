use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::{
    error::{AppError, ErrorResponse},
    handler::session::require_actor,
    service::{
        roles::RoleName,
        users::{CreateUserInput, UpdateUserInput, UserWithRoles},
    },
    state::AppState,
};

#[derive(Deserialize, ToSchema)]
pub struct CreateUserFields {
    pub name: Option<String>,
    pub email: String,
    pub password: Option<String>,
    /// Omit to leave roles untouched; an empty list removes every role.
    pub roles: Option<Vec<String>>,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateUser {
    pub user: CreateUserFields,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateUserFields {
    pub name: Option<String>,
    pub email: Option<String>,
    /// Omit to leave roles untouched; an empty list removes every role.
    pub roles: Option<Vec<String>>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateUser {
    pub user: UpdateUserFields,
}

#[derive(Serialize, ToSchema)]
pub struct UserJson {
    pub id: i64,
    pub name: Option<String>,
    pub email: String,
    pub avatar_url: Option<String>,
    pub created_at: String,
    pub roles: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl UserJson {
    pub fn summary(value: UserWithRoles) -> Self {
        let user = value.user;
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            avatar_url: user.avatar_url,
            created_at: user.created_at.to_rfc3339(),
            roles: value.roles,
            provider: None,
            updated_at: None,
        }
    }

    pub fn detailed(value: UserWithRoles) -> Self {
        let provider = value.user.provider.clone();
        let updated_at = value.user.updated_at.to_rfc3339();
        Self {
            provider,
            updated_at: Some(updated_at),
            ..Self::summary(value)
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct UsersIndex {
    pub users: Vec<UserJson>,
}

#[derive(Serialize, ToSchema)]
pub struct UserForm {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserJson>,
    pub roles: Vec<String>,
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/users", get(list_users).post(create_user))
        .route("/api/v1/users/new", get(new_user))
        .route(
            "/api/v1/users/:id",
            get(get_user).patch(update_user).delete(delete_user),
        )
        .route("/api/v1/users/:id/edit", get(edit_user))
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/api/v1/users",
    responses(
        (status = 200, description = "Users, newest first", body = UsersIndex),
        (status = 401, description = "No valid session", body = ErrorResponse),
        (status = 403, description = "Not an admin", body = ErrorResponse)
    ),
    tag = "users"
)]
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<Json<UsersIndex>, AppError> {
    let actor = require_actor(&state, &jar).await?;
    let users = state.users().list(&actor).await?;
    Ok(Json(UsersIndex {
        users: users.into_iter().map(UserJson::summary).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/new",
    responses(
        (status = 200, description = "Form props", body = UserForm),
        (status = 403, description = "Not an admin", body = ErrorResponse)
    ),
    tag = "users"
)]
pub async fn new_user(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<Json<UserForm>, AppError> {
    let actor = require_actor(&state, &jar).await?;
    state.users().authorize_create(&actor)?;
    Ok(Json(UserForm {
        user: None,
        roles: RoleName::available(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/v1/users",
    request_body = CreateUser,
    responses(
        (status = 201, description = "Created", body = UserJson),
        (status = 403, description = "Not an admin", body = ErrorResponse),
        (status = 422, description = "Validation failed", body = ErrorResponse)
    ),
    tag = "users"
)]
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(payload): Json<CreateUser>,
) -> Result<(StatusCode, Json<UserJson>), AppError> {
    let actor = require_actor(&state, &jar).await?;
    let fields = payload.user;
    let input = CreateUserInput {
        name: fields.name,
        email: fields.email,
        password: fields.password,
        roles: fields.roles,
    };

    let created = state.users().create(&actor, input).await?;
    Ok((StatusCode::CREATED, Json(UserJson::summary(created))))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    params(
        ("id" = i64, Path, description = "User id")
    ),
    responses(
        (status = 200, description = "User", body = UserJson),
        (status = 403, description = "Not permitted", body = ErrorResponse),
        (status = 404, description = "Not found", body = ErrorResponse)
    ),
    tag = "users"
)]
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(id): Path<i64>,
) -> Result<Json<UserJson>, AppError> {
    let actor = require_actor(&state, &jar).await?;
    let user = state.users().get(&actor, id).await?;
    Ok(Json(UserJson::detailed(user)))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{id}/edit",
    params(
        ("id" = i64, Path, description = "User id")
    ),
    responses(
        (status = 200, description = "Form props", body = UserForm),
        (status = 403, description = "Not permitted", body = ErrorResponse),
        (status = 404, description = "Not found", body = ErrorResponse)
    ),
    tag = "users"
)]
pub async fn edit_user(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(id): Path<i64>,
) -> Result<Json<UserForm>, AppError> {
    let actor = require_actor(&state, &jar).await?;
    let user = state.users().get(&actor, id).await?;
    Ok(Json(UserForm {
        user: Some(UserJson::detailed(user)),
        roles: RoleName::available(),
    }))
}

#[utoipa::path(
    patch,
    path = "/api/v1/users/{id}",
    request_body = UpdateUser,
    params(
        ("id" = i64, Path, description = "User id")
    ),
    responses(
        (status = 200, description = "Updated", body = UserJson),
        (status = 403, description = "Not permitted", body = ErrorResponse),
        (status = 404, description = "Not found", body = ErrorResponse),
        (status = 422, description = "Validation failed", body = ErrorResponse)
    ),
    tag = "users"
)]
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateUser>,
) -> Result<Json<UserJson>, AppError> {
    let actor = require_actor(&state, &jar).await?;
    let fields = payload.user;
    let input = UpdateUserInput {
        name: fields.name,
        email: fields.email,
        roles: fields.roles,
    };

    let updated = state.users().update(&actor, id, input).await?;
    Ok(Json(UserJson::detailed(updated)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/users/{id}",
    params(
        ("id" = i64, Path, description = "User id")
    ),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not permitted", body = ErrorResponse),
        (status = 404, description = "Not found", body = ErrorResponse)
    ),
    tag = "users"
)]
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let actor = require_actor(&state, &jar).await?;
    state.users().delete(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
