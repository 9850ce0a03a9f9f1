use utoipa::OpenApi;

use crate::{
    error::ErrorResponse,
    handler::{
        self,
        auth::password::{LoginRequest, LoginResponse},
        dashboard::DashboardProps,
        health::Health,
        session::{CurrentUser, MeResponse},
        users::{
            CreateUser, CreateUserFields, UpdateUser, UpdateUserFields, UserForm, UserJson,
            UsersIndex,
        },
    },
};

#[derive(OpenApi)]
#[openapi(
    paths(
        handler::health::health,
        handler::auth::password::login,
        handler::auth::password::logout,
        handler::session::me,
        handler::dashboard::dashboard,
        handler::users::list_users,
        handler::users::new_user,
        handler::users::create_user,
        handler::users::get_user,
        handler::users::edit_user,
        handler::users::update_user,
        handler::users::delete_user
    ),
    components(schemas(
        Health,
        ErrorResponse,
        LoginRequest,
        LoginResponse,
        CurrentUser,
        MeResponse,
        DashboardProps,
        CreateUser,
        CreateUserFields,
        UpdateUser,
        UpdateUserFields,
        UserJson,
        UsersIndex,
        UserForm
    )),
    tags(
        (name = "health", description = "Health check"),
        (name = "auth", description = "Sign in and out"),
        (name = "session", description = "Current user"),
        (name = "dashboard", description = "Dashboard"),
        (name = "users", description = "User administration")
    )
)]
pub struct ApiDoc;
