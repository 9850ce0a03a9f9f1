use async_trait::async_trait;
use sea_orm::Set;
use std::sync::Arc;

use crate::{
    entities::users,
    error::{AppError, FieldErrors},
    repo::{
        roles::RolesRepo,
        users::{normalize_email, UsersRepo},
    },
    service::{
        credentials::CredentialHasher,
        policy::{authorize, Actor, UserPolicy, UserScope},
        roles::{requested_roles, RoleReconciler},
        secret::random_hex,
    },
};

const PASSWORD_MIN: usize = 6;
const PASSWORD_MAX: usize = 128;

#[derive(Clone, Debug)]
pub struct UserWithRoles {
    pub user: users::Model,
    pub roles: Vec<String>,
}

pub struct CreateUserInput {
    pub name: Option<String>,
    pub email: String,
    pub password: Option<String>,
    pub roles: Option<Vec<String>>,
}

pub struct UpdateUserInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub roles: Option<Vec<String>>,
}

#[async_trait]
pub trait UsersService: Send + Sync {
    async fn list(&self, actor: &Actor) -> Result<Vec<UserWithRoles>, AppError>;
    async fn get(&self, actor: &Actor, id: i64) -> Result<UserWithRoles, AppError>;
    async fn create(&self, actor: &Actor, input: CreateUserInput)
        -> Result<UserWithRoles, AppError>;
    async fn update(
        &self,
        actor: &Actor,
        id: i64,
        input: UpdateUserInput,
    ) -> Result<UserWithRoles, AppError>;
    async fn delete(&self, actor: &Actor, id: i64) -> Result<(), AppError>;
    fn authorize_create(&self, actor: &Actor) -> Result<(), AppError>;
}

pub struct UsersServiceImpl {
    users_repo: Arc<dyn UsersRepo>,
    roles_repo: Arc<dyn RolesRepo>,
    reconciler: Arc<dyn RoleReconciler>,
    hasher: Arc<dyn CredentialHasher>,
}

impl UsersServiceImpl {
    pub fn new(
        users_repo: Arc<dyn UsersRepo>,
        roles_repo: Arc<dyn RolesRepo>,
        reconciler: Arc<dyn RoleReconciler>,
        hasher: Arc<dyn CredentialHasher>,
    ) -> Self {
        Self {
            users_repo,
            roles_repo,
            reconciler,
            hasher,
        }
    }

    fn email_is_well_formed(email: &str) -> bool {
        let Some((local, domain)) = email.split_once('@') else {
            return false;
        };
        !local.is_empty()
            && !domain.is_empty()
            && !domain.contains('@')
            && !email.chars().any(char::is_whitespace)
    }

    async fn validate_email(
        &self,
        email: &str,
        current_id: Option<i64>,
        errors: &mut FieldErrors,
    ) -> Result<(), AppError> {
        if email.is_empty() {
            errors
                .entry("email".to_string())
                .or_default()
                .push("can't be blank".to_string());
            return Ok(());
        }
        if !Self::email_is_well_formed(email) {
            errors
                .entry("email".to_string())
                .or_default()
                .push("is invalid".to_string());
            return Ok(());
        }
        if let Some(existing) = self.users_repo.find_by_email(email).await? {
            if Some(existing.id) != current_id {
                errors
                    .entry("email".to_string())
                    .or_default()
                    .push("has already been taken".to_string());
            }
        }
        Ok(())
    }

    fn validate_password(password: &str, errors: &mut FieldErrors) {
        let length = password.chars().count();
        if length < PASSWORD_MIN {
            errors.entry("password".to_string()).or_default().push(format!(
                "is too short (minimum is {} characters)",
                PASSWORD_MIN
            ));
        } else if length > PASSWORD_MAX {
            errors.entry("password".to_string()).or_default().push(format!(
                "is too long (maximum is {} characters)",
                PASSWORD_MAX
            ));
        }
    }

    // A write that loses a uniqueness race reads like the pre-check failing.
    fn email_taken_on_conflict(err: AppError) -> AppError {
        if err.is_conflict() {
            AppError::validation("email", "has already been taken")
        } else {
            err
        }
    }

    async fn find(&self, id: i64) -> Result<users::Model, AppError> {
        self.users_repo
            .find_by_id(id)
            .await?
            .ok_or(AppError::NotFound("user"))
    }

    async fn with_roles(&self, user: users::Model) -> Result<UserWithRoles, AppError> {
        let roles = self.reconciler.role_names(user.id).await?;
        Ok(UserWithRoles { user, roles })
    }
}

#[async_trait]
impl UsersService for UsersServiceImpl {
    async fn list(&self, actor: &Actor) -> Result<Vec<UserWithRoles>, AppError> {
        let policy = UserPolicy::new(actor);
        authorize(policy.index(), "users.index", actor)?;

        let only_id = match policy.scope() {
            UserScope::All => None,
            UserScope::Only(id) => Some(id),
        };
        let users = self.users_repo.list_recent(only_id).await?;
        let ids: Vec<i64> = users.iter().map(|user| user.id).collect();
        let mut names = self.roles_repo.role_names_for_users(&ids).await?;

        Ok(users
            .into_iter()
            .map(|user| {
                let roles = names.remove(&user.id).unwrap_or_default();
                UserWithRoles { user, roles }
            })
            .collect())
    }

    async fn get(&self, actor: &Actor, id: i64) -> Result<UserWithRoles, AppError> {
        let user = self.find(id).await?;
        authorize(UserPolicy::new(actor).show(user.id), "users.show", actor)?;
        self.with_roles(user).await
    }

    async fn create(
        &self,
        actor: &Actor,
        input: CreateUserInput,
    ) -> Result<UserWithRoles, AppError> {
        self.authorize_create(actor)?;
        let requested = requested_roles(input.roles)?;

        let email = normalize_email(&input.email);
        let mut errors = FieldErrors::new();
        self.validate_email(&email, None, &mut errors).await?;
        let password = match input.password.filter(|p| !p.trim().is_empty()) {
            Some(password) => {
                Self::validate_password(&password, &mut errors);
                password
            }
            None => random_hex(12),
        };
        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        let model = users::ActiveModel {
            email: Set(email),
            encrypted_password: Set(self.hasher.hash(&password)?),
            name: Set(input.name),
            ..Default::default()
        };
        let user = self
            .users_repo
            .insert(model)
            .await
            .map_err(Self::email_taken_on_conflict)?;
        tracing::info!(actor_id = actor.id(), user_id = user.id, "user created");

        if let Some(requested) = requested {
            self.reconciler.reconcile(user.id, &requested).await?;
        }
        self.with_roles(user).await
    }

    async fn update(
        &self,
        actor: &Actor,
        id: i64,
        input: UpdateUserInput,
    ) -> Result<UserWithRoles, AppError> {
        let user = self.find(id).await?;
        let policy = UserPolicy::new(actor);
        authorize(policy.update(user.id), "users.update", actor)?;

        let requested = requested_roles(input.roles)?;
        if requested.is_some() {
            authorize(policy.assign_roles(), "users.assign_roles", actor)?;
        }

        let mut errors = FieldErrors::new();
        let email = input.email.map(|email| normalize_email(&email));
        if let Some(email) = &email {
            self.validate_email(email, Some(user.id), &mut errors).await?;
        }
        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        let mut active: users::ActiveModel = user.into();
        if let Some(name) = input.name {
            active.name = Set(Some(name));
        }
        if let Some(email) = email {
            active.email = Set(email);
        }
        let user = self
            .users_repo
            .update(active)
            .await
            .map_err(Self::email_taken_on_conflict)?;

        if let Some(requested) = requested {
            self.reconciler.reconcile(user.id, &requested).await?;
        }
        self.with_roles(user).await
    }

    async fn delete(&self, actor: &Actor, id: i64) -> Result<(), AppError> {
        let user = self.find(id).await?;
        authorize(UserPolicy::new(actor).destroy(user.id), "users.destroy", actor)?;
        self.users_repo.delete(user).await?;
        tracing::info!(actor_id = actor.id(), user_id = id, "user deleted");
        Ok(())
    }

    fn authorize_create(&self, actor: &Actor) -> Result<(), AppError> {
        authorize(UserPolicy::new(actor).create(), "users.create", actor)
    }
}
