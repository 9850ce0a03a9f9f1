use async_trait::async_trait;
use std::sync::Arc;

use crate::{
    entities::users,
    error::AppError,
    repo::users::{normalize_email, UsersRepo},
    service::{
        credentials::CredentialHasher,
        identity::{ExternalIdentity, IdentityResolver},
        policy::Actor,
        roles::{RoleName, RoleReconciler},
        session::SessionService,
    },
};

#[derive(Debug)]
pub struct LoginOutput {
    pub user: users::Model,
    pub session_id: String,
}

#[async_trait]
pub trait AuthService: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> Result<LoginOutput, AppError>;
    /// Resolves the identity and opens a session. A `Conflict` from a racing
    /// first login is retried once, by which time the winner's row is visible.
    async fn login_federated(&self, identity: &ExternalIdentity) -> Result<LoginOutput, AppError>;
    async fn sign_in(&self, user: users::Model) -> Result<LoginOutput, AppError>;
    async fn logout(&self, session_id: &str) -> Result<(), AppError>;
    async fn current_actor(&self, session_id: &str) -> Result<Actor, AppError>;
    /// Signs in as the oldest account, creating an admin when there is none.
    async fn godmode(&self) -> Result<LoginOutput, AppError>;
}

pub struct AuthServiceImpl {
    users_repo: Arc<dyn UsersRepo>,
    identities: Arc<dyn IdentityResolver>,
    reconciler: Arc<dyn RoleReconciler>,
    hasher: Arc<dyn CredentialHasher>,
    sessions: Arc<dyn SessionService>,
}

impl AuthServiceImpl {
    pub fn new(
        users_repo: Arc<dyn UsersRepo>,
        identities: Arc<dyn IdentityResolver>,
        reconciler: Arc<dyn RoleReconciler>,
        hasher: Arc<dyn CredentialHasher>,
        sessions: Arc<dyn SessionService>,
    ) -> Self {
        Self {
            users_repo,
            identities,
            reconciler,
            hasher,
            sessions,
        }
    }
}

#[async_trait]
impl AuthService for AuthServiceImpl {
    async fn login(&self, email: &str, password: &str) -> Result<LoginOutput, AppError> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(AppError::InvalidCredentials);
        }

        let Some(user) = self.users_repo.find_by_email(&email).await? else {
            return Err(AppError::InvalidCredentials);
        };
        if !self.hasher.verify(&user.encrypted_password, password) {
            tracing::warn!(user_id = user.id, "password sign-in rejected");
            return Err(AppError::InvalidCredentials);
        }

        self.sign_in(user).await
    }

    async fn login_federated(&self, identity: &ExternalIdentity) -> Result<LoginOutput, AppError> {
        let user = match self.identities.resolve(identity).await {
            Ok(user) => user,
            Err(err) if err.is_conflict() => {
                tracing::warn!(
                    provider = %identity.provider,
                    error = %err,
                    "identity resolve conflicted, retrying lookup"
                );
                self.identities.resolve(identity).await?
            }
            Err(err) => return Err(err),
        };
        self.sign_in(user).await
    }

    async fn sign_in(&self, user: users::Model) -> Result<LoginOutput, AppError> {
        let session_id = self.sessions.create(user.id).await?;
        tracing::info!(user_id = user.id, "signed in");
        Ok(LoginOutput { user, session_id })
    }

    async fn logout(&self, session_id: &str) -> Result<(), AppError> {
        self.sessions.delete(session_id).await?;
        Ok(())
    }

    async fn current_actor(&self, session_id: &str) -> Result<Actor, AppError> {
        let Some(session) = self.sessions.get(session_id).await? else {
            return Err(AppError::Unauthenticated);
        };
        let Some(user) = self.users_repo.find_by_id(session.user_id).await? else {
            return Err(AppError::Unauthenticated);
        };
        let roles = self.reconciler.role_names(user.id).await?;
        Ok(Actor { user, roles })
    }

    async fn godmode(&self) -> Result<LoginOutput, AppError> {
        if let Some(user) = self.users_repo.first().await? {
            return self.sign_in(user).await;
        }

        let password = crate::service::secret::random_hex(12);
        let model = users::ActiveModel {
            email: sea_orm::Set("admin@example.com".to_string()),
            name: sea_orm::Set(Some("Admin User".to_string())),
            encrypted_password: sea_orm::Set(self.hasher.hash(&password)?),
            ..Default::default()
        };
        let user = self.users_repo.insert(model).await?;
        self.reconciler.grant(user.id, RoleName::Admin).await?;
        self.sign_in(user).await
    }
}
