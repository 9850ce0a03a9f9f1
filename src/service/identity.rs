use async_trait::async_trait;
use sea_orm::Set;
use std::sync::Arc;

use crate::{
    entities::users,
    error::AppError,
    repo::users::{normalize_email, UsersRepo},
    service::{credentials::CredentialHasher, secret::SecretGenerator},
};

/// Random bytes behind the secret of an account created by federated login.
const FEDERATED_SECRET_BYTES: usize = 20;

/// Identity claims returned by an external provider. Never persisted as-is.
#[derive(Clone, Debug)]
pub struct ExternalIdentity {
    pub provider: String,
    pub external_id: String,
    pub email: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Finds, links or creates the local account for `identity`.
    ///
    /// Lookup order is `(provider, external_id)`, then email, then create. A
    /// returning identity overwrites name and avatar even with blank values; a
    /// newly linked account only takes non-empty ones.
    async fn resolve(&self, identity: &ExternalIdentity) -> Result<users::Model, AppError>;
}

pub struct IdentityResolverImpl {
    users_repo: Arc<dyn UsersRepo>,
    secrets: Arc<dyn SecretGenerator>,
    hasher: Arc<dyn CredentialHasher>,
}

impl IdentityResolverImpl {
    pub fn new(
        users_repo: Arc<dyn UsersRepo>,
        secrets: Arc<dyn SecretGenerator>,
        hasher: Arc<dyn CredentialHasher>,
    ) -> Self {
        Self {
            users_repo,
            secrets,
            hasher,
        }
    }

    fn non_empty(value: &Option<String>) -> Option<String> {
        value
            .as_ref()
            .filter(|v| !v.is_empty())
            .cloned()
    }

    async fn refresh_profile(
        &self,
        user: users::Model,
        identity: &ExternalIdentity,
    ) -> Result<users::Model, AppError> {
        let mut active: users::ActiveModel = user.into();
        active.name = Set(identity.name.clone());
        active.avatar_url = Set(identity.avatar_url.clone());
        self.users_repo.update(active).await
    }

    async fn link(
        &self,
        user: users::Model,
        identity: &ExternalIdentity,
    ) -> Result<users::Model, AppError> {
        let mut active: users::ActiveModel = user.into();
        active.provider = Set(Some(identity.provider.clone()));
        active.external_id = Set(Some(identity.external_id.clone()));
        if let Some(name) = Self::non_empty(&identity.name) {
            active.name = Set(Some(name));
        }
        if let Some(avatar_url) = Self::non_empty(&identity.avatar_url) {
            active.avatar_url = Set(Some(avatar_url));
        }
        self.users_repo.update(active).await
    }

    async fn create(
        &self,
        email: String,
        identity: &ExternalIdentity,
    ) -> Result<users::Model, AppError> {
        let secret = self.secrets.generate(FEDERATED_SECRET_BYTES);
        let model = users::ActiveModel {
            email: Set(email),
            encrypted_password: Set(self.hasher.hash(&secret)?),
            name: Set(identity.name.clone()),
            avatar_url: Set(identity.avatar_url.clone()),
            provider: Set(Some(identity.provider.clone())),
            external_id: Set(Some(identity.external_id.clone())),
            ..Default::default()
        };
        self.users_repo.insert(model).await
    }
}

#[async_trait]
impl IdentityResolver for IdentityResolverImpl {
    async fn resolve(&self, identity: &ExternalIdentity) -> Result<users::Model, AppError> {
        if let Some(user) = self
            .users_repo
            .find_by_provider_and_external_id(&identity.provider, &identity.external_id)
            .await?
        {
            return self.refresh_profile(user, identity).await;
        }

        // The provider's email is trusted as proof of ownership; verification
        // status is not checked before linking.
        let email = normalize_email(&identity.email);
        if let Some(user) = self.users_repo.find_by_email(&email).await? {
            let user = self.link(user, identity).await?;
            tracing::info!(
                user_id = user.id,
                provider = %identity.provider,
                "linked external identity to existing account"
            );
            return Ok(user);
        }

        let user = self.create(email, identity).await?;
        tracing::info!(
            user_id = user.id,
            provider = %identity.provider,
            "created account from external identity"
        );
        Ok(user)
    }
}
