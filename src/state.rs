use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::{
    error::AppError,
    repo::{
        roles::{RolesRepo, SeaOrmRolesRepo},
        users::{SeaOrmUsersRepo, UsersRepo},
    },
    service::{
        auth::{AuthService, AuthServiceImpl},
        config::{ConfigService, ConfigServiceImpl},
        credentials::{Argon2Hasher, CredentialHasher},
        identity::{IdentityResolver, IdentityResolverImpl},
        roles::{RoleReconciler, RoleReconcilerImpl},
        secret::{RandomSecretGenerator, SecretGenerator},
        seed,
        session::{RedisSessionService, SessionService},
        users::{UsersService, UsersServiceImpl},
    },
};

pub trait DatabaseClient: Send + Sync {
    fn conn(&self) -> &DatabaseConnection;
}

pub struct SeaOrmDatabaseClient {
    conn: DatabaseConnection,
}

impl SeaOrmDatabaseClient {
    pub async fn new() -> Result<Self, AppError> {
        let conn = crate::db::connect().await?;
        crate::schema::apply(&conn).await?;
        Ok(Self { conn })
    }
}

impl DatabaseClient for SeaOrmDatabaseClient {
    fn conn(&self) -> &DatabaseConnection {
        &self.conn
    }
}

pub struct AppState {
    users_repo: Arc<dyn UsersRepo>,
    roles_repo: Arc<dyn RolesRepo>,
    hasher: Arc<dyn CredentialHasher>,
    secrets: Arc<dyn SecretGenerator>,
    roles: Arc<dyn RoleReconciler>,
    users: Arc<dyn UsersService>,
    auth: Arc<dyn AuthService>,
    config: Arc<dyn ConfigService>,
}

impl AppState {
    pub async fn new() -> Result<Arc<Self>, AppError> {
        let config = Arc::new(ConfigServiceImpl::new());
        let values = config.values();
        let Some(redis_url) = values.redis_url.clone() else {
            return Err(AppError::Config("REDIS_URL is not set".to_string()));
        };

        let db = Arc::new(SeaOrmDatabaseClient::new().await?);
        let sessions = Arc::new(
            RedisSessionService::new(
                &redis_url,
                values.session_ttl_seconds,
                values.session_key_prefix.clone(),
            )
            .await?,
        );

        let users_repo: Arc<dyn UsersRepo> = Arc::new(SeaOrmUsersRepo::new(db.clone()));
        let roles_repo: Arc<dyn RolesRepo> = Arc::new(SeaOrmRolesRepo::new(db.clone()));
        let hasher: Arc<dyn CredentialHasher> = Arc::new(Argon2Hasher::new());
        let secrets: Arc<dyn SecretGenerator> = Arc::new(RandomSecretGenerator::new());

        Ok(Self::assemble(
            config,
            users_repo,
            roles_repo,
            hasher,
            secrets,
            sessions,
        ))
    }

    pub fn assemble(
        config: Arc<dyn ConfigService>,
        users_repo: Arc<dyn UsersRepo>,
        roles_repo: Arc<dyn RolesRepo>,
        hasher: Arc<dyn CredentialHasher>,
        secrets: Arc<dyn SecretGenerator>,
        sessions: Arc<dyn SessionService>,
    ) -> Arc<Self> {
        let roles: Arc<dyn RoleReconciler> = Arc::new(RoleReconcilerImpl::new(roles_repo.clone()));
        let identities: Arc<dyn IdentityResolver> = Arc::new(IdentityResolverImpl::new(
            users_repo.clone(),
            secrets.clone(),
            hasher.clone(),
        ));
        let users = Arc::new(UsersServiceImpl::new(
            users_repo.clone(),
            roles_repo.clone(),
            roles.clone(),
            hasher.clone(),
        ));
        let auth = Arc::new(AuthServiceImpl::new(
            users_repo.clone(),
            identities,
            roles.clone(),
            hasher.clone(),
            sessions,
        ));

        Arc::new(Self {
            users_repo,
            roles_repo,
            hasher,
            secrets,
            roles,
            users,
            auth,
            config,
        })
    }

    pub async fn seed(&self) -> Result<seed::SeedReport, AppError> {
        seed::run(
            self.config.values(),
            self.users_repo.as_ref(),
            self.roles_repo.as_ref(),
            self.roles.as_ref(),
            self.hasher.as_ref(),
        )
        .await
    }

    pub fn users(&self) -> &dyn UsersService {
        self.users.as_ref()
    }

    pub fn auth(&self) -> &dyn AuthService {
        self.auth.as_ref()
    }

    pub fn roles(&self) -> &dyn RoleReconciler {
        self.roles.as_ref()
    }

    pub fn secrets(&self) -> &dyn SecretGenerator {
        self.secrets.as_ref()
    }

    pub fn config(&self) -> &dyn ConfigService {
        self.config.as_ref()
    }
}
