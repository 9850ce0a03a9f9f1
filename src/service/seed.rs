use sea_orm::Set;

use crate::{
    config::{AppEnv, Config},
    entities::users,
    error::AppError,
    repo::{
        roles::RolesRepo,
        users::{normalize_email, UsersRepo},
    },
    service::{
        credentials::CredentialHasher,
        roles::{RoleName, RoleReconciler},
    },
};

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub roles: Vec<String>,
    pub dev_admin_created: bool,
}

/// Idempotent startup data: the known roles, plus a password-login admin for
/// local environments that have no SSO configured.
pub async fn run(
    config: &Config,
    users_repo: &dyn UsersRepo,
    roles_repo: &dyn RolesRepo,
    reconciler: &dyn RoleReconciler,
    hasher: &dyn CredentialHasher,
) -> Result<SeedReport, AppError> {
    let mut report = SeedReport::default();
    for role in RoleName::ALL {
        let role = roles_repo.find_or_create_by_name(role.as_str()).await?;
        report.roles.push(role.name);
    }
    tracing::info!(roles = ?report.roles, "seeded roles");

    if config.app_env == AppEnv::Production {
        tracing::info!("skipping dev admin in production");
        return Ok(report);
    }
    if config.keycloak.is_some() {
        tracing::info!("keycloak configured, skipping dev admin");
        return Ok(report);
    }

    let email = normalize_email(&config.dev_admin_email);
    let admin = match users_repo.find_by_email(&email).await? {
        Some(admin) => admin,
        None => {
            let model = users::ActiveModel {
                email: Set(email.clone()),
                encrypted_password: Set(hasher.hash(&config.dev_admin_password)?),
                ..Default::default()
            };
            report.dev_admin_created = true;
            let admin = users_repo.insert(model).await?;
            tracing::warn!(
                email = %email,
                "created development admin; do not use these credentials in production"
            );
            admin
        }
    };
    reconciler.grant(admin.id, RoleName::Admin).await?;

    Ok(report)
}
