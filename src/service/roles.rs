use std::{collections::BTreeSet, str::FromStr, sync::Arc};

use async_trait::async_trait;

use crate::{error::AppError, repo::roles::RolesRepo};

/// Role names accepted from requests. Stored roles stay free-form strings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RoleName {
    Admin,
    User,
}

impl RoleName {
    pub const ALL: [RoleName; 2] = [RoleName::Admin, RoleName::User];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoleName::Admin => "admin",
            RoleName::User => "user",
        }
    }

    pub fn available() -> Vec<String> {
        Self::ALL.iter().map(|role| role.as_str().to_string()).collect()
    }
}

impl FromStr for RoleName {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "admin" => Ok(RoleName::Admin),
            "user" => Ok(RoleName::User),
            other => Err(AppError::validation(
                "roles",
                &format!("{} is not a valid role", other),
            )),
        }
    }
}

/// Turns a submitted `roles` field into the set to reconcile against.
///
/// `None` means the field was not submitted and reconciliation must be skipped.
/// Blank entries are dropped, so `Some(vec![""])` yields an empty set.
pub fn requested_roles(field: Option<Vec<String>>) -> Result<Option<BTreeSet<String>>, AppError> {
    let Some(values) = field else {
        return Ok(None);
    };

    let mut requested = BTreeSet::new();
    for value in values.iter().map(|v| v.trim()).filter(|v| !v.is_empty()) {
        let role: RoleName = value.parse()?;
        requested.insert(role.as_str().to_string());
    }
    Ok(Some(requested))
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoleChanges {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl RoleChanges {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

#[async_trait]
pub trait RoleReconciler: Send + Sync {
    /// Makes the user's assigned roles equal `requested`. The caller is
    /// responsible for authorization and for skipping absent form fields.
    async fn reconcile(
        &self,
        user_id: i64,
        requested: &BTreeSet<String>,
    ) -> Result<RoleChanges, AppError>;
    async fn role_names(&self, user_id: i64) -> Result<Vec<String>, AppError>;
    async fn grant(&self, user_id: i64, role: RoleName) -> Result<bool, AppError>;
}

pub struct RoleReconcilerImpl {
    roles_repo: Arc<dyn RolesRepo>,
}

impl RoleReconcilerImpl {
    pub fn new(roles_repo: Arc<dyn RolesRepo>) -> Self {
        Self { roles_repo }
    }
}

#[async_trait]
impl RoleReconciler for RoleReconcilerImpl {
    async fn reconcile(
        &self,
        user_id: i64,
        requested: &BTreeSet<String>,
    ) -> Result<RoleChanges, AppError> {
        let current = self.roles_repo.roles_for_user(user_id).await?;
        let mut changes = RoleChanges::default();

        // Role rows are kept even when the last holder loses them.
        for role in &current {
            if !requested.contains(&role.name) {
                self.roles_repo.unassign(user_id, role.id).await?;
                changes.removed.push(role.name.clone());
            }
        }

        for name in requested {
            if current.iter().any(|role| &role.name == name) {
                continue;
            }
            let role = self.roles_repo.find_or_create_by_name(name).await?;
            self.roles_repo.assign(user_id, role.id).await?;
            changes.added.push(name.clone());
        }

        if !changes.is_empty() {
            tracing::info!(
                user_id,
                added = ?changes.added,
                removed = ?changes.removed,
                "reconciled roles"
            );
        }
        Ok(changes)
    }

    async fn role_names(&self, user_id: i64) -> Result<Vec<String>, AppError> {
        Ok(self
            .roles_repo
            .roles_for_user(user_id)
            .await?
            .into_iter()
            .map(|role| role.name)
            .collect())
    }

    async fn grant(&self, user_id: i64, role: RoleName) -> Result<bool, AppError> {
        let held = self.role_names(user_id).await?;
        if held.iter().any(|name| name == role.as_str()) {
            return Ok(false);
        }
        let role = self.roles_repo.find_or_create_by_name(role.as_str()).await?;
        self.roles_repo.assign(user_id, role.id).await?;
        Ok(true)
    }
}
