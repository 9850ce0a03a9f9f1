use std::collections::BTreeMap;

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
    RelationTrait, Set,
};

use crate::{
    entities::{roles, users_roles},
    error::AppError,
    state::DatabaseClient,
};

#[async_trait]
pub trait RolesRepo: Send + Sync {
    async fn find_or_create_by_name(&self, name: &str) -> Result<roles::Model, AppError>;
    async fn roles_for_user(&self, user_id: i64) -> Result<Vec<roles::Model>, AppError>;
    async fn role_names_for_users(
        &self,
        user_ids: &[i64],
    ) -> Result<BTreeMap<i64, Vec<String>>, AppError>;
    async fn assign(&self, user_id: i64, role_id: i64) -> Result<(), AppError>;
    async fn unassign(&self, user_id: i64, role_id: i64) -> Result<(), AppError>;
}

pub struct SeaOrmRolesRepo {
    db: std::sync::Arc<dyn DatabaseClient>,
}

impl SeaOrmRolesRepo {
    pub fn new(db: std::sync::Arc<dyn DatabaseClient>) -> Self {
        Self { db }
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<roles::Model>, AppError> {
        Ok(roles::Entity::find()
            .filter(roles::Column::Name.eq(name))
            .one(self.db.conn())
            .await?)
    }
}

#[async_trait]
impl RolesRepo for SeaOrmRolesRepo {
    async fn find_or_create_by_name(&self, name: &str) -> Result<roles::Model, AppError> {
        if let Some(role) = self.find_by_name(name).await? {
            return Ok(role);
        }

        let model = roles::ActiveModel {
            name: Set(name.to_string()),
            ..Default::default()
        };
        match model.insert(self.db.conn()).await.map_err(AppError::from) {
            Ok(role) => Ok(role),
            // Another request created it between the lookup and the insert.
            Err(err) if err.is_conflict() => self
                .find_by_name(name)
                .await?
                .ok_or(AppError::NotFound("role")),
            Err(err) => Err(err),
        }
    }

    async fn roles_for_user(&self, user_id: i64) -> Result<Vec<roles::Model>, AppError> {
        Ok(roles::Entity::find()
            .join(
                sea_orm::JoinType::InnerJoin,
                roles::Relation::UsersRoles.def(),
            )
            .filter(users_roles::Column::UserId.eq(user_id))
            .order_by_asc(roles::Column::Name)
            .all(self.db.conn())
            .await?)
    }

    async fn role_names_for_users(
        &self,
        user_ids: &[i64],
    ) -> Result<BTreeMap<i64, Vec<String>>, AppError> {
        let mut names: BTreeMap<i64, Vec<String>> = BTreeMap::new();
        if user_ids.is_empty() {
            return Ok(names);
        }

        let rows = users_roles::Entity::find()
            .filter(users_roles::Column::UserId.is_in(user_ids.iter().copied()))
            .find_also_related(roles::Entity)
            .all(self.db.conn())
            .await?;
        for (assignment, role) in rows {
            if let Some(role) = role {
                names.entry(assignment.user_id).or_default().push(role.name);
            }
        }
        for list in names.values_mut() {
            list.sort();
        }
        Ok(names)
    }

    async fn assign(&self, user_id: i64, role_id: i64) -> Result<(), AppError> {
        let model = users_roles::ActiveModel {
            user_id: Set(user_id),
            role_id: Set(role_id),
        };
        users_roles::Entity::insert(model)
            .exec_without_returning(self.db.conn())
            .await?;
        Ok(())
    }

    async fn unassign(&self, user_id: i64, role_id: i64) -> Result<(), AppError> {
        users_roles::Entity::delete_many()
            .filter(users_roles::Column::UserId.eq(user_id))
            .filter(users_roles::Column::RoleId.eq(role_id))
            .exec(self.db.conn())
            .await?;
        Ok(())
    }
}
