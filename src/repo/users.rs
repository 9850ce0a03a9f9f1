use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, QueryFilter, QueryOrder,
};

use crate::{entities::users, error::AppError, state::DatabaseClient};

#[async_trait]
pub trait UsersRepo: Send + Sync {
    async fn insert(&self, model: users::ActiveModel) -> Result<users::Model, AppError>;
    async fn update(&self, model: users::ActiveModel) -> Result<users::Model, AppError>;
    async fn delete(&self, model: users::Model) -> Result<(), AppError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<users::Model>, AppError>;
    /// `email` must already be normalized.
    async fn find_by_email(&self, email: &str) -> Result<Option<users::Model>, AppError>;
    async fn find_by_provider_and_external_id(
        &self,
        provider: &str,
        external_id: &str,
    ) -> Result<Option<users::Model>, AppError>;
    async fn list_recent(&self, only_id: Option<i64>) -> Result<Vec<users::Model>, AppError>;
    async fn first(&self) -> Result<Option<users::Model>, AppError>;
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub struct SeaOrmUsersRepo {
    db: std::sync::Arc<dyn DatabaseClient>,
}

impl SeaOrmUsersRepo {
    pub fn new(db: std::sync::Arc<dyn DatabaseClient>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UsersRepo for SeaOrmUsersRepo {
    async fn insert(&self, model: users::ActiveModel) -> Result<users::Model, AppError> {
        Ok(model.insert(self.db.conn()).await?)
    }

    async fn update(&self, model: users::ActiveModel) -> Result<users::Model, AppError> {
        Ok(model.update(self.db.conn()).await?)
    }

    async fn delete(&self, model: users::Model) -> Result<(), AppError> {
        model.delete(self.db.conn()).await?;
        Ok(())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<users::Model>, AppError> {
        Ok(users::Entity::find_by_id(id).one(self.db.conn()).await?)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<users::Model>, AppError> {
        Ok(users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(self.db.conn())
            .await?)
    }

    async fn find_by_provider_and_external_id(
        &self,
        provider: &str,
        external_id: &str,
    ) -> Result<Option<users::Model>, AppError> {
        Ok(users::Entity::find()
            .filter(users::Column::Provider.eq(provider))
            .filter(users::Column::ExternalId.eq(external_id))
            .one(self.db.conn())
            .await?)
    }

    async fn list_recent(&self, only_id: Option<i64>) -> Result<Vec<users::Model>, AppError> {
        let mut query = users::Entity::find();
        if let Some(id) = only_id {
            query = query.filter(users::Column::Id.eq(id));
        }
        Ok(query
            .order_by_desc(users::Column::CreatedAt)
            .order_by_desc(users::Column::Id)
            .all(self.db.conn())
            .await?)
    }

    async fn first(&self) -> Result<Option<users::Model>, AppError> {
        Ok(users::Entity::find()
            .order_by_asc(users::Column::Id)
            .one(self.db.conn())
            .await?)
    }
}
