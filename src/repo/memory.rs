//! In-memory repos that enforce the same uniqueness rules as the Postgres schema.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Mutex,
};

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::ActiveValue;

use crate::{
    entities::{roles, users},
    error::AppError,
    repo::{roles::RolesRepo, users::UsersRepo},
};

fn value<T: Clone + Into<sea_orm::Value>>(field: &ActiveValue<T>) -> Option<T> {
    match field {
        ActiveValue::Set(v) | ActiveValue::Unchanged(v) => Some(v.clone()),
        ActiveValue::NotSet => None,
    }
}

#[derive(Default)]
pub struct InMemoryUsersRepo {
    rows: Mutex<Vec<users::Model>>,
    /// Set to make the next insert fail as if a concurrent request won the race.
    pub fail_next_insert: Mutex<bool>,
}

impl InMemoryUsersRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, model: users::Model) {
        self.rows.lock().unwrap().push(model);
    }

    pub fn count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    fn check_unique(rows: &[users::Model], candidate: &users::Model) -> Result<(), AppError> {
        for row in rows.iter().filter(|row| row.id != candidate.id) {
            if row.email.to_lowercase() == candidate.email.to_lowercase() {
                return Err(AppError::Conflict("users_email_unique".to_string()));
            }
            if let (Some(p), Some(e), Some(cp), Some(ce)) = (
                &row.provider,
                &row.external_id,
                &candidate.provider,
                &candidate.external_id,
            ) {
                if p == cp && e == ce {
                    return Err(AppError::Conflict(
                        "users_provider_external_id_unique".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

pub fn user(id: i64, email: &str) -> users::Model {
    let now = Utc::now().fixed_offset();
    users::Model {
        id,
        email: email.to_string(),
        encrypted_password: "digest".to_string(),
        name: None,
        provider: None,
        external_id: None,
        avatar_url: None,
        created_at: now,
        updated_at: now,
    }
}

#[async_trait]
impl UsersRepo for InMemoryUsersRepo {
    async fn insert(&self, model: users::ActiveModel) -> Result<users::Model, AppError> {
        if std::mem::take(&mut *self.fail_next_insert.lock().unwrap()) {
            return Err(AppError::Conflict(
                "users_provider_external_id_unique".to_string(),
            ));
        }
        let mut rows = self.rows.lock().unwrap();
        let id = rows.iter().map(|row| row.id).max().unwrap_or(0) + 1;
        let mut created = user(id, &value(&model.email).unwrap_or_default());
        created.encrypted_password = value(&model.encrypted_password).unwrap_or_default();
        created.name = value(&model.name).flatten();
        created.provider = value(&model.provider).flatten();
        created.external_id = value(&model.external_id).flatten();
        created.avatar_url = value(&model.avatar_url).flatten();
        Self::check_unique(&rows, &created)?;
        rows.push(created.clone());
        Ok(created)
    }

    async fn update(&self, model: users::ActiveModel) -> Result<users::Model, AppError> {
        let id = value(&model.id).ok_or(AppError::NotFound("user"))?;
        let mut rows = self.rows.lock().unwrap();
        let index = rows
            .iter()
            .position(|row| row.id == id)
            .ok_or(AppError::NotFound("user"))?;
        let mut updated = rows[index].clone();
        if let ActiveValue::Set(v) = &model.email {
            updated.email = v.clone();
        }
        if let ActiveValue::Set(v) = &model.encrypted_password {
            updated.encrypted_password = v.clone();
        }
        if let ActiveValue::Set(v) = &model.name {
            updated.name = v.clone();
        }
        if let ActiveValue::Set(v) = &model.provider {
            updated.provider = v.clone();
        }
        if let ActiveValue::Set(v) = &model.external_id {
            updated.external_id = v.clone();
        }
        if let ActiveValue::Set(v) = &model.avatar_url {
            updated.avatar_url = v.clone();
        }
        Self::check_unique(&rows, &updated)?;
        updated.updated_at = Utc::now().fixed_offset();
        rows[index] = updated.clone();
        Ok(updated)
    }

    async fn delete(&self, model: users::Model) -> Result<(), AppError> {
        self.rows.lock().unwrap().retain(|row| row.id != model.id);
        Ok(())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<users::Model>, AppError> {
        Ok(self.rows.lock().unwrap().iter().find(|row| row.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<users::Model>, AppError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|row| row.email == email)
            .cloned())
    }

    async fn find_by_provider_and_external_id(
        &self,
        provider: &str,
        external_id: &str,
    ) -> Result<Option<users::Model>, AppError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|row| {
                row.provider.as_deref() == Some(provider)
                    && row.external_id.as_deref() == Some(external_id)
            })
            .cloned())
    }

    async fn list_recent(&self, only_id: Option<i64>) -> Result<Vec<users::Model>, AppError> {
        let mut rows: Vec<users::Model> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|row| only_id.map_or(true, |id| row.id == id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(rows)
    }

    async fn first(&self) -> Result<Option<users::Model>, AppError> {
        Ok(self.rows.lock().unwrap().iter().min_by_key(|row| row.id).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryRolesRepo {
    roles: Mutex<Vec<roles::Model>>,
    assignments: Mutex<BTreeSet<(i64, i64)>>,
}

impl InMemoryRolesRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn role_names(&self) -> Vec<String> {
        self.roles
            .lock()
            .unwrap()
            .iter()
            .map(|role| role.name.clone())
            .collect()
    }

    pub fn assignment_count(&self) -> usize {
        self.assignments.lock().unwrap().len()
    }
}

#[async_trait]
impl RolesRepo for InMemoryRolesRepo {
    async fn find_or_create_by_name(&self, name: &str) -> Result<roles::Model, AppError> {
        let mut roles = self.roles.lock().unwrap();
        if let Some(role) = roles.iter().find(|role| role.name == name) {
            return Ok(role.clone());
        }
        let now = Utc::now().fixed_offset();
        let role = roles::Model {
            id: roles.len() as i64 + 1,
            name: name.to_string(),
            created_at: now,
            updated_at: now,
        };
        roles.push(role.clone());
        Ok(role)
    }

    async fn roles_for_user(&self, user_id: i64) -> Result<Vec<roles::Model>, AppError> {
        let assignments = self.assignments.lock().unwrap();
        let mut held: Vec<roles::Model> = self
            .roles
            .lock()
            .unwrap()
            .iter()
            .filter(|role| assignments.contains(&(user_id, role.id)))
            .cloned()
            .collect();
        held.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(held)
    }

    async fn role_names_for_users(
        &self,
        user_ids: &[i64],
    ) -> Result<BTreeMap<i64, Vec<String>>, AppError> {
        let mut names = BTreeMap::new();
        for id in user_ids {
            let held = self.roles_for_user(*id).await?;
            if !held.is_empty() {
                names.insert(*id, held.into_iter().map(|role| role.name).collect());
            }
        }
        Ok(names)
    }

    async fn assign(&self, user_id: i64, role_id: i64) -> Result<(), AppError> {
        if !self.assignments.lock().unwrap().insert((user_id, role_id)) {
            return Err(AppError::Conflict("users_roles_pkey".to_string()));
        }
        Ok(())
    }

    async fn unassign(&self, user_id: i64, role_id: i64) -> Result<(), AppError> {
        self.assignments.lock().unwrap().remove(&(user_id, role_id));
        Ok(())
    }
}
