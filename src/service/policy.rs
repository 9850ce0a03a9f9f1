use crate::{entities::users, error::AppError, service::roles::RoleName};

/// The signed-in user a request acts as.
#[derive(Clone, Debug)]
pub struct Actor {
    pub user: users::Model,
    pub roles: Vec<String>,
}

impl Actor {
    pub fn id(&self) -> i64 {
        self.user.id
    }

    pub fn has_role(&self, role: RoleName) -> bool {
        self.roles.iter().any(|name| name == role.as_str())
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(RoleName::Admin)
    }
}

/// Which users an actor may list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UserScope {
    All,
    Only(i64),
}

pub struct UserPolicy<'a> {
    actor: &'a Actor,
}

impl<'a> UserPolicy<'a> {
    pub fn new(actor: &'a Actor) -> Self {
        Self { actor }
    }

    pub fn index(&self) -> bool {
        self.actor.is_admin()
    }

    pub fn show(&self, record_id: i64) -> bool {
        self.actor.is_admin() || self.actor.id() == record_id
    }

    pub fn create(&self) -> bool {
        self.actor.is_admin()
    }

    pub fn update(&self, record_id: i64) -> bool {
        self.actor.is_admin() || self.actor.id() == record_id
    }

    pub fn destroy(&self, record_id: i64) -> bool {
        self.actor.is_admin() && self.actor.id() != record_id
    }

    pub fn assign_roles(&self) -> bool {
        self.actor.is_admin()
    }

    pub fn scope(&self) -> UserScope {
        if self.actor.is_admin() {
            UserScope::All
        } else {
            UserScope::Only(self.actor.id())
        }
    }
}

pub fn authorize(allowed: bool, action: &str, actor: &Actor) -> Result<(), AppError> {
    if allowed {
        return Ok(());
    }
    tracing::warn!(actor_id = actor.id(), action, "authorization denied");
    Err(AppError::NotAuthorized)
}
