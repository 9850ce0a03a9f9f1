pub mod roles;
pub mod users;
pub mod users_roles;
