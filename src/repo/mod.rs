pub mod roles;
pub mod users;

#[cfg(test)]
pub mod memory;
