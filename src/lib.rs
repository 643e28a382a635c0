pub mod auth;
pub mod error;
pub mod models;
pub mod openapi;
pub mod password;
pub mod rate_limit;
pub mod routes;
pub mod shape;
pub mod store;
pub mod validate;

// Re-export commonly used items for tests / external users
pub use routes::{config, AppState};
