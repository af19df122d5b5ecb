pub mod auth;
pub mod config;
pub mod contracts;
pub mod db;
pub mod health;
pub mod metrics;
pub mod middleware;
pub mod money;
pub mod repos;
pub mod routes;
pub mod services;
pub mod validation;

pub use routes::{router, AppState};
