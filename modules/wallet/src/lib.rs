pub mod config;
pub mod db;
pub mod middleware;
pub mod models;
pub mod repos;
pub mod routes;
pub mod seed;
pub mod services;

pub use routes::{build_router, AppState};
