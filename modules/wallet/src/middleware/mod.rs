pub mod auth;
pub mod trace_id;
