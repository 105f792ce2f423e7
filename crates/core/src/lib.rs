pub mod auth;
pub mod billing;
pub mod config;
pub mod types;
pub mod watch;
