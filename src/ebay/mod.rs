pub mod auth;
pub mod browse;
pub mod config;
pub mod drafts;
