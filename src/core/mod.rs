pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod jobs;
pub mod stories;
pub mod terminal;
pub mod update;
