pub mod cache;
pub mod classify;
pub mod config;
pub mod error;
pub mod gateway;
pub mod input;
pub mod model;
pub mod prompt;
pub mod provider;
pub mod router;
