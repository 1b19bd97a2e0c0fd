//! Shipping - administrative backend for shipping orders and ports
//!
//! This crate provides token-based authentication (password, key and WeChat
//! logins), permission-checked management APIs for orders, ports and system
//! records, and the menu and region trees used by the admin frontend.

pub mod cache;
pub mod config;
pub mod crypto;
pub mod db;
pub mod entity;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod secret;
pub mod service;
pub mod state;
pub mod task;
pub mod wx;

// Re-export commonly used types
pub use config::Config;
pub use state::AppState;
