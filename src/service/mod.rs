//! Service layer
//!
//! Business rules sitting between the HTTP handlers and the database

pub mod store;
pub mod system;
pub mod tree;
pub mod user;

pub use store::{DbUserStore, UserStore};
pub use system::SystemService;
pub use user::{LoginInfo, UserService};
