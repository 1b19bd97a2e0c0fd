//! Request handlers module

pub mod auth;
pub mod common;
pub mod dict;
pub mod function;
pub mod order;
pub mod organization;
pub mod permission;
pub mod port;
pub mod region;
pub mod role;
pub mod system;
pub mod user;
