//! Task list service: per-user to-do lists stored with encrypted titles,
//! plus the recovery tooling for titles written under lost keys.

pub mod config;
pub mod crypto;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod worker;
