//! HTTP handlers for provisioning-service.

pub mod admin;
pub mod auth;
pub mod metrics;
pub mod user;
