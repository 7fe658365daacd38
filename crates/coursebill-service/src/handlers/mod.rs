//! HTTP request handlers.

pub mod health;
pub mod reconcile;
pub mod webhooks;
