//! Coursebill webhook reconciler service.
//!
//! This crate provides the HTTP endpoint that receives payment-lifecycle
//! events from the payment provider and reconciles internal records
//! (payments, enrollments, invoices, subscriptions, payment methods)
//! against them.
//!
//! # Delivery contract
//!
//! The provider delivers events at-least-once and in no particular order.
//! Every reconciliation handler is idempotent by provider-assigned natural
//! key, so redeliveries and out-of-order arrivals converge to the same state.
//! A non-2xx response asks the provider to redeliver; unknown event types are
//! acknowledged so future provider features cannot disable the endpoint.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;
pub mod stripe;

pub use config::ServiceConfig;
pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
pub use stripe::{StripeClient, StripeError};
