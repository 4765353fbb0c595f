//! Team dues ledger service.
//!
//! Coaches bill their team, parents pay through the card processor, and the
//! processor's webhook settles each payment against the ledger. Blast messages
//! and push delivery share the notification plumbing.

pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod requests;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;

pub use crate::config::Settings;
pub use crate::error::ApiError;
pub use crate::state::AppState;
