// settlement/src/lib.rs

//! Marketplace payment settlement service.
//!
//! Verifies gateway payments, confirms orders, credits each creator's wallet
//! ledger exactly once, completes the buyer's cart and notifies everyone involved.
//! The HTTP surface lives in `web`; the settlement logic in `pipelines`.

pub mod config;
pub mod errors;
pub mod models;
pub mod pipelines;
pub mod services;
pub mod state;
pub mod store;
pub mod telemetry;
pub mod web;
