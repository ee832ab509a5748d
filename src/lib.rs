//! Aleo Prediction Oracle
//!
//! Settlement agent for prediction-market pools on Aleo. Watches markets with
//! known resolution deadlines, reads the configured metric at the deadline,
//! and submits a proved `resolve_pool` transaction recording the outcome
//! on-chain.

pub mod api;
pub mod config;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod store;
pub mod worker;
