//! M-Pesa STK push backend
//!
//! Initiates STK push payments, records every result callback the provider delivers and
//! serves the callback history back to operators.

pub mod api;
pub mod config;
pub mod database;
pub mod error;
pub mod health;
pub mod logging;
pub mod middleware;
pub mod payments;
pub mod services;
