//! The _certmint_ library crate.

pub mod client;
pub mod commons;
pub mod config;
pub mod constants;
pub mod daemon;
pub mod engine;
pub mod tls;
