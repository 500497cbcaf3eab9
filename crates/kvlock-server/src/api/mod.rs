//! HTTP handlers

pub mod counter;
pub mod metrics;
pub mod route;
