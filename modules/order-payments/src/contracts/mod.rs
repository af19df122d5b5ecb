//! HTTP API contract types for the payments service

pub mod payment_v1;

pub use payment_v1::*;
