//! meterpulse harness library entry.
//!
//! This crate wires the config loader, the OTLP metrics pipeline, the local
//! registry sink, and the tokio pacer around the emission loops of
//! `meterpulse-core`. It is consumed by the binary (`main.rs`) and by
//! integration tests.

pub mod app;
pub mod config;
pub mod pacer;
pub mod telemetry;
