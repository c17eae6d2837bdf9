//! # Configuration
//!
//! Configuration loading for the notification service: defaults, an optional
//! YAML/JSON file, and `ALERTA_*` environment fallbacks.

pub mod service;
