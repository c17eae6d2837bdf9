#![cfg_attr(not(test), forbid(unsafe_code))]

//! Realtime notification core for the Alerta incident backend.
//!
//! One inbound envelope names a channel; the registry resolves the live
//! connections subscribed to it, the delivery engine fans the serialized
//! message out to all of them concurrently, and connections that prove
//! permanently unreachable are reaped from the registry.

pub mod app_state;
pub mod db;
pub mod delivery;
pub mod http;
pub mod intake;
pub mod reaper;
pub mod registry;
pub mod resolver;
pub mod routes;
pub mod server;
pub mod store;
pub mod tracer;
pub mod transport;
