//! Taylor API Library Crate
//!
//! HTTP surface of the Taylor roleplay service: configuration, application
//! state, handlers, and routing. The `api` binary is a thin wrapper around
//! this library.

pub mod config;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
