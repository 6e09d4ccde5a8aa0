//! Core of the Taylor roleplay service: a simulated student with a fixed
//! fraction misconception, plus on-request fraction diagrams.
//!
//! The HTTP service in `taylor-api` is a thin wrapper around
//! [`orchestrator::ChatOrchestrator`].

pub mod conversation;
pub mod diagram;
pub mod error;
pub mod fraction;
pub mod image_client;
pub mod intent;
pub mod llm_client;
pub mod orchestrator;
pub mod persona;
pub mod rate_limit;

#[cfg(test)]
mod test_support;
