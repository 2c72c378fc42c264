//! Domain services used by the coordinator and HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own storage concerns so the coordinator and route
//! handlers stay focused on protocol translation.

pub mod action_log;
pub mod memory_log;
pub mod persistence;
pub mod pg_log;
