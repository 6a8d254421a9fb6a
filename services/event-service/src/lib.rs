//! pridr user event service library.
//!
//! This crate primarily ships an `event-service` binary, but we expose a small
//! library surface to enable integration testing and reuse.

pub mod api;
pub mod bus;
pub mod cleanup;
pub mod config;
pub mod db;
pub mod state;
pub mod store;
