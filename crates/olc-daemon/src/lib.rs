//! olc-daemon library target.
//!
//! Exposes the router, state and ingress for integration tests.
//! The binary `main.rs` depends on this library target.

pub mod api_types;
pub mod ingress;
pub mod routes;
pub mod state;
