// File: lectern-server/src/lib.rs
// Purpose: axum application for the lectern reading platform

pub mod extract;
pub mod handlers;
pub mod limiter;
pub mod middleware;
pub mod routes;
pub mod state;

pub use routes::build_app;
pub use state::AppState;
