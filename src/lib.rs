pub mod agent;
pub mod api;
pub mod clock;
pub mod config;
pub mod observability;
pub mod rest;
pub mod schedule;
pub mod server;
pub mod state;
pub mod sync;
