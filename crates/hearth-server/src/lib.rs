//! Process glue for the hearth observability core: configuration, logging,
//! the [`monitor::Monitor`] lifecycle and the HTTP surface.

pub mod api;
pub mod app;
pub mod config;
pub mod health;
pub mod jobs;
pub mod logging;
pub mod middleware;
pub mod monitor;
pub mod prometheus;
pub mod state;
