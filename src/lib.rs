//! # Blog Backend Library
//!
//! A JSON API for a small blog: tags, articles associated with tags, read-only
//! users, and image uploads served back as static files.
//!
//! ## Architecture
//!
//! - **Axum** for routing and extraction
//! - **SQLx** over SQLite for persistence, with soft deletes
//! - **Redis** or an in-process LRU as a read-through cache
//! - **tracing** for request, SQL and cache spans
//!
//! ## Core Components
//!
//! - [`config`]: layered configuration and its validation
//! - [`logging`]: subscriber with daily rolling files
//! - [`db`]: pool setup and schema migration
//! - [`cache`]: the cache abstraction and its backends
//! - [`data`]: the persistence client (pool + cache) and its shutdown release
//! - [`repo`]: queries for tags, articles and users
//! - [`models`]: database rows
//! - [`types`]: request and response bodies with their constraints
//! - [`error`]: the HTTP error type
//! - [`routes`]: handlers and the router
//! - [`middleware`]: request screening and response headers
//! - [`metrics`]: in-process counters
//! - [`state`]: state shared by handlers

pub mod cache;
pub mod config;
pub mod data;
pub mod db;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod repo;
pub mod routes;
pub mod state;
pub mod types;

#[cfg(test)]
mod tests;
