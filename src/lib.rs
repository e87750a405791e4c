//! QC Tool validation backend
//!
//! This library provides the core of the qc-tool service: chunked AI
//! validation jobs over batches of free-text records, with progress written
//! to a pollable task record and the combined result cached on completion.

pub mod app_state;
pub mod config;
pub mod db;
pub mod models;
pub mod routes;
pub mod services;
